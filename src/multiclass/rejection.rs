//! Rejection strategies for multiclass decoding

use crate::multiclass::RejectionStrategy;
use serde::{Deserialize, Serialize};

/// Rejects when no output exceeds `threshold`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRejectionStrategy {
    threshold: f64,
}

impl ThresholdRejectionStrategy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for ThresholdRejectionStrategy {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl RejectionStrategy for ThresholdRejectionStrategy {
    fn name(&self) -> &'static str {
        "ThresholdRejectionStrategy"
    }

    fn reject(&self, outputs: &[f64]) -> bool {
        !outputs.iter().any(|&output| output > self.threshold)
    }
}
