//! Euclidean distance between sparse vectors

use crate::core::{FeaturePair, Result, SparseFeatures};
use crate::distance::Distance;
use std::sync::Arc;

/// Euclidean distance: d(x, y) = ||x - y||
///
/// With `squared` set the square root is skipped, which keeps the ordering
/// of distances and is cheaper for nearest-reference decisions.
#[derive(Debug, Clone, Default)]
pub struct EuclideanDistance {
    features: FeaturePair,
    squared: bool,
}

impl EuclideanDistance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance reporting ||x - y||² instead of ||x - y||
    pub fn squared() -> Self {
        Self {
            squared: true,
            ..Self::default()
        }
    }
}

impl Distance for EuclideanDistance {
    fn name(&self) -> &'static str {
        "EuclideanDistance"
    }

    fn init(&mut self, lhs: Arc<SparseFeatures>, rhs: Arc<SparseFeatures>) -> Result<()> {
        self.features.set(lhs, rhs);
        Ok(())
    }

    fn lhs(&self) -> Option<Arc<SparseFeatures>> {
        self.features.lhs.clone()
    }

    fn rhs(&self) -> Option<Arc<SparseFeatures>> {
        self.features.rhs.clone()
    }

    fn distance(&self, i: usize, j: usize) -> f64 {
        let (lhs, rhs) = self.features.sides(self.name());
        let squared_distance = lhs.vector(i).squared_distance(rhs.vector(j));
        if self.squared {
            squared_distance
        } else {
            squared_distance.sqrt()
        }
    }
}
