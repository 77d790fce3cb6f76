//! Sparse weighted representation learned by a kernel machine

use crate::core::{MachineError, Result};
use serde::{Deserialize, Serialize};

/// Coefficients, support-vector indices and bias of a decision function
///
/// `support_vectors[i]` indexes the kernel's lhs feature set and carries
/// weight `alpha[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorModel {
    pub(crate) alpha: Vec<f64>,
    pub(crate) support_vectors: Vec<usize>,
    pub(crate) bias: f64,
}

impl SupportVectorModel {
    /// Model with `num` zeroed support vectors and zero bias
    pub fn with_capacity(num: usize) -> Self {
        Self {
            alpha: vec![0.0; num],
            support_vectors: vec![0; num],
            bias: 0.0,
        }
    }

    /// Model from matching coefficient and index sequences
    pub fn new(alpha: Vec<f64>, support_vectors: Vec<usize>, bias: f64) -> Result<Self> {
        let model = Self {
            alpha,
            support_vectors,
            bias,
        };
        model.check_lengths()?;
        Ok(model)
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alpha
    }

    pub fn support_vectors(&self) -> &[usize] {
        &self.support_vectors
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn num_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub(crate) fn check_lengths(&self) -> Result<()> {
        if self.alpha.len() != self.support_vectors.len() {
            return Err(MachineError::dimension_mismatch(
                "SupportVectorModel alphas",
                self.support_vectors.len(),
                self.alpha.len(),
            ));
        }
        Ok(())
    }

    /// Check lengths and that every index addresses one of `num_lhs` vectors
    pub(crate) fn validate(&self, num_lhs: usize) -> Result<()> {
        self.check_lengths()?;
        match self.support_vectors.iter().find(|&&sv| sv >= num_lhs) {
            Some(&index) => Err(MachineError::IndexOutOfBounds {
                index,
                len: num_lhs,
            }),
            None => Ok(()),
        }
    }
}
