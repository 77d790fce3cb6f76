//! Gaussian (RBF) kernel implementation
//!
//! The Gaussian kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::core::{FeaturePair, Result, SparseFeatures, SparseVector};
use crate::kernel::Kernel;
use std::sync::Arc;

/// Gaussian kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// Squared norms of both sides are cached on `init`, so each evaluation
/// costs one sparse dot product: ||x - y||² = ||x||² + ||y||² - 2 x^T y.
/// Offers no fast paths; machines fall back to the weighted sum.
#[derive(Debug, Clone)]
pub struct GaussianKernel {
    gamma: f64,
    features: FeaturePair,
    lhs_norms: Vec<f64>,
    rhs_norms: Vec<f64>,
}

impl GaussianKernel {
    /// Create a new Gaussian kernel with specified gamma parameter
    ///
    /// # Panics
    /// Panics if gamma is not positive
    pub fn new(gamma: f64) -> Self {
        assert!(gamma > 0.0, "Gamma must be positive, got: {}", gamma);
        Self {
            gamma,
            features: FeaturePair::default(),
            lhs_norms: Vec::new(),
            rhs_norms: Vec::new(),
        }
    }

    /// Create Gaussian kernel with gamma = 1.0 / n_features
    pub fn with_auto_gamma(n_features: usize) -> Self {
        assert!(n_features > 0, "Number of features must be positive");
        Self::new(1.0 / n_features as f64)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    fn norms(features: &SparseFeatures) -> Vec<f64> {
        features
            .vectors()
            .iter()
            .map(SparseVector::norm_squared)
            .collect()
    }
}

impl Default for GaussianKernel {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Kernel for GaussianKernel {
    fn name(&self) -> &'static str {
        "GaussianKernel"
    }

    fn init(&mut self, lhs: Arc<SparseFeatures>, rhs: Arc<SparseFeatures>) -> Result<()> {
        // Model compaction re-binds the same rhs with a new lhs
        let same_rhs = self
            .features
            .rhs
            .as_ref()
            .is_some_and(|old| Arc::ptr_eq(old, &rhs));
        self.lhs_norms = Self::norms(&lhs);
        if !same_rhs {
            self.rhs_norms = Self::norms(&rhs);
        }
        self.features.set(lhs, rhs);
        Ok(())
    }

    fn lhs(&self) -> Option<Arc<SparseFeatures>> {
        self.features.lhs.clone()
    }

    fn rhs(&self) -> Option<Arc<SparseFeatures>> {
        self.features.rhs.clone()
    }

    fn kernel(&self, i: usize, j: usize) -> f64 {
        let (lhs, rhs) = self.features.sides(self.name());
        let dot = lhs.vector(i).dot(rhs.vector(j));
        // Clamp rounding noise below zero
        let squared_distance = (self.lhs_norms[i] + self.rhs_norms[j] - 2.0 * dot).max(0.0);
        (-self.gamma * squared_distance).exp()
    }
}
