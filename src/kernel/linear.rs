//! Linear kernel implementation

use crate::core::{FeaturePair, MachineError, Result, SparseFeatures};
use crate::kernel::{Kernel, KernelProperty};
use log::trace;
use std::sync::Arc;

/// Linear kernel: K(x, y) = x^T * y
///
/// Supports both fast paths. With linear-add the weighted support vectors
/// collapse into one normal vector `w = Σ alpha_i x_i`, so scoring a query
/// is a single sparse-dense dot product regardless of the number of
/// support vectors.
#[derive(Debug, Clone, Default)]
pub struct LinearKernel {
    features: FeaturePair,
    normal: Option<Vec<f64>>,
}

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self::default()
    }

    /// Linear-add normal vector, if initialised
    pub fn normal(&self) -> Option<&[f64]> {
        self.normal.as_deref()
    }

    fn build_normal(lhs: &SparseFeatures, sv_indices: &[usize], sv_weights: &[f64]) -> Vec<f64> {
        let mut normal = vec![0.0; lhs.dim()];
        for (&sv, &weight) in sv_indices.iter().zip(sv_weights) {
            lhs.vector(sv).add_scaled_to(weight, &mut normal);
        }
        normal
    }
}

impl Kernel for LinearKernel {
    fn name(&self) -> &'static str {
        "LinearKernel"
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

    fn kernel(&self, i: usize, j: usize) -> f64 {
        let (lhs, rhs) = self.features.sides(self.name());
        lhs.vector(i).dot(rhs.vector(j))
    }

    fn has_property(&self, property: KernelProperty) -> bool {
        matches!(
            property,
            KernelProperty::LinAdd | KernelProperty::BatchEvaluation
        )
    }

    fn is_optimization_initialized(&self) -> bool {
        self.normal.is_some()
    }

    fn init_optimization(&mut self, sv_indices: &[usize], sv_weights: &[f64]) -> bool {
        let Some(lhs) = self.features.lhs.as_deref() else {
            return false;
        };
        if sv_indices.len() != sv_weights.len()
            || sv_indices.iter().any(|&sv| sv >= lhs.vectors().len())
        {
            return false;
        }

        trace!(
            "{}: folding {} support vectors into normal",
            self.name(),
            sv_indices.len()
        );
        self.normal = Some(Self::build_normal(lhs, sv_indices, sv_weights));
        true
    }

    fn delete_optimization(&mut self) {
        self.normal = None;
    }

    fn compute_optimized(&self, j: usize) -> Result<f64> {
        let normal = self.normal.as_deref().ok_or_else(|| {
            MachineError::Configuration(format!(
                "{}::compute_optimized(): optimization not initialised",
                self.name()
            ))
        })?;
        let (_, rhs) = self.features.sides(self.name());
        Ok(rhs.vector(j).dot_dense(normal))
    }

    fn compute_batch(
        &self,
        result: &mut [f64],
        query: &[usize],
        sv_indices: &[usize],
        sv_weights: &[f64],
    ) -> Result<()> {
        if result.len() != query.len() {
            return Err(MachineError::dimension_mismatch(
                "LinearKernel::compute_batch() result",
                query.len(),
                result.len(),
            ));
        }
        let (lhs, rhs) = self.features.sides(self.name());
        let normal = Self::build_normal(lhs, sv_indices, sv_weights);
        for (slot, &q) in result.iter_mut().zip(query) {
            *slot += rhs.vector(q).dot_dense(&normal);
        }
        Ok(())
    }
}
