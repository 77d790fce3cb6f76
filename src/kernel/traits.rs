//! Kernel capability contract

use crate::core::{Features, MachineError, Result, SparseFeatures};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Optional fast paths a kernel may advertise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelProperty {
    /// Weighted support vectors can be folded into a cache for fast
    /// single-example evaluation
    LinAdd,
    /// Many query examples can be scored against many support vectors in
    /// one call
    BatchEvaluation,
}

/// Kernel function bound to a left-hand side (training) and right-hand side
/// (query) feature set
///
/// `kernel(i, j)` evaluates lhs vector `i` against rhs vector `j`. Evaluation
/// methods take `&self` and are called concurrently from prediction workers,
/// so any optimization cache must be built before prediction starts.
pub trait Kernel: Send + Sync {
    /// Short kernel name for logs and parameter listings
    fn name(&self) -> &'static str;

    /// Pair `lhs` against `rhs`
    fn init(&mut self, lhs: Arc<SparseFeatures>, rhs: Arc<SparseFeatures>) -> Result<()>;

    fn lhs(&self) -> Option<Arc<SparseFeatures>>;

    fn rhs(&self) -> Option<Arc<SparseFeatures>>;

    fn num_vec_lhs(&self) -> usize {
        self.lhs().map_or(0, |f| f.num_vectors())
    }

    fn num_vec_rhs(&self) -> usize {
        self.rhs().map_or(0, |f| f.num_vectors())
    }

    /// Similarity between lhs vector `i` and rhs vector `j`
    ///
    /// # Panics
    /// Panics if either index is out of range or the kernel is not initialised
    fn kernel(&self, i: usize, j: usize) -> f64;

    fn has_property(&self, _property: KernelProperty) -> bool {
        false
    }

    /// Whether `init_optimization` has populated the linear-add cache
    fn is_optimization_initialized(&self) -> bool {
        false
    }

    /// Fold weighted lhs vectors into the linear-add cache
    ///
    /// Returns `false` if the cache could not be built.
    fn init_optimization(&mut self, _sv_indices: &[usize], _sv_weights: &[f64]) -> bool {
        false
    }

    /// Drop the linear-add cache
    fn delete_optimization(&mut self) {}

    /// Score rhs vector `j` against the linear-add cache
    fn compute_optimized(&self, _j: usize) -> Result<f64> {
        Err(MachineError::Capability(format!(
            "{}::compute_optimized(): linear-add optimization not supported",
            self.name()
        )))
    }

    /// Accumulate `Σ_i sv_weights[i] * kernel(sv_indices[i], query[q])` into
    /// `result[q]` for every query position `q`
    fn compute_batch(
        &self,
        _result: &mut [f64],
        _query: &[usize],
        _sv_indices: &[usize],
        _sv_weights: &[f64],
    ) -> Result<()> {
        Err(MachineError::Capability(format!(
            "{}::compute_batch(): batch evaluation not supported",
            self.name()
        )))
    }
}

/// Kernel handle shared between machines and callers
pub type SharedKernel = Arc<RwLock<dyn Kernel>>;

/// Wrap a kernel into a shared handle
pub fn shared_kernel<K: Kernel + 'static>(kernel: K) -> SharedKernel {
    Arc::new(RwLock::new(kernel))
}

pub(crate) fn read_kernel(
    kernel: &SharedKernel,
) -> Result<RwLockReadGuard<'_, dyn Kernel + 'static>> {
    kernel
        .read()
        .map_err(|_| MachineError::PoisonedLock("kernel"))
}

pub(crate) fn write_kernel(
    kernel: &SharedKernel,
) -> Result<RwLockWriteGuard<'_, dyn Kernel + 'static>> {
    kernel
        .write()
        .map_err(|_| MachineError::PoisonedLock("kernel"))
}
