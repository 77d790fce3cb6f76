//! Core traits for feature containers

use crate::core::Result;

/// Feature set abstraction consumed by kernels and distances
pub trait Features: Send + Sync {
    /// Number of vectors in the set
    fn num_vectors(&self) -> usize;

    /// Build a new feature set containing only `indices`, in that order
    ///
    /// Fails with `IndexOutOfBounds` if any index is not a member of the set.
    fn copy_subset(&self, indices: &[usize]) -> Result<Self>
    where
        Self: Sized;

    /// Check if the feature set is empty
    fn is_empty(&self) -> bool {
        self.num_vectors() == 0
    }
}
