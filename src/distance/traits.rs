//! Distance contract shared by distance-based machines

use crate::core::{Features, MachineError, Result, SparseFeatures};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Distance function bound to a left-hand side (reference) and right-hand
/// side (query) feature set
pub trait Distance: Send + Sync {
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

    /// Distance between lhs vector `i` and rhs vector `j`
    ///
    /// # Panics
    /// Panics if either index is out of range or the distance is not initialised
    fn distance(&self, i: usize, j: usize) -> f64;
}

/// Distance handle shared between machines and callers
pub type SharedDistance = Arc<RwLock<dyn Distance>>;

/// Wrap a distance into a shared handle
pub fn shared_distance<D: Distance + 'static>(distance: D) -> SharedDistance {
    Arc::new(RwLock::new(distance))
}

pub(crate) fn read_distance(
    distance: &SharedDistance,
) -> Result<RwLockReadGuard<'_, dyn Distance + 'static>> {
    distance
        .read()
        .map_err(|_| MachineError::PoisonedLock("distance"))
}

pub(crate) fn write_distance(
    distance: &SharedDistance,
) -> Result<RwLockWriteGuard<'_, dyn Distance + 'static>> {
    distance
        .write()
        .map_err(|_| MachineError::PoisonedLock("distance"))
}
