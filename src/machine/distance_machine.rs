//! Distance machine: nearest-reference classification

use crate::core::{MachineError, MulticlassLabels, Parallelism, Result, SparseFeatures};
use crate::distance::traits::{read_distance, write_distance};
use crate::distance::{Distance, SharedDistance};
use crate::utils::{arg_min, fill_blocks};
use log::debug;
use std::ops::Range;
use std::sync::Arc;

const NAME: &str = "DistanceMachine";

/// Machine built on a distance between references (lhs) and queries (rhs)
///
/// Each query is labelled with the index of its closest reference, so the
/// lhs usually holds cluster centres or class prototypes.
#[derive(Clone, Default)]
pub struct DistanceMachine {
    distance: Option<SharedDistance>,
    parallelism: Parallelism,
}

impl DistanceMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_distance(distance: SharedDistance) -> Self {
        Self {
            distance: Some(distance),
            ..Self::default()
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Replace the distance; the previous handle is released after the new
    /// one is stored
    pub fn set_distance(&mut self, distance: Option<SharedDistance>) {
        let previous = std::mem::replace(&mut self.distance, distance);
        drop(previous);
    }

    pub fn distance(&self) -> Option<SharedDistance> {
        self.distance.clone()
    }

    pub fn parallelism(&self) -> &Parallelism {
        &self.parallelism
    }

    /// Distances from lhs vectors `lhs` to rhs vector `idx_b`
    pub fn distances_lhs(&self, result: &mut [f64], lhs: Range<usize>, idx_b: usize) -> Result<()> {
        let guard = read_distance(self.require_distance("distances_lhs")?)?;
        let distance: &dyn Distance = &*guard;
        check_range(&lhs, distance.num_vec_lhs())?;
        check_index(idx_b, distance.num_vec_rhs())?;
        check_len("distances_lhs", result.len(), lhs.len())?;

        fill_blocks(result, &self.parallelism, |start, block| {
            for (offset, slot) in block.iter_mut().enumerate() {
                *slot = distance.distance(lhs.start + start + offset, idx_b);
            }
            Ok(())
        })
    }

    /// Distances from lhs vector `idx_a` to rhs vectors `rhs`
    pub fn distances_rhs(&self, result: &mut [f64], rhs: Range<usize>, idx_a: usize) -> Result<()> {
        let guard = read_distance(self.require_distance("distances_rhs")?)?;
        let distance: &dyn Distance = &*guard;
        check_range(&rhs, distance.num_vec_rhs())?;
        check_index(idx_a, distance.num_vec_lhs())?;
        check_len("distances_rhs", result.len(), rhs.len())?;

        fill_blocks(result, &self.parallelism, |start, block| {
            for (offset, slot) in block.iter_mut().enumerate() {
                *slot = distance.distance(idx_a, rhs.start + start + offset);
            }
            Ok(())
        })
    }

    /// Label every query with the index of its closest reference
    ///
    /// With `data` the distance is re-bound to (existing lhs, `data`).
    pub fn apply_multiclass(&self, data: Option<Arc<SparseFeatures>>) -> Result<MulticlassLabels> {
        let shared = self.require_distance("apply_multiclass")?;

        if let Some(data) = data {
            let mut distance = write_distance(shared)?;
            let lhs = distance.lhs().ok_or_else(|| {
                MachineError::Configuration(format!(
                    "{NAME}::apply_multiclass(): No left hand side specified"
                ))
            })?;
            distance.init(lhs, data)?;
        }

        let guard = read_distance(shared)?;
        let distance: &dyn Distance = &*guard;
        let num_lhs = distance.num_vec_lhs();
        if num_lhs == 0 {
            return Err(MachineError::Configuration(format!(
                "{NAME}::apply_multiclass(): No reference vectors on left hand side of {}",
                distance.name()
            )));
        }

        let num_rhs = distance.num_vec_rhs();
        debug!("{NAME}: labelling {num_rhs} vectors against {num_lhs} references");

        let mut labels = vec![0i32; num_rhs];
        fill_blocks(&mut labels, &self.parallelism, |start, block| {
            for (offset, slot) in block.iter_mut().enumerate() {
                *slot = nearest(distance, num_lhs, start + offset)? as i32;
            }
            Ok(())
        })?;

        Ok(MulticlassLabels::new(labels))
    }

    /// Index of the reference closest to rhs vector `num`
    pub fn apply_one(&self, num: usize) -> Result<usize> {
        let guard = read_distance(self.require_distance("apply_one")?)?;
        check_index(num, guard.num_vec_rhs())?;
        nearest(&*guard, guard.num_vec_lhs(), num)
    }

    fn require_distance(&self, operation: &str) -> Result<&SharedDistance> {
        self.distance.as_ref().ok_or_else(|| {
            MachineError::Configuration(format!("{NAME}::{operation}(): No distance assigned"))
        })
    }
}

fn nearest(distance: &dyn Distance, num_lhs: usize, j: usize) -> Result<usize> {
    arg_min((0..num_lhs).map(|i| distance.distance(i, j))).ok_or_else(|| {
        MachineError::Configuration(format!(
            "{NAME}: No reference vectors on left hand side of {}",
            distance.name()
        ))
    })
}

fn check_range(range: &Range<usize>, len: usize) -> Result<()> {
    if range.end > len {
        return Err(MachineError::IndexOutOfBounds {
            index: range.end - 1,
            len,
        });
    }
    Ok(())
}

fn check_index(index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(MachineError::IndexOutOfBounds { index, len });
    }
    Ok(())
}

fn check_len(operation: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(MachineError::dimension_mismatch(
            format!("{NAME}::{operation}() result"),
            expected,
            actual,
        ));
    }
    Ok(())
}
