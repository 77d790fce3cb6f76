//! Utility functions shared by machines and strategies

pub mod parallel;

pub use self::parallel::{block_lengths, fill_blocks, WorkerPool};

/// Index of the largest value; ties keep the first occurrence
///
/// Returns `None` for an empty slice.
pub fn arg_max(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the smallest value; ties keep the first occurrence
pub fn arg_min(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Indices ordered by descending value; equal values keep ascending index
pub fn argsort_descending(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    // Stable sort keeps ascending index among ties
    indices.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    indices
}
