//! Core type definitions: sparse vectors, feature sets, labels and settings

use crate::core::{Features, MachineError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Create a sparse vector from a dense slice, dropping exact zeros
    pub fn from_dense(dense: &[f64]) -> Self {
        let (indices, values) = dense
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0.0)
            .map(|(i, &v)| (i, v))
            .unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Compute L2 norm
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// One past the largest stored index (0 for an empty vector)
    pub fn dim(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }

    /// Dot product with another sparse vector
    ///
    /// Both index lists are sorted, so this is a merge in O(nnz(x) + nnz(y)).
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let mut result = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let x_idx = self.indices[i];
            let y_idx = other.indices[j];

            if x_idx == y_idx {
                result += self.values[i] * other.values[j];
                i += 1;
                j += 1;
            } else if x_idx < y_idx {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }

    /// Dot product with a dense vector; entries past its end count as zero
    pub fn dot_dense(&self, dense: &[f64]) -> f64 {
        self.indices
            .iter()
            .zip(&self.values)
            .filter_map(|(&i, &v)| dense.get(i).map(|&w| w * v))
            .sum()
    }

    /// Add `weight * self` into a dense accumulator, growing it when needed
    pub fn add_scaled_to(&self, weight: f64, dense: &mut Vec<f64>) {
        if dense.len() < self.dim() {
            dense.resize(self.dim(), 0.0);
        }
        for (&i, &v) in self.indices.iter().zip(&self.values) {
            dense[i] += weight * v;
        }
    }

    /// Squared Euclidean distance ||x - y||²
    ///
    /// Indices present in only one vector contribute that value squared.
    pub fn squared_distance(&self, other: &SparseVector) -> f64 {
        let mut distance_sq = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let x_idx = self.indices[i];
            let y_idx = other.indices[j];

            if x_idx == y_idx {
                let diff = self.values[i] - other.values[j];
                distance_sq += diff * diff;
                i += 1;
                j += 1;
            } else if x_idx < y_idx {
                distance_sq += self.values[i] * self.values[i];
                i += 1;
            } else {
                distance_sq += other.values[j] * other.values[j];
                j += 1;
            }
        }

        distance_sq += self.values[i..].iter().map(|v| v * v).sum::<f64>();
        distance_sq += other.values[j..].iter().map(|v| v * v).sum::<f64>();

        distance_sq
    }
}

/// Ordered collection of sparse vectors addressed by position
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseFeatures {
    vectors: Vec<SparseVector>,
}

impl SparseFeatures {
    /// Create a feature set from sparse vectors
    pub fn new(vectors: Vec<SparseVector>) -> Self {
        Self { vectors }
    }

    /// Create a feature set from dense rows
    pub fn from_dense_rows(rows: &[Vec<f64>]) -> Self {
        Self::new(rows.iter().map(|r| SparseVector::from_dense(r)).collect())
    }

    /// Vector at position `i`
    ///
    /// # Panics
    /// Panics if `i >= num_vectors()`
    pub fn vector(&self, i: usize) -> &SparseVector {
        &self.vectors[i]
    }

    /// All vectors in order
    pub fn vectors(&self) -> &[SparseVector] {
        &self.vectors
    }

    /// Dimensionality spanned by the stored vectors
    pub fn dim(&self) -> usize {
        self.vectors.iter().map(SparseVector::dim).max().unwrap_or(0)
    }
}

impl Features for SparseFeatures {
    fn num_vectors(&self) -> usize {
        self.vectors.len()
    }

    fn copy_subset(&self, indices: &[usize]) -> Result<Self> {
        let vectors = indices
            .iter()
            .map(|&i| {
                self.vectors
                    .get(i)
                    .cloned()
                    .ok_or(MachineError::IndexOutOfBounds {
                        index: i,
                        len: self.vectors.len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { vectors })
    }
}

/// Lhs/rhs binding reused by concrete kernels and distances
#[derive(Debug, Clone, Default)]
pub(crate) struct FeaturePair {
    pub lhs: Option<Arc<SparseFeatures>>,
    pub rhs: Option<Arc<SparseFeatures>>,
}

impl FeaturePair {
    pub fn set(&mut self, lhs: Arc<SparseFeatures>, rhs: Arc<SparseFeatures>) {
        self.lhs = Some(lhs);
        self.rhs = Some(rhs);
    }

    /// Both sides, panicking with the owner's name when unbound
    pub fn sides(&self, owner: &str) -> (&SparseFeatures, &SparseFeatures) {
        match (&self.lhs, &self.rhs) {
            (Some(lhs), Some(rhs)) => (&**lhs, &**rhs),
            _ => panic!("{owner}: used before init()"),
        }
    }
}

/// Continuous-valued outputs of a regression machine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionLabels {
    values: Vec<f64>,
}

impl RegressionLabels {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Binary labels: raw scores plus their +1/-1 decision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinaryLabels {
    labels: Vec<f64>,
    values: Vec<f64>,
}

impl BinaryLabels {
    /// Labels of `len` examples, all set to -1 with zero scores
    pub fn with_len(len: usize) -> Self {
        Self {
            labels: vec![-1.0; len],
            values: vec![0.0; len],
        }
    }

    /// Decide labels from raw scores (`score >= 0` is the positive class)
    pub fn from_values(values: Vec<f64>) -> Self {
        let labels = values
            .iter()
            .map(|&v| if v >= 0.0 { 1.0 } else { -1.0 })
            .collect();
        Self { labels, values }
    }

    /// Label of example `i`
    ///
    /// # Panics
    /// Panics if `i >= len()`
    pub fn label(&self, i: usize) -> f64 {
        self.labels[i]
    }

    /// Overwrite the label of example `i`
    ///
    /// # Panics
    /// Panics if `i >= len()`
    pub fn set_label(&mut self, i: usize, label: f64) {
        self.labels[i] = label;
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    /// Raw scores the labels were decided from
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Integer class ids, with a reserved value for rejected examples
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticlassLabels {
    labels: Vec<i32>,
}

impl MulticlassLabels {
    /// Label emitted when a rejection strategy refuses to decide
    pub const REJECTION_LABEL: i32 = -2;

    pub fn new(labels: Vec<i32>) -> Self {
        Self { labels }
    }

    /// Class id of example `i`
    ///
    /// # Panics
    /// Panics if `i >= len()`
    pub fn label(&self, i: usize) -> i32 {
        self.labels[i]
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Number of classes, taken as the largest class id plus one
    pub fn num_classes(&self) -> usize {
        self.labels
            .iter()
            .filter(|&&l| l >= 0)
            .max()
            .map_or(0, |&l| l as usize + 1)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Settings of a kernel machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelMachineConfig {
    /// Use the kernel's batch evaluation when it offers one
    pub use_batch_computation: bool,
    /// Let training algorithms set up the linear-add optimization
    pub use_linadd: bool,
    /// Let training algorithms learn a bias term
    pub use_bias: bool,
}

impl Default for KernelMachineConfig {
    fn default() -> Self {
        Self {
            use_batch_computation: true,
            use_linadd: true,
            use_bias: true,
        }
    }
}

impl KernelMachineConfig {
    pub fn with_batch_computation(mut self, enable: bool) -> Self {
        self.use_batch_computation = enable;
        self
    }

    pub fn with_linadd(mut self, enable: bool) -> Self {
        self.use_linadd = enable;
        self
    }

    pub fn with_bias(mut self, enable: bool) -> Self {
        self.use_bias = enable;
        self
    }
}

/// Worker configuration for a parallel prediction call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parallelism {
    /// Number of workers: 0 uses the current rayon pool, 1 runs sequentially
    pub num_threads: usize,
    /// Report per-block progress through the logger
    pub show_progress: bool,
}

impl Default for Parallelism {
    fn default() -> Self {
        Self {
            num_threads: 0,
            show_progress: false,
        }
    }
}

impl Parallelism {
    /// Run on exactly `num_threads` workers
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Self::default()
        }
    }

    /// Run on the calling thread only
    pub fn sequential() -> Self {
        Self::with_threads(1)
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_vector_creation() {
        let sv = SparseVector::new(vec![2, 0, 4], vec![2.0, 1.0, 3.0]);

        assert_eq!(sv.indices, vec![0, 2, 4]);
        assert_eq!(sv.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(sv.dim(), 5);
    }

    #[test]
    fn test_sparse_vector_get() {
        let sv = SparseVector::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);

        assert_eq!(sv.get(0), 0.0);
        assert_eq!(sv.get(1), 1.0);
        assert_eq!(sv.get(3), 2.0);
        assert_eq!(sv.get(6), 0.0);
    }

    #[test]
    fn test_from_dense_drops_zeros() {
        let sv = SparseVector::from_dense(&[0.0, 1.5, 0.0, -2.0]);
        assert_eq!(sv.indices, vec![1, 3]);
        assert_eq!(sv.values, vec![1.5, -2.0]);
    }

    #[test]
    fn test_dot_product() {
        let x = SparseVector::new(vec![0, 2, 5], vec![1.0, 3.0, 2.0]);
        let y = SparseVector::new(vec![2, 3, 5], vec![2.0, 1.0, 4.0]);

        // Overlap at 2 and 5: 3*2 + 2*4
        assert_eq!(x.dot(&y), 14.0);
        assert_eq!(SparseVector::empty().dot(&y), 0.0);
    }

    #[test]
    fn test_dot_dense_and_accumulate() {
        let x = SparseVector::new(vec![0, 3], vec![2.0, 1.0]);
        let mut w = Vec::new();
        x.add_scaled_to(0.5, &mut w);
        assert_eq!(w, vec![1.0, 0.0, 0.0, 0.5]);

        let y = SparseVector::new(vec![0, 3, 9], vec![1.0, 2.0, 100.0]);
        assert_eq!(y.dot_dense(&w), 2.0);
    }

    #[test]
    fn test_squared_distance() {
        let x = SparseVector::new(vec![0, 2, 5], vec![1.0, 3.0, 2.0]);
        let y = SparseVector::new(vec![2, 3, 5], vec![2.0, 1.0, 4.0]);

        // 1 + 1 + 1 + 4
        assert_eq!(x.squared_distance(&y), 7.0);
        assert_eq!(x.squared_distance(&x), 0.0);
        assert_eq!(SparseVector::empty().squared_distance(&y), 21.0);
    }

    #[test]
    fn test_copy_subset_keeps_order() {
        let features = SparseFeatures::from_dense_rows(&[vec![1.0], vec![2.0], vec![3.0]]);
        let subset = features.copy_subset(&[2, 0]).expect("valid subset");

        assert_eq!(subset.num_vectors(), 2);
        assert_eq!(subset.vector(0).get(0), 3.0);
        assert_eq!(subset.vector(1).get(0), 1.0);
    }

    #[test]
    fn test_copy_subset_out_of_range() {
        let features = SparseFeatures::from_dense_rows(&[vec![1.0]]);
        let err = features.copy_subset(&[0, 4]).unwrap_err();
        assert!(matches!(
            err,
            MachineError::IndexOutOfBounds { index: 4, len: 1 }
        ));
    }

    #[test]
    fn test_binary_labels_from_values() {
        let labels = BinaryLabels::from_values(vec![0.3, -0.1, 0.0]);
        assert_eq!(labels.labels(), &[1.0, -1.0, 1.0]);
        assert_eq!(labels.values(), &[0.3, -0.1, 0.0]);
    }

    #[test]
    fn test_multiclass_num_classes() {
        let labels = MulticlassLabels::new(vec![0, 3, 1, MulticlassLabels::REJECTION_LABEL]);
        assert_eq!(labels.num_classes(), 4);
        assert_eq!(MulticlassLabels::new(vec![]).num_classes(), 0);
    }

    #[test]
    fn test_config_defaults() {
        let config = KernelMachineConfig::default();
        assert!(config.use_batch_computation);
        assert!(config.use_linadd);
        assert!(config.use_bias);

        let config = config.with_batch_computation(false).with_bias(false);
        assert!(!config.use_batch_computation);
        assert!(!config.use_bias);
    }

    #[test]
    fn test_parallelism_constructors() {
        assert_eq!(Parallelism::default().num_threads, 0);
        assert_eq!(Parallelism::sequential().num_threads, 1);
        assert!(Parallelism::with_threads(4).with_progress(true).show_progress);
    }

    #[test]
    #[should_panic(expected = "Indices and values must have same length")]
    fn test_sparse_vector_length_mismatch() {
        SparseVector::new(vec![0, 1], vec![1.0, 2.0, 3.0]);
    }
}
