//! Linear operators consumed by eigen solvers

use crate::core::{MachineError, Result};
use nalgebra::{DMatrix, DVector};

/// Square linear map `x -> A x`
pub trait LinearOperator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of rows (and columns) of the operator
    fn dimension(&self) -> usize;

    fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>>;

    /// The explicit matrix, for operators that store one
    fn as_dense(&self) -> Option<&DenseMatrixOperator> {
        None
    }
}

/// Operator backed by an explicit dense matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrixOperator {
    matrix: DMatrix<f64>,
}

impl DenseMatrixOperator {
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        if !matrix.is_square() {
            return Err(MachineError::dimension_mismatch(
                "DenseMatrixOperator columns",
                matrix.nrows(),
                matrix.ncols(),
            ));
        }
        Ok(Self { matrix })
    }

    /// Build an `n x n` operator from row-major values
    pub fn from_row_slice(n: usize, values: &[f64]) -> Result<Self> {
        if values.len() != n * n {
            return Err(MachineError::dimension_mismatch(
                "DenseMatrixOperator values",
                n * n,
                values.len(),
            ));
        }
        Self::new(DMatrix::from_row_slice(n, n, values))
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Symmetric up to a tolerance relative to the largest entry
    pub fn is_symmetric(&self) -> bool {
        let m = &self.matrix;
        let scale = m.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
        let tolerance = 1e-9 * scale;
        (0..m.nrows()).all(|i| (0..i).all(|j| (m[(i, j)] - m[(j, i)]).abs() <= tolerance))
    }
}

impl LinearOperator for DenseMatrixOperator {
    fn name(&self) -> &'static str {
        "DenseMatrixOperator"
    }

    fn dimension(&self) -> usize {
        self.matrix.nrows()
    }

    fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
        if x.len() != self.dimension() {
            return Err(MachineError::dimension_mismatch(
                "DenseMatrixOperator::apply() input",
                self.dimension(),
                x.len(),
            ));
        }
        Ok(&self.matrix * x)
    }

    fn as_dense(&self) -> Option<&DenseMatrixOperator> {
        Some(self)
    }
}
