//! Eigen solver by full dense decomposition

use crate::core::{MachineError, Result};
use crate::eigsolver::LinearOperator;
use log::debug;
use nalgebra::SymmetricEigen;
use std::sync::Arc;

/// Extreme eigenvalues of a linear operator
pub trait EigenSolver {
    /// Compute whatever extreme eigenvalue is not yet known
    fn compute(&mut self) -> Result<()>;

    fn min_eigenvalue(&self) -> f64;

    fn max_eigenvalue(&self) -> f64;

    fn is_computed_min(&self) -> bool;

    fn is_computed_max(&self) -> bool;

    /// Store a known minimum and mark it computed
    fn set_min_eigenvalue(&mut self, value: f64);

    /// Store a known maximum and mark it computed
    fn set_max_eigenvalue(&mut self, value: f64);

    /// Forget both eigenvalues so the next `compute` starts afresh
    fn reset(&mut self);
}

/// Solver for dense symmetric operators
///
/// After `compute` the minimum is marked computed while the maximum is
/// not, so a later `compute` decomposes again unless the maximum has been
/// set explicitly.
pub struct DirectEigenSolver {
    operator: Arc<dyn LinearOperator>,
    min_eigenvalue: f64,
    max_eigenvalue: f64,
    is_computed_min: bool,
    is_computed_max: bool,
}

impl DirectEigenSolver {
    pub fn new(operator: Arc<dyn LinearOperator>) -> Self {
        Self {
            operator,
            min_eigenvalue: 0.0,
            max_eigenvalue: 0.0,
            is_computed_min: false,
            is_computed_max: false,
        }
    }

    pub fn operator(&self) -> Arc<dyn LinearOperator> {
        Arc::clone(&self.operator)
    }
}

impl EigenSolver for DirectEigenSolver {
    fn compute(&mut self) -> Result<()> {
        if self.is_computed_min && self.is_computed_max {
            debug!("DirectEigenSolver: extreme eigenvalues already computed");
            return Ok(());
        }

        let dense = self.operator.as_dense().ok_or_else(|| {
            MachineError::TypeMismatch(format!(
                "DirectEigenSolver::compute(): {} is not a dense matrix operator",
                self.operator.name()
            ))
        })?;
        let n = dense.dimension();
        if n == 0 {
            return Err(MachineError::Configuration(
                "DirectEigenSolver::compute(): operator has dimension 0".to_string(),
            ));
        }
        if !dense.is_symmetric() {
            return Err(MachineError::TypeMismatch(
                "DirectEigenSolver::compute(): dense operator is not symmetric".to_string(),
            ));
        }

        let eigen = SymmetricEigen::new(dense.matrix().clone());
        let mut eigenvalues: Vec<f64> = eigen.eigenvalues.iter().copied().collect();
        eigenvalues.sort_by(f64::total_cmp);

        self.min_eigenvalue = eigenvalues[0];
        self.max_eigenvalue = eigenvalues[n - 1];
        self.is_computed_min = true;
        self.is_computed_max = false;

        debug!(
            "DirectEigenSolver: min = {}, max = {} for dimension {n}",
            self.min_eigenvalue, self.max_eigenvalue
        );
        Ok(())
    }

    fn min_eigenvalue(&self) -> f64 {
        self.min_eigenvalue
    }

    fn max_eigenvalue(&self) -> f64 {
        self.max_eigenvalue
    }

    fn is_computed_min(&self) -> bool {
        self.is_computed_min
    }

    fn is_computed_max(&self) -> bool {
        self.is_computed_max
    }

    fn set_min_eigenvalue(&mut self, value: f64) {
        self.min_eigenvalue = value;
        self.is_computed_min = true;
    }

    fn set_max_eigenvalue(&mut self, value: f64) {
        self.max_eigenvalue = value;
        self.is_computed_max = true;
    }

    fn reset(&mut self) {
        self.is_computed_min = false;
        self.is_computed_max = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eigsolver::DenseMatrixOperator;
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Dense operator counting how often its matrix is requested
    struct CountingOperator {
        inner: DenseMatrixOperator,
        requests: AtomicUsize,
    }

    impl LinearOperator for CountingOperator {
        fn name(&self) -> &'static str {
            "CountingOperator"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
            self.inner.apply(x)
        }

        fn as_dense(&self) -> Option<&DenseMatrixOperator> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Some(&self.inner)
        }
    }

    struct ImplicitOperator;

    impl LinearOperator for ImplicitOperator {
        fn name(&self) -> &'static str {
            "ImplicitOperator"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, x: &DVector<f64>) -> Result<DVector<f64>> {
            Ok(x.clone())
        }
    }

    fn counting_solver() -> (DirectEigenSolver, Arc<CountingOperator>) {
        let operator = Arc::new(CountingOperator {
            inner: DenseMatrixOperator::from_row_slice(2, &[2.0, 1.0, 1.0, 2.0])
                .expect("square"),
            requests: AtomicUsize::new(0),
        });
        (DirectEigenSolver::new(operator.clone()), operator)
    }

    #[test]
    fn test_extreme_eigenvalues() {
        let (mut solver, _) = counting_solver();
        solver.compute().expect("compute");

        assert_relative_eq!(solver.min_eigenvalue(), 1.0, epsilon = 1e-10);
        assert_relative_eq!(solver.max_eigenvalue(), 3.0, epsilon = 1e-10);
        assert!(solver.is_computed_min());
        assert!(!solver.is_computed_max());
    }

    #[test]
    fn test_recomputes_while_max_unmarked() {
        let (mut solver, operator) = counting_solver();
        solver.compute().expect("first");
        solver.compute().expect("second");

        assert_eq!(operator.requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_recomputation_when_both_known() {
        let (mut solver, operator) = counting_solver();
        solver.compute().expect("compute");
        solver.set_max_eigenvalue(solver.max_eigenvalue());
        let requests = operator.requests.load(Ordering::SeqCst);

        solver.compute().expect("no-op");
        solver.compute().expect("no-op");

        assert_eq!(operator.requests.load(Ordering::SeqCst), requests);
        assert_relative_eq!(solver.min_eigenvalue(), 1.0, epsilon = 1e-10);

        solver.reset();
        solver.compute().expect("after reset");
        assert_eq!(operator.requests.load(Ordering::SeqCst), requests + 1);
    }

    #[test]
    fn test_rejects_implicit_operator() {
        let mut solver = DirectEigenSolver::new(Arc::new(ImplicitOperator));
        assert!(matches!(
            solver.compute(),
            Err(MachineError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_rejects_empty_and_asymmetric() {
        let empty = DenseMatrixOperator::from_row_slice(0, &[]).expect("empty");
        let mut solver = DirectEigenSolver::new(Arc::new(empty));
        assert!(matches!(
            solver.compute(),
            Err(MachineError::Configuration(_))
        ));

        let skewed = DenseMatrixOperator::from_row_slice(2, &[1.0, 5.0, 0.0, 1.0]).expect("square");
        let mut solver = DirectEigenSolver::new(Arc::new(skewed));
        assert!(matches!(
            solver.compute(),
            Err(MachineError::TypeMismatch(_))
        ));
    }
}
