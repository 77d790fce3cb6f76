//! Eigen solvers over linear operators

pub mod direct;
pub mod operator;

pub use self::direct::{DirectEigenSolver, EigenSolver};
pub use self::operator::{DenseMatrixOperator, LinearOperator};
