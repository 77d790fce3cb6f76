//! Kernel machines and their companions
//!
//! Prediction from a weighted sum of kernel evaluations against a stored
//! support-vector set, nearest-reference classification over a distance,
//! one-vs-rest multiclass decoding and extreme eigenvalues of dense
//! symmetric operators.

pub mod core;
pub mod distance;
pub mod eigsolver;
pub mod kernel;
pub mod machine;
pub mod multiclass;
pub mod utils;

// Re-export main types for convenience
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{MachineError, Result};
pub use crate::distance::{shared_distance, Distance, EuclideanDistance, SharedDistance};
pub use crate::eigsolver::{DenseMatrixOperator, DirectEigenSolver, EigenSolver, LinearOperator};
pub use crate::kernel::{
    shared_kernel, GaussianKernel, Kernel, KernelProperty, LinearKernel, SharedKernel,
};
pub use crate::machine::{DistanceMachine, KernelMachine, SupportVectorModel};
pub use crate::multiclass::{
    KernelMulticlassMachine, MulticlassStrategy, OneVsRestStrategy, ProbHeuristic,
    RejectionStrategy, ThresholdRejectionStrategy,
};
pub use crate::utils::WorkerPool;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
