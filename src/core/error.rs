//! Error types for kernel machines and their collaborators

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MachineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Missing capability: {0}")]
    Capability(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Index {index} out of range (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Lock poisoned: {0}")]
    PoisonedLock(&'static str),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl MachineError {
    /// Shorthand for a dimension mismatch raised by `context`
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, MachineError>;
