//! Multiclass decomposition strategies and the machine built on them

pub mod machine;
pub mod one_vs_rest;
pub mod rejection;
pub mod strategy;

pub use self::machine::KernelMulticlassMachine;
pub use self::one_vs_rest::OneVsRestStrategy;
pub use self::rejection::ThresholdRejectionStrategy;
pub use self::strategy::{MulticlassStrategy, ProbHeuristic, RejectionStrategy, StrategyState};
