//! Machines: prediction drivers over kernels and distances

pub mod distance_machine;
pub mod kernel_machine;
pub mod model;
pub mod parameters;

pub use self::distance_machine::DistanceMachine;
pub use self::kernel_machine::KernelMachine;
pub use self::model::SupportVectorModel;
pub use self::parameters::{Parameter, ParameterKind, ParameterValue};
