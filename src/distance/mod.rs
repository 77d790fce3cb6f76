//! Distance functions bound to lhs/rhs feature sets

pub mod euclidean;
pub mod traits;

pub use self::euclidean::*;
pub use self::traits::*;
