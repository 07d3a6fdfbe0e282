//! ratefit math utilities.

pub mod math;

pub use math::lbfgsb::{
    minimize, Bound, Objective, OptimizeError, OptimizeOptions, OptimizeResult, Termination,
};
pub use math::poisson::*;
pub use math::stable::*;
