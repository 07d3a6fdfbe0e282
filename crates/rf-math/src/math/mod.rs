//! Core math modules.

pub mod lbfgsb;
pub mod poisson;
pub mod stable;
