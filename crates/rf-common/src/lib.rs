//! ratefit common types and errors.
//!
//! Shared by the math and core crates:
//! - the unified error type and its categories
//! - output formats

pub mod error;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use output::OutputFormat;

/// Version of the JSON report layout.
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";
