//! Error types for ratefit.
//!
//! Every error carries:
//! - a stable numeric code, grouped by category
//! - a category for filtering (config, data, numeric, io)
//! - a one-line headline and a remediation hint for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Malformed Input Row
//!   Reason: line 14: invalid count "n/a" in column 1
//!   Fix: Column values must be non-negative integers. Fix the row or choose another column.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 22,
//!   "category": "data",
//!   "message": "line 14: invalid count \"n/a\" in column 1",
//!   "context": { "line": 14 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ratefit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration files and option values.
    Config,
    /// Input CSV content.
    Data,
    /// Model fitting and numerical problems.
    Numeric,
    /// File I/O and serialization.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Numeric => write!(f, "numeric"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for ratefit.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    // Data errors (20-29)
    #[error("line {line}: {message}")]
    MalformedRow { line: u64, message: String },

    #[error("line {line}: missing column {column}")]
    MissingColumn { line: u64, column: usize },

    #[error("line {line}: invalid count {value:?} in column {column}")]
    InvalidCount {
        line: u64,
        column: usize,
        value: String,
    },

    #[error("insufficient data: {bins} bin(s) available, at least {required} required")]
    InsufficientData { bins: usize, required: usize },

    // Numeric errors (30-39)
    #[error("optimizer error: {0}")]
    Optimizer(String),

    // I/O errors (40-49)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable error code:
    /// - 10-19: configuration
    /// - 20-29: input data
    /// - 30-39: numeric
    /// - 40-49: I/O
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::ConfigParse { .. } => 11,
            Error::InvalidValue { .. } => 12,
            Error::MalformedRow { .. } => 20,
            Error::MissingColumn { .. } => 21,
            Error::InvalidCount { .. } => 22,
            Error::InsufficientData { .. } => 23,
            Error::Optimizer(_) => 30,
            Error::Io(_) => 40,
            Error::FileRead { .. } => 41,
            Error::Json(_) => 42,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::ConfigParse { .. } | Error::InvalidValue { .. } => {
                ErrorCategory::Config
            }
            Error::MalformedRow { .. }
            | Error::MissingColumn { .. }
            | Error::InvalidCount { .. }
            | Error::InsufficientData { .. } => ErrorCategory::Data,
            Error::Optimizer(_) => ErrorCategory::Numeric,
            Error::Io(_) | Error::FileRead { .. } | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// A human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::ConfigParse { .. } => {
                "Check the TOML syntax of the config file, or run 'ratefit config show' to see the resolved values."
            }
            Error::InvalidValue { .. } => {
                "Fix the named setting in the config file or on the command line."
            }
            Error::MalformedRow { .. } => "The CSV row could not be parsed. Check quoting and delimiters.",
            Error::MissingColumn { .. } => {
                "Every row needs the count column. Set [data].count_column to the right index."
            }
            Error::InvalidCount { .. } => {
                "Column values must be non-negative integers. Fix the row or choose another column."
            }
            Error::InsufficientData { .. } => {
                "Provide more rows or a smaller bin size; the model needs at least two bins."
            }
            Error::Optimizer(_) => "Check the initial parameters and bounds in the [fit] section.",
            Error::Io(_) | Error::FileRead { .. } => "Check that the file exists and is readable.",
            Error::Json(_) => "Internal serialization failure. Retry with --format text.",
        }
    }

    /// A short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::ConfigParse { .. } => "Invalid Config File",
            Error::InvalidValue { .. } => "Invalid Setting",
            Error::MalformedRow { .. } => "Malformed CSV",
            Error::MissingColumn { .. } => "Missing Column",
            Error::InvalidCount { .. } => "Malformed Input Row",
            Error::InsufficientData { .. } => "Insufficient Data",
            Error::Optimizer(_) => "Optimizer Error",
            Error::Io(_) | Error::FileRead { .. } => "I/O Error",
            Error::Json(_) => "Serialization Error",
        }
    }
}

/// Machine-parseable form of an [`Error`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();
        match err {
            Error::ConfigParse { path, .. } | Error::FileRead { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::InvalidValue { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::MalformedRow { line, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
            }
            Error::MissingColumn { line, column } | Error::InvalidCount { line, column, .. } => {
                context.insert("line".to_string(), serde_json::json!(line));
                context.insert("column".to_string(), serde_json::json!(column));
            }
            Error::InsufficientData { bins, required } => {
                context.insert("bins".to_string(), serde_json::json!(bins));
                context.insert("required".to_string(), serde_json::json!(required));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            context,
        }
    }
}

impl StructuredError {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for stderr.
///
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
