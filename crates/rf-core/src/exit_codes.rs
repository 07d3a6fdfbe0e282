//! Exit codes for the ratefit CLI.
//!
//! Exit code ranges:
//! - 0-1: a report was produced (converged or not)
//! - 10-19: user/input errors (recoverable by fixing arguments, config or data)
//! - 20-29: internal and I/O errors

use rf_common::{Error, ErrorCategory};

/// Process exit codes. Stable for scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-1)
    // ========================================================================
    /// Success: fit converged, or a non-fit command completed
    Clean = 0,

    /// Report printed but the optimizer stopped without converging
    NotConverged = 1,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid command-line arguments
    ArgsError = 10,

    /// Config file missing, unparsable or semantically invalid
    ConfigError = 11,

    /// Input CSV unusable
    DataError = 12,

    /// Objective could not be evaluated at the start point
    NumericError = 13,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for a failed run.
    pub fn from_error(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Data => ExitCode::DataError,
            ErrorCategory::Numeric => ExitCode::NumericError,
            ErrorCategory::Io => match err {
                Error::Json(_) => ExitCode::InternalError,
                _ => ExitCode::IoError,
            },
        }
    }

    /// Exit code for a run that produced a report.
    pub fn from_convergence(converged: bool) -> Self {
        if converged {
            ExitCode::Clean
        } else {
            ExitCode::NotConverged
        }
    }

    /// Stable name logged with the `run.finished` event.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::NotConverged => "OK_NOT_CONVERGED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::DataError => "ERR_DATA",
            ExitCode::NumericError => "ERR_NUMERIC",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::NotConverged.as_i32(), 1);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::NumericError.as_i32(), 13);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
    }

    #[test]
    fn test_code_names() {
        assert_eq!(ExitCode::Clean.code_name(), "OK_CLEAN");
        assert_eq!(ExitCode::NotConverged.code_name(), "OK_NOT_CONVERGED");
        assert_eq!(ExitCode::InternalError.code_name(), "ERR_INTERNAL");
    }

    #[test]
    fn test_from_error_by_category() {
        let data = Error::InsufficientData {
            bins: 0,
            required: 2,
        };
        assert_eq!(ExitCode::from_error(&data), ExitCode::DataError);
        assert_eq!(
            ExitCode::from_error(&Error::Config("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from_error(&Error::Optimizer("x".into())),
            ExitCode::NumericError
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ExitCode::from_error(&Error::from(io)), ExitCode::IoError);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::DataError.to_string(), "ERR_DATA (12)");
        assert_eq!(ExitCode::from_convergence(false), ExitCode::NotConverged);
    }
}
