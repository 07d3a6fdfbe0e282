//! Stable event names, pipeline stages and the per-run logging context.
//!
//! Every event emitted through [`crate::log_event!`] carries the run id and
//! the stage, and uses one of the [`event_names`] constants as its target.

use serde::{Deserialize, Serialize};

/// Stages of the ratefit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// CSV reading.
    Load,
    /// Binning hourly rows.
    Aggregate,
    /// Train/test partition.
    Split,
    /// Likelihood minimization.
    Fit,
    /// Rendering the result.
    Report,
    /// Synthetic data generation.
    Simulate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Aggregate => "aggregate",
            Stage::Split => "split",
            Stage::Fit => "fit",
            Stage::Report => "report",
            Stage::Simulate => "simulate",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";

    // Data
    pub const DATA_LOADED: &str = "data.loaded";
    pub const SERIES_AGGREGATED: &str = "series.aggregated";
    pub const SERIES_PARTIAL_BIN: &str = "series.partial_bin";
    pub const SERIES_SPLIT: &str = "series.split";

    // Fit
    pub const FIT_STARTED: &str = "fit.started";
    pub const FIT_COMPLETED: &str = "fit.completed";
    pub const FIT_NOT_CONVERGED: &str = "fit.not_converged";

    // Simulate
    pub const SIMULATE_WRITTEN: &str = "simulate.written";
}

/// Correlation data shared by every event of one invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }
}
