//! ratefit core library.
//!
//! Poisson rate regression over binned hourly counts:
//! - CSV loading and fixed-size binning
//! - train/test partition
//! - log-linear Poisson likelihood and its maximum-likelihood fit
//! - report rendering, synthetic data generation
//! - configuration, logging and exit codes for the `ratefit` binary
//!
//! The binary entry point is in `main.rs`.

pub mod aggregate;
pub mod config;
pub mod data;
pub mod exit_codes;
pub mod fit;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod simulate;
pub mod split;

pub use aggregate::{aggregate, AggregatedSeries, SeriesView};
pub use fit::{fit, FitReport};
pub use model::PoissonRegression;
pub use split::TrainTestSplit;
