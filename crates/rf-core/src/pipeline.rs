//! End-to-end fit: load, aggregate, split, minimize.

use std::path::Path;

use crate::aggregate::aggregate;
use crate::config::Config;
use crate::data::load_counts;
use crate::fit::{fit, FitReport};
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::split::TrainTestSplit;
use rf_common::Result;

/// Run the whole pipeline on the CSV at `path`.
pub fn run_fit(path: &Path, config: &Config, ctx: &LogContext) -> Result<FitReport> {
    let counts = load_counts(path, &config.data)?;
    let path_label = path.display().to_string();
    log_event!(
        ctx,
        INFO,
        event_names::DATA_LOADED,
        Stage::Load,
        "csv loaded",
        path = path_label.as_str(),
        rows = counts.len()
    );
    fit_counts(&counts, config, ctx)
}

/// Pipeline from already-parsed hourly counts.
pub fn fit_counts(counts: &[u64], config: &Config, ctx: &LogContext) -> Result<FitReport> {
    let series = aggregate(counts, config.data.bin_size);
    log_event!(
        ctx,
        INFO,
        event_names::SERIES_AGGREGATED,
        Stage::Aggregate,
        "hourly rows binned",
        bins = series.len(),
        bin_size = series.bin_size,
        total_count = series.total_count()
    );
    if series.discarded_rows() > 0 {
        log_event!(
            ctx,
            WARN,
            event_names::SERIES_PARTIAL_BIN,
            Stage::Aggregate,
            "trailing partial bin discarded",
            discarded_rows = series.discarded_rows()
        );
    }

    let split = TrainTestSplit::new(&series, config.split.train_size);
    log_event!(
        ctx,
        DEBUG,
        event_names::SERIES_SPLIT,
        Stage::Split,
        "train/test split",
        train_bins = split.train.len(),
        test_bins = split.test.len()
    );
    if split.train.len() < config.split.train_size {
        log_event!(
            ctx,
            WARN,
            event_names::SERIES_SPLIT,
            Stage::Split,
            "series shorter than the training size; test partition is empty",
            bins = series.len(),
            train_size = config.split.train_size
        );
    }

    let scope = config.fit.scope.to_string();
    log_event!(
        ctx,
        INFO,
        event_names::FIT_STARTED,
        Stage::Fit,
        "minimizing negative log-likelihood",
        scope = scope.as_str(),
        theta0 = config.fit.initial_theta[0],
        theta1 = config.fit.initial_theta[1]
    );
    let report = fit(&series, &split, &config.fit, &config.optimizer)?;
    log_event!(
        ctx,
        INFO,
        event_names::FIT_COMPLETED,
        Stage::Fit,
        "fit finished",
        theta0 = report.theta[0],
        theta1 = report.theta[1],
        fun = report.optimizer.fun,
        nit = report.optimizer.nit,
        nfev = report.optimizer.nfev,
        status = report.optimizer.status
    );
    if !report.converged() {
        log_event!(
            ctx,
            WARN,
            event_names::FIT_NOT_CONVERGED,
            Stage::Fit,
            "optimizer stopped without converging",
            reason = report.optimizer.message.as_str()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::{simulate, write_csv, SimulationConfig};
    use tempfile::TempDir;

    fn ctx() -> LogContext {
        LogContext::new("run-test")
    }

    #[test]
    fn csv_to_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counts.csv");
        let records = simulate(&SimulationConfig {
            theta: [4.0, 0.002],
            bins: 120,
            seed: 17,
            ..SimulationConfig::default()
        })
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        write_csv(&records, file).unwrap();

        let report = run_fit(&path, &Config::default(), &ctx()).unwrap();
        assert_eq!(report.bins, 120);
        assert_eq!(report.train_bins, 120);
        assert_eq!(report.test_bins, 0);
        assert_eq!(report.discarded_rows, 0);
        assert!(report.converged());
        assert!((report.theta[0] - 4.0).abs() < 0.1);
    }

    #[test]
    fn partial_bin_is_dropped() {
        let mut counts = vec![3u64; 24 * 10];
        counts.extend([100, 100, 100]);
        let report = fit_counts(&counts, &Config::default(), &ctx()).unwrap();
        assert_eq!(report.bins, 10);
        assert_eq!(report.discarded_rows, 3);
        assert_eq!(report.total_count, 3 * 24 * 10);
    }

    #[test]
    fn too_few_rows_is_data_error() {
        let err = fit_counts(&[1u64; 30], &Config::default(), &ctx()).unwrap_err();
        assert_eq!(err.category(), rf_common::ErrorCategory::Data);
    }
}
