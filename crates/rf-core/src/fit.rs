//! Maximum-likelihood fit of the Poisson rate model.
//!
//! The likelihood is summed over the whole series by default, even though a
//! train/test split is computed; `scope = "train"` restricts it to the
//! training bins.

use crate::aggregate::{AggregatedSeries, SeriesView};
use crate::config::{FitConfig, FitScope};
use crate::model::PoissonRegression;
use crate::split::TrainTestSplit;
use rf_common::{Error, Result, REPORT_SCHEMA_VERSION};
use rf_math::{minimize, OptimizeOptions, OptimizeResult};
use serde::{Deserialize, Serialize};

/// Fewest bins that identify both parameters.
pub const MIN_BINS: usize = 2;

/// Everything a run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub schema_version: String,
    /// Fitted `(theta_0, theta_1)`.
    pub theta: [f64; 2],
    pub optimizer: OptimizeResult,
    /// Log-likelihood at `theta` including the `-log(x!)` terms.
    pub log_likelihood: f64,
    pub scope: FitScope,
    /// Bins in the aggregated series.
    pub bins: usize,
    /// Bins the likelihood was summed over.
    pub fitted_bins: usize,
    pub train_bins: usize,
    pub test_bins: usize,
    /// Input rows dropped with the trailing partial bin.
    pub discarded_rows: usize,
    /// Sum of all aggregated counts.
    pub total_count: u64,
}

impl FitReport {
    pub fn converged(&self) -> bool {
        self.optimizer.success
    }
}

/// Fit the rate model to `series`.
///
/// A run that stops without converging still yields a report; only invalid
/// input or a start point where the objective is not finite is an error.
pub fn fit(
    series: &AggregatedSeries,
    split: &TrainTestSplit<'_>,
    config: &FitConfig,
    options: &OptimizeOptions,
) -> Result<FitReport> {
    let data: SeriesView<'_> = match config.scope {
        FitScope::All => series.view(),
        FitScope::Train => split.train,
    };
    if data.len() < MIN_BINS {
        return Err(Error::InsufficientData {
            bins: data.len(),
            required: MIN_BINS,
        });
    }

    let model = PoissonRegression::new(data);
    let result = minimize(&model, &config.initial_theta, &config.bounds, options)
        .map_err(|e| Error::Optimizer(e.to_string()))?;

    let theta = [result.x[0], result.x[1]];
    Ok(FitReport {
        schema_version: REPORT_SCHEMA_VERSION.to_string(),
        theta,
        log_likelihood: model.log_likelihood(&theta),
        optimizer: result,
        scope: config.scope,
        bins: series.len(),
        fitted_bins: data.len(),
        train_bins: split.train.len(),
        test_bins: split.test.len(),
        discarded_rows: series.discarded_rows(),
        total_count: series.total_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::config::DEFAULT_TRAIN_SIZE;
    use crate::simulate::{simulate, SimulationConfig};
    use rf_math::{Bound, Termination};

    fn simulated_series(theta: [f64; 2], bins: usize, seed: u64) -> AggregatedSeries {
        let config = SimulationConfig {
            theta,
            bins,
            seed,
            ..SimulationConfig::default()
        };
        let records = simulate(&config).unwrap();
        let counts: Vec<u64> = records.iter().map(|r| r.count).collect();
        aggregate(&counts, config.bin_size)
    }

    #[test]
    fn recovers_known_parameters_from_default_start() {
        let truth = [5.8, 0.0047];
        let series = simulated_series(truth, 660, 7);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);

        let report = fit(&series, &split, &FitConfig::default(), &OptimizeOptions::default())
            .unwrap();

        assert!(report.converged(), "{}", report.optimizer.message);
        assert!((report.theta[0] - truth[0]).abs() < 0.05, "theta_0 {}", report.theta[0]);
        assert!((report.theta[1] - truth[1]).abs() < 5e-4, "theta_1 {}", report.theta[1]);
        assert_eq!(report.bins, 660);
        assert_eq!(report.fitted_bins, 660);
        assert_eq!(report.train_bins, 638);
        assert_eq!(report.test_bins, 22);
        assert!(report.optimizer.fun < 0.0);
    }

    #[test]
    fn steep_badly_scaled_series_converges_from_default_start() {
        // Daily totals span e^10 to e^20, so the start (20, 0) sits on a
        // gradient near 1e14 with a Hessian condition number near 1e6.
        let truth = [10.0, 0.01];
        let series = simulated_series(truth, 1000, 1);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);

        let report = fit(&series, &split, &FitConfig::default(), &OptimizeOptions::default())
            .unwrap();

        assert!(report.converged(), "{}", report.optimizer.message);
        assert!(report.optimizer.nit < 200, "nit {}", report.optimizer.nit);
        assert!((report.theta[0] - truth[0]).abs() < 0.01, "theta_0 {}", report.theta[0]);
        assert!((report.theta[1] - truth[1]).abs() < 1e-4, "theta_1 {}", report.theta[1]);
    }

    #[test]
    fn train_scope_fits_only_training_bins() {
        let series = simulated_series([3.0, 0.002], 700, 11);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);
        let config = FitConfig {
            scope: FitScope::Train,
            initial_theta: [1.0, 0.0],
            ..FitConfig::default()
        };

        let report = fit(&series, &split, &config, &OptimizeOptions::default()).unwrap();
        assert_eq!(report.fitted_bins, 638);
        assert_eq!(report.scope, FitScope::Train);
        assert!(report.converged());
        assert!((report.theta[0] - 3.0).abs() < 0.1);
    }

    #[test]
    fn fitted_gradient_is_small() {
        let series = simulated_series([2.0, 0.01], 200, 3);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);
        let config = FitConfig {
            initial_theta: [0.0, 0.0],
            ..FitConfig::default()
        };
        let report = fit(&series, &split, &config, &OptimizeOptions::default()).unwrap();

        let model = PoissonRegression::new(series.view());
        let grad = model.gradient(&report.theta);
        let scale = series.total_count() as f64;
        assert!(grad[0].abs() / scale < 1e-3, "{grad:?}");
        assert!(report.log_likelihood < 0.0);
        assert!(report.log_likelihood < -report.optimizer.fun);
    }

    #[test]
    fn bounds_are_respected() {
        let series = simulated_series([4.0, 0.003], 100, 5);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);
        let config = FitConfig {
            initial_theta: [1.0, -0.5],
            bounds: vec![Bound::new(None, Some(3.0)), Bound::new(Some(-1.0), Some(1.0))],
            ..FitConfig::default()
        };
        let report = fit(&series, &split, &config, &OptimizeOptions::default()).unwrap();
        assert!(report.theta[0] <= 3.0);
        assert!(report.theta[0] > 2.9, "{:?}", report.theta);
        assert!((-1.0..=1.0).contains(&report.theta[1]));
    }

    #[test]
    fn iteration_limit_is_reported_not_raised() {
        let series = simulated_series([5.0, 0.001], 50, 9);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);
        let options = OptimizeOptions {
            max_iterations: 1,
            ..OptimizeOptions::default()
        };
        let report = fit(&series, &split, &FitConfig::default(), &options).unwrap();
        assert!(!report.converged());
        assert_eq!(report.optimizer.termination, Termination::MaxIterations);
        assert_eq!(report.optimizer.status, 1);
    }

    #[test]
    fn single_bin_is_insufficient() {
        let series = aggregate(&[1u64; 30], 24);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);
        let err = fit(&series, &split, &FitConfig::default(), &OptimizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientData { bins: 1, required: 2 }));
    }

    #[test]
    fn overflowing_start_is_numeric_error() {
        let series = aggregate(&[1u64; 24 * 5], 24);
        let split = TrainTestSplit::new(&series, DEFAULT_TRAIN_SIZE);
        let config = FitConfig {
            initial_theta: [1000.0, 0.0],
            ..FitConfig::default()
        };
        let err = fit(&series, &split, &config, &OptimizeOptions::default()).unwrap_err();
        assert_eq!(err.category(), rf_common::ErrorCategory::Numeric);
    }
}
