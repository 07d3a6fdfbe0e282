//! Synthetic hourly counts with a known rate.
//!
//! Bin `k` (1-based) has total rate `exp(theta_0 + theta_1 * k)`. Each of its
//! `bin_size` hours draws `Poisson(rate / bin_size)`, so bin totals are
//! Poisson with the bin rate. Output is deterministic for a given seed.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Poisson};
use rf_common::{Error, Result};
use serde::Serialize;
use std::io::Write;

use crate::config::DEFAULT_BIN_SIZE;
use crate::model::PoissonRegression;

pub const DEFAULT_SEED: u64 = 42;

/// 2019-01-01T00:00:00Z
const DEFAULT_START_SECS: i64 = 1_546_300_800;

/// Upper bound on the rows reserved up front.
const MAX_PREALLOCATED_ROWS: usize = 1 << 20;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub theta: [f64; 2],
    /// Complete bins to generate.
    pub bins: usize,
    pub bin_size: usize,
    pub seed: u64,
    /// Timestamp of the first row.
    pub start: DateTime<Utc>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            theta: [0.0, 0.0],
            bins: 0,
            bin_size: DEFAULT_BIN_SIZE,
            seed: DEFAULT_SEED,
            start: DateTime::from_timestamp(DEFAULT_START_SECS, 0).unwrap_or_default(),
        }
    }
}

/// One generated CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRecord {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

pub fn simulate(config: &SimulationConfig) -> Result<Vec<HourlyRecord>> {
    if config.bin_size == 0 {
        return Err(invalid("bin_size", "must be at least 1".to_string()));
    }
    if let Some(i) = config.theta.iter().position(|v| !v.is_finite()) {
        return Err(invalid(
            &format!("theta{i}"),
            format!("must be finite, got {}", config.theta[i]),
        ));
    }

    let rows = config.bins.checked_mul(config.bin_size).ok_or_else(|| {
        invalid(
            "bins",
            format!(
                "{} bins of {} rows overflow the row count",
                config.bins, config.bin_size
            ),
        )
    })?;
    let last_row = i64::try_from(rows)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|span| config.start.checked_add_signed(span));
    if last_row.is_none() {
        return Err(invalid(
            "bins",
            format!(
                "{rows} hourly rows from {} run past the last representable timestamp",
                config.start
            ),
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut records = Vec::with_capacity(rows.min(MAX_PREALLOCATED_ROWS));
    let mut hour: i64 = 0;

    for k in 1..=config.bins {
        let bin_rate = PoissonRegression::rate(&config.theta, k as f64);
        let hourly = Poisson::new(bin_rate / config.bin_size as f64).map_err(|e| {
            invalid(
                "theta",
                format!("bin {k} has rate {bin_rate}, not a valid Poisson mean: {e}"),
            )
        })?;
        for _ in 0..config.bin_size {
            records.push(HourlyRecord {
                timestamp: config.start + Duration::hours(hour),
                count: hourly.sample(&mut rng) as u64,
            });
            hour += 1;
        }
    }

    tracing::debug!(
        bins = config.bins,
        rows = records.len(),
        seed = config.seed,
        "simulated hourly counts"
    );
    Ok(records)
}

/// Write `timestamp,count` rows with RFC 3339 UTC timestamps.
pub fn write_csv<W: Write>(records: &[HourlyRecord], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["timestamp", "count"]).map_err(csv_io)?;
    for record in records {
        let timestamp = record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
        out.write_record([timestamp, record.count.to_string()])
            .map_err(csv_io)?;
    }
    out.flush()?;
    Ok(())
}

fn csv_io(err: csv::Error) -> Error {
    Error::Io(err.into())
}

fn invalid(field: &str, message: String) -> Error {
    Error::InvalidValue {
        field: format!("simulate.{field}"),
        message,
    }
}
