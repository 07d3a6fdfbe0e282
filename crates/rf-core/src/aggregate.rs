//! Fixed-size binning of hourly counts into daily totals.
//!
//! A running sum is flushed every `bin_size` rows. Bin `k` (0-based) covers
//! rows `k * bin_size .. (k + 1) * bin_size` and carries the time value
//! `t = k + 1`. A trailing partial bin is dropped, so the series always has
//! `floor(rows / bin_size)` points.

use serde::{Deserialize, Serialize};

/// Parallel time/count sequences, one entry per complete bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    /// Bin index, starting at 1.
    pub t: Vec<f64>,
    /// Summed count per bin.
    pub x: Vec<u64>,
    pub bin_size: usize,
    /// Number of input rows, including any dropped tail.
    pub source_rows: usize,
}

/// Borrowed window over an [`AggregatedSeries`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesView<'a> {
    pub t: &'a [f64],
    pub x: &'a [u64],
}

impl<'a> SeriesView<'a> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.x.iter().sum()
    }
}

impl AggregatedSeries {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.x.iter().sum()
    }

    /// Rows of the trailing partial bin that were not aggregated.
    pub fn discarded_rows(&self) -> usize {
        self.source_rows - self.len() * self.bin_size
    }

    pub fn view(&self) -> SeriesView<'_> {
        SeriesView {
            t: &self.t,
            x: &self.x,
        }
    }
}

/// Sum `counts` into bins of `bin_size` consecutive rows.
///
/// `bin_size == 0` yields an empty series; configuration validation rejects
/// it before this point.
pub fn aggregate(counts: &[u64], bin_size: usize) -> AggregatedSeries {
    let bins = if bin_size == 0 { 0 } else { counts.len() / bin_size };
    let mut t = Vec::with_capacity(bins);
    let mut x = Vec::with_capacity(bins);

    if bin_size > 0 {
        let mut running: u64 = 0;
        for (i, count) in counts.iter().enumerate() {
            running = running.saturating_add(*count);
            let row = i + 1;
            if row % bin_size == 0 {
                x.push(running);
                t.push((row / bin_size) as f64);
                running = 0;
            }
        }
    }

    AggregatedSeries {
        t,
        x,
        bin_size,
        source_rows: if bin_size == 0 { 0 } else { counts.len() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_hundred_forty_rows_make_26_days() {
        let counts: Vec<u64> = (0..640).map(|i| (i * 7 % 13) as u64).collect();
        let series = aggregate(&counts, 24);

        assert_eq!(series.len(), 26);
        assert_eq!(series.t.len(), series.x.len());
        for (k, chunk) in counts.chunks_exact(24).enumerate() {
            assert_eq!(series.x[k], chunk.iter().sum::<u64>(), "bin {k}");
            assert_eq!(series.t[k], (k + 1) as f64);
        }
        assert_eq!(series.discarded_rows(), 640 - 26 * 24);
    }

    #[test]
    fn exact_multiple_keeps_every_row() {
        let counts = vec![1u64; 48];
        let series = aggregate(&counts, 24);
        assert_eq!(series.x, vec![24, 24]);
        assert_eq!(series.t, vec![1.0, 2.0]);
        assert_eq!(series.discarded_rows(), 0);
        assert_eq!(series.total_count(), 48);
    }

    #[test]
    fn fewer_rows_than_one_bin() {
        let series = aggregate(&[3, 4, 5], 24);
        assert!(series.is_empty());
        assert_eq!(series.discarded_rows(), 3);
    }

    #[test]
    fn zero_bin_size_is_empty() {
        let series = aggregate(&[1, 2, 3], 0);
        assert!(series.is_empty());
        assert_eq!(series.discarded_rows(), 0);
    }

    #[test]
    fn view_matches_series() {
        let series = aggregate(&[1, 2, 3, 4, 5, 6, 7], 2);
        let view = series.view();
        assert_eq!(view.len(), 3);
        assert_eq!(view.x, &[3, 7, 11]);
        assert_eq!(view.total_count(), 21);
    }
}
