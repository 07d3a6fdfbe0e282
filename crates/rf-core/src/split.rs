//! Leading/trailing train/test partition of an aggregated series.
//!
//! The test part is reported but never evaluated.

use crate::aggregate::{AggregatedSeries, SeriesView};

#[derive(Debug, Clone, Copy)]
pub struct TrainTestSplit<'a> {
    /// First `min(train_size, len)` bins.
    pub train: SeriesView<'a>,
    /// Everything after the training bins.
    pub test: SeriesView<'a>,
}

impl<'a> TrainTestSplit<'a> {
    /// A series shorter than `train_size` is all train, empty test.
    pub fn new(series: &'a AggregatedSeries, train_size: usize) -> Self {
        let cut = train_size.min(series.len());
        let (t_train, t_test) = series.t.split_at(cut);
        let (x_train, x_test) = series.x.split_at(cut);
        Self {
            train: SeriesView {
                t: t_train,
                x: x_train,
            },
            test: SeriesView {
                t: t_test,
                x: x_test,
            },
        }
    }
}
