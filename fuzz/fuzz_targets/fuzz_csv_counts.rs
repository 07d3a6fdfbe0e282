//! Fuzz target for CSV count reading and binning.
//!
//! Arbitrary bytes must yield counts or an error, never a panic, and any
//! counts read must bin consistently.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rf_core::aggregate;
use rf_core::config::DataConfig;
use rf_core::data::read_counts;

fuzz_target!(|data: &[u8]| {
    let Ok(counts) = read_counts(data, &DataConfig::default()) else {
        return;
    };
    let series = aggregate(&counts, 24);
    assert_eq!(series.len() * 24 + series.discarded_rows(), counts.len());
});
