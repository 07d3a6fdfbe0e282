//! Poisson count likelihood terms.
//!
//! The regression model works on the log-rate scale, so every entry point
//! takes `eta = log(lambda)` directly. This keeps `k * log(lambda)` exact
//! when `lambda` itself would underflow.

use super::stable::log_factorial;

/// log P(K = k) for `K ~ Poisson(exp(eta))`.
pub fn poisson_log_pmf_log_rate(k: u64, eta: f64) -> f64 {
    poisson_kernel(k, eta) - log_factorial(k)
}

/// The parameter-dependent part of the log pmf: `k * eta - exp(eta)`.
///
/// Dropping `log(k!)` leaves the maximizer unchanged; this is the term the
/// regression objective sums.
pub fn poisson_kernel(k: u64, eta: f64) -> f64 {
    let k = k as f64;
    // k == 0 must not turn `0 * -inf` into NaN.
    let linear = if k == 0.0 { 0.0 } else { k * eta };
    linear - eta.exp()
}
