//! Poisson log-linear rate model.
//!
//! The count in bin `k` is Poisson with rate `λ_k = exp(θ0 + θ1 · t_k)`.
//! The minimized objective is the negative log-likelihood without the
//! `log x!` constant:
//!
//! ```text
//! NLL(θ) = Σ_k exp(θ0 + θ1 t_k) − x_k (θ0 + θ1 t_k)
//! ∇NLL(θ) = Σ_k (exp(η_k) − x_k) · (1, t_k)
//! ```
//!
//! Dropping the constant does not move the minimizer; the full
//! log-likelihood is available separately for reporting.

use crate::aggregate::SeriesView;
use rf_math::{poisson_kernel, poisson_log_pmf_log_rate, Objective};

#[derive(Debug, Clone, Copy)]
pub struct PoissonRegression<'a> {
    data: SeriesView<'a>,
}

impl<'a> PoissonRegression<'a> {
    pub fn new(data: SeriesView<'a>) -> Self {
        Self { data }
    }

    pub fn bins(&self) -> usize {
        self.data.len()
    }

    /// Linear predictor `θ0 + θ1 · t`.
    #[inline]
    pub fn eta(theta: &[f64; 2], t: f64) -> f64 {
        theta[0] + theta[1] * t
    }

    /// Expected count at time `t`.
    pub fn rate(theta: &[f64; 2], t: f64) -> f64 {
        Self::eta(theta, t).exp()
    }

    pub fn nll(&self, theta: &[f64; 2]) -> f64 {
        self.points()
            .map(|(t, x)| -poisson_kernel(x, Self::eta(theta, t)))
            .sum()
    }

    pub fn gradient(&self, theta: &[f64; 2]) -> [f64; 2] {
        let mut grad = [0.0; 2];
        for (t, x) in self.points() {
            let residual = Self::eta(theta, t).exp() - x as f64;
            grad[0] += residual;
            grad[1] += residual * t;
        }
        grad
    }

    /// Full log-likelihood, including `−log x!`.
    pub fn log_likelihood(&self, theta: &[f64; 2]) -> f64 {
        self.points()
            .map(|(t, x)| poisson_log_pmf_log_rate(x, Self::eta(theta, t)))
            .sum()
    }

    fn points(&self) -> impl Iterator<Item = (f64, u64)> + 'a {
        let SeriesView { t, x } = self.data;
        t.iter().copied().zip(x.iter().copied())
    }
}

impl Objective for PoissonRegression<'_> {
    fn dimension(&self) -> usize {
        2
    }

    fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let theta = [x[0], x[1]];
        (self.nll(&theta), self.gradient(&theta).to_vec())
    }
}
