//! Bounded limited-memory BFGS minimizer.
//!
//! A compact member of the L-BFGS-B family for small, smooth problems:
//!
//! - the inverse Hessian is approximated from the last `m` curvature pairs
//!   with the two-loop recursion, scaled by `s'y / y'y`;
//! - box bounds are handled by projection: components of the search
//!   direction that would push an active variable further outside its box
//!   are zeroed, and trial points are clipped back into the box;
//! - step lengths satisfy the strong Wolfe conditions along the projected
//!   path. The search extrapolates while the slope stays steep, then zooms
//!   into the bracket with safeguarded quadratic interpolation. Trial points
//!   whose objective or gradient is not finite count as overshooting.
//!
//! Stopping rules and their messages follow the reference L-BFGS-B code so
//! reports read the same way:
//!
//! ```text
//! status 0  CONVERGENCE: NORM_OF_PROJECTED_GRADIENT_<=_PGTOL
//! status 0  CONVERGENCE: REL_REDUCTION_OF_F_<=_FACTR*EPSMCH
//! status 1  STOP: TOTAL NO. of ITERATIONS REACHED LIMIT
//! status 1  STOP: TOTAL NO. of f AND g EVALUATIONS EXCEEDS LIMIT
//! status 2  ABNORMAL_TERMINATION_IN_LNSRCH
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stable::{dot, norm2, norm_inf};

/// factr = 1e7 times machine epsilon.
pub const DEFAULT_FTOL: f64 = 1e7 * f64::EPSILON;
pub const DEFAULT_PGTOL: f64 = 1e-5;
pub const DEFAULT_MEMORY: usize = 10;
pub const DEFAULT_MAX_ITERATIONS: usize = 15_000;
pub const DEFAULT_MAX_EVALUATIONS: usize = 15_000;
pub const DEFAULT_MAX_LINE_SEARCH: usize = 20;

/// Sufficient-decrease constant of the Armijo condition.
const ARMIJO_C1: f64 = 1e-4;
/// Curvature constant of the strong Wolfe condition.
const WOLFE_C2: f64 = 0.9;
/// Step growth while the path is still steeply descending.
const EXTRAPOLATE: f64 = 4.0;
/// Zoom trials stay this fraction of the bracket away from either end.
const ZOOM_MARGIN: f64 = 0.1;
/// Fraction of the bracket kept after a non-finite trial value.
const NON_FINITE_SHRINK: f64 = 0.1;

/// A smooth function to minimize.
pub trait Objective {
    /// Number of parameters.
    fn dimension(&self) -> usize;

    /// Objective value and gradient at `x`.
    ///
    /// Non-finite values are allowed; the line search treats them as
    /// infeasible trial points.
    fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>);
}

/// Box constraint on a single parameter. `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

impl Bound {
    pub const UNBOUNDED: Bound = Bound {
        lower: None,
        upper: None,
    };

    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    /// Clip `value` into the box.
    pub fn project(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(lo) = self.lower {
            v = v.max(lo);
        }
        if let Some(hi) = self.upper {
            v = v.min(hi);
        }
        v
    }

    fn is_valid(&self) -> bool {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) => !lo.is_nan() && !hi.is_nan() && lo <= hi,
            (Some(lo), None) => !lo.is_nan(),
            (None, Some(hi)) => !hi.is_nan(),
            (None, None) => true,
        }
    }

    fn at_lower(&self, value: f64) -> bool {
        self.lower.is_some_and(|lo| value <= lo)
    }

    fn at_upper(&self, value: f64) -> bool {
        self.upper.is_some_and(|hi| value >= hi)
    }
}

/// Tuning knobs. Defaults match the reference L-BFGS-B defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// Number of curvature pairs kept (m).
    pub memory: usize,
    pub max_iterations: usize,
    /// Budget of objective+gradient evaluations.
    pub max_evaluations: usize,
    /// Stop when `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1) <= ftol`.
    pub ftol: f64,
    /// Stop when the infinity norm of the projected gradient is `<= pgtol`.
    pub pgtol: f64,
    /// Trial steps per line search.
    pub max_line_search: usize,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            memory: DEFAULT_MEMORY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            ftol: DEFAULT_FTOL,
            pgtol: DEFAULT_PGTOL,
            max_line_search: DEFAULT_MAX_LINE_SEARCH,
        }
    }
}

impl OptimizeOptions {
    pub fn validate(&self) -> Result<(), OptimizeError> {
        if self.memory == 0 {
            return Err(OptimizeError::InvalidOptions("memory must be at least 1".into()));
        }
        if self.max_line_search == 0 {
            return Err(OptimizeError::InvalidOptions(
                "max_line_search must be at least 1".into(),
            ));
        }
        if !(self.ftol.is_finite() && self.ftol >= 0.0) {
            return Err(OptimizeError::InvalidOptions(format!(
                "ftol must be finite and non-negative, got {}",
                self.ftol
            )));
        }
        if !(self.pgtol.is_finite() && self.pgtol >= 0.0) {
            return Err(OptimizeError::InvalidOptions(format!(
                "pgtol must be finite and non-negative, got {}",
                self.pgtol
            )));
        }
        Ok(())
    }
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    ProjectedGradient,
    RelativeReduction,
    MaxIterations,
    MaxEvaluations,
    LineSearchFailed,
}

impl Termination {
    /// Numeric status: 0 converged, 1 budget exhausted, 2 abnormal.
    pub fn status(&self) -> i32 {
        match self {
            Termination::ProjectedGradient | Termination::RelativeReduction => 0,
            Termination::MaxIterations | Termination::MaxEvaluations => 1,
            Termination::LineSearchFailed => 2,
        }
    }

    pub fn converged(&self) -> bool {
        self.status() == 0
    }

    pub fn message(&self) -> &'static str {
        match self {
            Termination::ProjectedGradient => "CONVERGENCE: NORM_OF_PROJECTED_GRADIENT_<=_PGTOL",
            Termination::RelativeReduction => "CONVERGENCE: REL_REDUCTION_OF_F_<=_FACTR*EPSMCH",
            Termination::MaxIterations => "STOP: TOTAL NO. of ITERATIONS REACHED LIMIT",
            Termination::MaxEvaluations => "STOP: TOTAL NO. of f AND g EVALUATIONS EXCEEDS LIMIT",
            Termination::LineSearchFailed => "ABNORMAL_TERMINATION_IN_LNSRCH",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of a minimization run. Always produced once the start point
/// evaluates finitely, whether or not the run converged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeResult {
    /// Best parameters found.
    pub x: Vec<f64>,
    /// Objective at `x`.
    pub fun: f64,
    /// Gradient at `x`.
    pub jac: Vec<f64>,
    /// Accepted steps.
    pub nit: usize,
    /// Objective+gradient evaluations.
    pub nfev: usize,
    pub status: i32,
    pub success: bool,
    pub message: String,
    pub termination: Termination,
    /// Infinity norm of the projected gradient at `x`.
    pub projected_gradient_norm: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("dimension mismatch: objective has {expected} parameters, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid bound for parameter {index}: lower={lower:?}, upper={upper:?}")]
    InvalidBound {
        index: usize,
        lower: Option<f64>,
        upper: Option<f64>,
    },

    #[error("objective is not finite at the starting point (value {value})")]
    NonFiniteStart { value: f64 },

    #[error("invalid optimizer options: {0}")]
    InvalidOptions(String),
}

/// Curvature pairs (s, y, 1/s'y), oldest first.
struct History {
    capacity: usize,
    pairs: VecDeque<(Vec<f64>, Vec<f64>, f64)>,
}

impl History {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pairs: VecDeque::with_capacity(capacity),
        }
    }

    fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn clear(&mut self) {
        self.pairs.clear();
    }

    /// Store a pair unless its curvature is negligible next to the
    /// predicted decrease `-g's` of the step.
    fn push(&mut self, s: Vec<f64>, y: Vec<f64>, decrease: f64) -> bool {
        let sy = dot(&s, &y);
        if !(sy > f64::EPSILON * decrease) || !sy.is_finite() {
            return false;
        }
        if self.pairs.len() == self.capacity {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y, 1.0 / sy));
        true
    }

    /// Two-loop recursion: returns H * g.
    fn apply(&self, g: &[f64]) -> Vec<f64> {
        let mut q = g.to_vec();
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for (s, y, rho) in self.pairs.iter().rev() {
            let a = rho * dot(s, &q);
            for (qi, yi) in q.iter_mut().zip(y) {
                *qi -= a * yi;
            }
            alphas.push(a);
        }

        let gamma = match self.pairs.back() {
            Some((s, y, _)) => dot(s, y) / dot(y, y),
            None => 1.0,
        };
        for qi in q.iter_mut() {
            *qi *= gamma;
        }

        for ((s, y, rho), a) in self.pairs.iter().zip(alphas.iter().rev()) {
            let b = rho * dot(y, &q);
            for (qi, si) in q.iter_mut().zip(s) {
                *qi += si * (a - b);
            }
        }
        q
    }
}

enum LineSearch {
    Accepted {
        x: Vec<f64>,
        f: f64,
        g: Vec<f64>,
        evaluations: usize,
    },
    Failed {
        evaluations: usize,
    },
    BudgetExhausted {
        evaluations: usize,
    },
}

/// Minimize `objective` from `x0` subject to `bounds`.
///
/// An empty `bounds` slice means every parameter is unbounded. The start
/// point is projected into the box before the first evaluation.
pub fn minimize<O: Objective + ?Sized>(
    objective: &O,
    x0: &[f64],
    bounds: &[Bound],
    options: &OptimizeOptions,
) -> Result<OptimizeResult, OptimizeError> {
    options.validate()?;

    let n = objective.dimension();
    if x0.len() != n {
        return Err(OptimizeError::DimensionMismatch {
            expected: n,
            actual: x0.len(),
        });
    }
    let bounds: Vec<Bound> = if bounds.is_empty() {
        vec![Bound::UNBOUNDED; n]
    } else {
        if bounds.len() != n {
            return Err(OptimizeError::DimensionMismatch {
                expected: n,
                actual: bounds.len(),
            });
        }
        bounds.to_vec()
    };
    if let Some((index, b)) = bounds.iter().enumerate().find(|(_, b)| !b.is_valid()) {
        return Err(OptimizeError::InvalidBound {
            index,
            lower: b.lower,
            upper: b.upper,
        });
    }

    let mut x: Vec<f64> = x0
        .iter()
        .zip(&bounds)
        .map(|(v, b)| b.project(*v))
        .collect();
    let (mut f, mut g) = objective.evaluate(&x);
    let mut nfev = 1;
    if !f.is_finite() || g.iter().any(|v| !v.is_finite()) {
        return Err(OptimizeError::NonFiniteStart { value: f });
    }

    let mut history = History::new(options.memory);
    let mut nit = 0;

    let termination = if projected_gradient_norm(&x, &g, &bounds) <= options.pgtol {
        Termination::ProjectedGradient
    } else {
        loop {
            if nit >= options.max_iterations {
                break Termination::MaxIterations;
            }
            if nfev >= options.max_evaluations {
                break Termination::MaxEvaluations;
            }

            let mut d = search_direction(&history, &x, &g, &bounds);
            if !(dot(&g, &d) < 0.0) {
                history.clear();
                d = search_direction(&history, &x, &g, &bounds);
            }

            let alpha0 = if history.is_empty() {
                (1.0 / norm2(&d)).min(1.0)
            } else {
                1.0
            };
            let budget = options.max_evaluations - nfev;
            match line_search(objective, &x, f, &g, &d, &bounds, alpha0, options, budget) {
                LineSearch::Accepted {
                    x: x_new,
                    f: f_new,
                    g: g_new,
                    evaluations,
                } => {
                    nfev += evaluations;
                    nit += 1;

                    let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
                    let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
                    let decrease = -dot(&g, &s);
                    history.push(s, y, decrease);

                    let f_old = f;
                    x = x_new;
                    f = f_new;
                    g = g_new;

                    if projected_gradient_norm(&x, &g, &bounds) <= options.pgtol {
                        break Termination::ProjectedGradient;
                    }
                    let scale = f_old.abs().max(f.abs()).max(1.0);
                    if f_old - f <= options.ftol * scale {
                        break Termination::RelativeReduction;
                    }
                }
                LineSearch::Failed { evaluations } => {
                    nfev += evaluations;
                    // Retry once along steepest descent before giving up.
                    if history.is_empty() {
                        break Termination::LineSearchFailed;
                    }
                    history.clear();
                }
                LineSearch::BudgetExhausted { evaluations } => {
                    nfev += evaluations;
                    break Termination::MaxEvaluations;
                }
            }
        }
    };

    let pg_norm = projected_gradient_norm(&x, &g, &bounds);
    Ok(OptimizeResult {
        x,
        fun: f,
        jac: g,
        nit,
        nfev,
        status: termination.status(),
        success: termination.converged(),
        message: termination.message().to_string(),
        termination,
        projected_gradient_norm: pg_norm,
    })
}

/// Infinity norm of `P(x - g) - x`.
pub fn projected_gradient_norm(x: &[f64], g: &[f64], bounds: &[Bound]) -> f64 {
    let step: Vec<f64> = x
        .iter()
        .zip(g)
        .zip(bounds)
        .map(|((xi, gi), b)| b.project(xi - gi) - xi)
        .collect();
    norm_inf(&step)
}

fn search_direction(history: &History, x: &[f64], g: &[f64], bounds: &[Bound]) -> Vec<f64> {
    let mut d: Vec<f64> = history.apply(g).into_iter().map(|v| -v).collect();
    for ((di, xi), b) in d.iter_mut().zip(x).zip(bounds) {
        if (b.at_lower(*xi) && *di < 0.0) || (b.at_upper(*xi) && *di > 0.0) {
            *di = 0.0;
        }
    }
    d
}

/// One evaluated point on the projected search path `P(x + alpha * d)`.
struct Trial {
    alpha: f64,
    x: Vec<f64>,
    f: f64,
    g: Vec<f64>,
    /// Derivative of the objective along the path at `alpha`. Components
    /// clipped by the box do not move and contribute nothing.
    slope: f64,
    /// Linearized decrease `g0'(x - x0)` from the start of the search.
    moved: f64,
    finite: bool,
}

/// The one-dimensional problem a line search works on.
struct SearchPath<'a, O: ?Sized> {
    objective: &'a O,
    x: &'a [f64],
    f: f64,
    g: &'a [f64],
    d: &'a [f64],
    bounds: &'a [Bound],
    slope0: f64,
}

impl<O: Objective + ?Sized> SearchPath<'_, O> {
    fn origin(&self) -> Trial {
        Trial {
            alpha: 0.0,
            x: self.x.to_vec(),
            f: self.f,
            g: self.g.to_vec(),
            slope: self.slope0,
            moved: 0.0,
            finite: true,
        }
    }

    fn point(&self, alpha: f64) -> Vec<f64> {
        self.x
            .iter()
            .zip(self.d)
            .zip(self.bounds)
            .map(|((xi, di), b)| b.project(xi + alpha * di))
            .collect()
    }

    /// Largest step after which the projected path stops moving.
    fn end(&self) -> f64 {
        self.x
            .iter()
            .zip(self.d)
            .zip(self.bounds)
            .map(|((xi, di), b)| {
                if *di > 0.0 {
                    b.upper.map_or(f64::INFINITY, |hi| (hi - xi) / di)
                } else if *di < 0.0 {
                    b.lower.map_or(f64::INFINITY, |lo| (lo - xi) / di)
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::max)
    }

    fn evaluate(&self, alpha: f64, point: Vec<f64>) -> Trial {
        let (f, g) = self.objective.evaluate(&point);
        let finite = f.is_finite() && g.iter().all(|v| v.is_finite());
        let slope: f64 = g
            .iter()
            .zip(self.d)
            .zip(point.iter().zip(self.x))
            .filter(|((_, di), (p, xi))| **p == **xi + alpha * **di)
            .map(|((gi, di), _)| gi * di)
            .sum();
        let moved: f64 = self
            .g
            .iter()
            .zip(point.iter().zip(self.x))
            .map(|(gi, (p, xi))| gi * (p - xi))
            .sum();
        Trial {
            alpha,
            x: point,
            f,
            g,
            slope,
            moved,
            finite,
        }
    }

    fn sufficient_decrease(&self, trial: &Trial) -> bool {
        trial.finite && trial.moved < 0.0 && trial.f <= self.f + ARMIJO_C1 * trial.moved
    }

    fn curvature(&self, trial: &Trial) -> bool {
        trial.slope.abs() <= -WOLFE_C2 * self.slope0
    }
}

fn accept(trial: Trial, evaluations: usize) -> LineSearch {
    LineSearch::Accepted {
        x: trial.x,
        f: trial.f,
        g: trial.g,
        evaluations,
    }
}

/// Fall back to the best point with sufficient decrease, if there is one.
fn settle(best: Trial, evaluations: usize) -> LineSearch {
    if best.alpha > 0.0 {
        accept(best, evaluations)
    } else {
        LineSearch::Failed { evaluations }
    }
}

#[allow(clippy::too_many_arguments)]
fn line_search<O: Objective + ?Sized>(
    objective: &O,
    x: &[f64],
    f: f64,
    g: &[f64],
    d: &[f64],
    bounds: &[Bound],
    alpha0: f64,
    options: &OptimizeOptions,
    budget: usize,
) -> LineSearch {
    let slope0 = dot(g, d);
    if !(slope0 < 0.0) || !alpha0.is_finite() {
        return LineSearch::Failed { evaluations: 0 };
    }
    let path = SearchPath {
        objective,
        x,
        f,
        g,
        d,
        bounds,
        slope0,
    };
    let end = path.end();

    let mut evaluations = 0;
    let mut trials = 0;

    // Extrapolate until a trial overshoots or the slope turns, which
    // brackets a strong Wolfe step between `lo` and `hi`.
    let mut prev = path.origin();
    let mut alpha = alpha0.min(end);
    let (mut lo, mut hi) = loop {
        if trials >= options.max_line_search {
            return settle(prev, evaluations);
        }
        if evaluations >= budget {
            return LineSearch::BudgetExhausted { evaluations };
        }
        let point = path.point(alpha);
        if point.as_slice() == x {
            return settle(prev, evaluations);
        }
        let trial = path.evaluate(alpha, point);
        evaluations += 1;
        trials += 1;

        if !path.sufficient_decrease(&trial) || (prev.alpha > 0.0 && trial.f >= prev.f) {
            break (prev, trial);
        }
        if path.curvature(&trial) || alpha >= end {
            return accept(trial, evaluations);
        }
        if trial.slope >= 0.0 {
            break (trial, prev);
        }
        alpha = (alpha * EXTRAPOLATE).min(end);
        prev = trial;
    };

    // Zoom: `lo` always has sufficient decrease and the lowest value seen.
    while trials < options.max_line_search {
        if evaluations >= budget {
            return LineSearch::BudgetExhausted { evaluations };
        }
        let width = hi.alpha - lo.alpha;
        let alpha = if hi.finite {
            let curvature = hi.f - lo.f - lo.slope * width;
            let guess = if curvature > 0.0 {
                lo.alpha - lo.slope * width * width / (2.0 * curvature)
            } else {
                lo.alpha + 0.5 * width
            };
            let near = lo.alpha + ZOOM_MARGIN * width;
            let far = lo.alpha + (1.0 - ZOOM_MARGIN) * width;
            guess.clamp(near.min(far), near.max(far))
        } else {
            lo.alpha + NON_FINITE_SHRINK * width
        };
        let point = path.point(alpha);
        if point.as_slice() == x {
            break;
        }
        let trial = path.evaluate(alpha, point);
        evaluations += 1;
        trials += 1;

        if !path.sufficient_decrease(&trial) || trial.f >= lo.f {
            hi = trial;
        } else {
            if path.curvature(&trial) {
                return accept(trial, evaluations);
            }
            if trial.slope * width >= 0.0 {
                hi = lo;
            }
            lo = trial;
        }
    }
    settle(lo, evaluations)
}
