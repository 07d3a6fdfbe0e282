//! Rendering a [`FitReport`] for stdout.
//!
//! Text output is the optimizer result block followed by the parameter line:
//!
//! ```text
//!       fun: -18986446.016010582
//!       jac: [-1.52587891e-5, -8.54492188e-3]
//!   message: CONVERGENCE: REL_REDUCTION_OF_F_<=_FACTR*EPSMCH
//!      nfev: 114
//!       nit: 22
//!    status: 0
//!   success: true
//!         x: [5.84448203e0, 4.67808684e-3]
//! theta_0: 5.844482030084; theta_1: 0.004678086843
//! ```

use crate::fit::FitReport;
use rf_common::{OutputFormat, Result};
use std::fmt::Write;

pub fn render(report: &FitReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Summary => Ok(render_summary(report)),
    }
}

/// The `theta_0: ..; theta_1: ..` line. Whole numbers keep their `.0`.
pub fn parameter_line(theta: &[f64; 2]) -> String {
    format!("theta_0: {:?}; theta_1: {:?}", theta[0], theta[1])
}

fn render_text(report: &FitReport) -> String {
    let result = &report.optimizer;
    let mut out = String::new();
    let mut field = |key: &str, value: String| {
        let _ = writeln!(out, "{key:>9}: {value}");
    };
    field("fun", result.fun.to_string());
    field("jac", format_array(&result.jac));
    field("message", result.message.clone());
    field("nfev", result.nfev.to_string());
    field("nit", result.nit.to_string());
    field("status", result.status.to_string());
    field("success", result.success.to_string());
    field("x", format_array(&result.x));
    out.push_str(&parameter_line(&report.theta));
    out.push('\n');
    out
}

fn render_summary(report: &FitReport) -> String {
    let status = if report.converged() {
        "converged"
    } else {
        "not converged"
    };
    format!(
        "{status}: theta_0={:.6} theta_1={:.6e} nll={:.6} nit={} nfev={} bins={}/{}\n",
        report.theta[0],
        report.theta[1],
        report.optimizer.fun,
        report.optimizer.nit,
        report.optimizer.nfev,
        report.fitted_bins,
        report.bins,
    )
}

fn format_array(values: &[f64]) -> String {
    let items: Vec<String> = values.iter().map(|v| format!("{v:.8e}")).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitScope;
    use rf_common::REPORT_SCHEMA_VERSION;
    use rf_math::{OptimizeResult, Termination};

    fn sample_report(termination: Termination) -> FitReport {
        FitReport {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            theta: [5.84448203, 0.00467808684],
            optimizer: OptimizeResult {
                x: vec![5.84448203, 0.00467808684],
                fun: -18986446.016,
                jac: vec![-0.0152587891, -8.54492188],
                nit: 22,
                nfev: 114,
                status: termination.status(),
                success: termination.converged(),
                message: termination.message().to_string(),
                termination,
                projected_gradient_norm: 8.54492188,
            },
            log_likelihood: -4321.5,
            scope: FitScope::All,
            bins: 660,
            fitted_bins: 660,
            train_bins: 638,
            test_bins: 22,
            discarded_rows: 3,
            total_count: 123_456,
        }
    }

    #[test]
    fn text_block_has_aligned_keys_and_parameter_line() {
        let text = render(&sample_report(Termination::RelativeReduction), OutputFormat::Text)
            .unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "      fun: -18986446.016");
        assert_eq!(
            lines[2],
            "  message: CONVERGENCE: REL_REDUCTION_OF_F_<=_FACTR*EPSMCH"
        );
        assert_eq!(lines[3], "     nfev: 114");
        assert_eq!(lines[6], "  success: true");
        assert_eq!(lines[7], "        x: [5.84448203e0, 4.67808684e-3]");
        assert_eq!(lines[8], "theta_0: 5.84448203; theta_1: 0.00467808684");
    }

    #[test]
    fn json_round_trips() {
        let report = sample_report(Termination::RelativeReduction);
        let json = render(&report, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["schema_version"], REPORT_SCHEMA_VERSION);
        assert_eq!(value["optimizer"]["nit"], 22);
        assert_eq!(value["optimizer"]["termination"], "relative_reduction");
        assert_eq!(value["scope"], "all");
        assert_eq!(value["train_bins"], 638);

        let back: FitReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.theta, report.theta);
    }

    #[test]
    fn summary_flags_non_convergence() {
        let converged = render(&sample_report(Termination::ProjectedGradient), OutputFormat::Summary)
            .unwrap();
        assert!(converged.starts_with("converged: theta_0=5.844482"));
        assert!(converged.contains("bins=660/660"));

        let stopped = render(&sample_report(Termination::MaxIterations), OutputFormat::Summary)
            .unwrap();
        assert!(stopped.starts_with("not converged:"));
    }

    #[test]
    fn parameter_line_keeps_decimal_point_on_whole_numbers() {
        assert_eq!(parameter_line(&[20.0, 0.0]), "theta_0: 20.0; theta_1: 0.0");
        assert_eq!(parameter_line(&[-1.5, 0.25]), "theta_0: -1.5; theta_1: 0.25");
    }
}
