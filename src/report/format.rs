//! Formatted terminal output.
//!
//! Values are printed in physical units (`Lwire`, `Rmem`, `Rcl` multiplied by
//! the cell area).

use crate::domain::{CellGeometry, ParameterVector};
use crate::report::{FitReport, SimulationReport};

const UNITS: [&str; 6] = [
    "H*cm^2",
    "ohm*cm^2",
    "ohm*cm^2",
    "F/(cm^2*s^phi)",
    "",
    "",
];

/// Summary of one fit.
pub fn format_fit_summary(name: &str, report: &FitReport, geometry: &CellGeometry) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== eisfit - {name} ===\n"));
    out.push_str(&format!("Model: {}\n", report.model.display_name()));
    out.push_str(&format!(
        "Window: ({}, {}) Hz | points={}\n",
        report.window.0,
        report.window.1,
        report.curve.len()
    ));
    out.push_str(&format!(
        "Solver: {:?} after {} iterations, {} evaluations\n",
        report.termination, report.iterations, report.evaluations
    ));
    out.push_str(&format!(
        "Rmem seed: {:.8} ohm*cm^2\n",
        report.rmem_seed * geometry.area
    ));

    out.push('\n');
    out.push_str(&format!(
        "{:<8} {:>16} {:>12} {:>10}  {}\n",
        "param", "value", "std err", "err %", "unit"
    ));
    out.push_str(&format!("{:-<8} {:-<16} {:-<12} {:-<10}  {:-<14}\n", "", "", "", "", ""));

    let values = geometry.denormalize(&report.params).to_array();
    let scales = unit_scales(geometry);
    let se = report.standard_errors();
    let pct = report.percent_errors();
    for i in 0..ParameterVector::LEN {
        let se_s = se.map_or_else(|| "n/a".to_string(), |v| format!("{:.3e}", v[i] * scales[i]));
        let pct_s = pct
            .and_then(|v| v[i])
            .map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
        let pinned = if report.active_bounds.contains(&ParameterVector::NAMES[i]) {
            "  (at bound)"
        } else {
            ""
        };
        out.push_str(
            format!(
                "{:<8} {:>16} {:>12} {:>10}  {}{pinned}\n",
                ParameterVector::NAMES[i],
                fmt_value(values[i]),
                se_s,
                pct_s,
                UNITS[i]
            )
            .trim_end(),
        );
        out.push('\n');
    }
    if let Err(e) = &report.uncertainty {
        out.push_str(&format!("(standard errors unavailable: {e})\n"));
    }

    out.push('\n');
    out.push_str(&format!(
        "Qdl/mg Pt: {:.6}\n",
        geometry.qdl_per_mg(report.params.qdl)
    ));
    out.push_str(&format!(
        "L2 norm of residuals: {:.8} ohm*cm^2\n",
        report.l2_norm() * geometry.area
    ));
    out.push_str(&format!(
        "Avg |Z| residual: {} % of data |Z|\n",
        fmt_percent(report.avg_residual_percent())
    ));

    out
}

/// Summary of one simulation.
pub fn format_simulation_summary(name: &str, sim: &SimulationReport, geometry: &CellGeometry) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== eisfit sim - {name} ===\n"));
    out.push_str(&format!("Model: {}\n", sim.model.display_name()));
    out.push_str(&format!(
        "Window: ({}, {}) Hz | points={}\n",
        sim.window.0,
        sim.window.1,
        sim.curve.len()
    ));
    let values = geometry.denormalize(&sim.params).to_array();
    for i in 0..ParameterVector::LEN {
        out.push_str(
            format!(
                "  {:<8} {:>16}  {}\n",
                ParameterVector::NAMES[i],
                fmt_value(values[i]),
                UNITS[i]
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str(&format!(
        "Avg |Z| residual: {} % of data |Z|\n",
        fmt_percent(sim.summary.avg_residual_percent)
    ));

    out
}

/// Model curve as a table (frequency, Re, Im, |Z|, phase).
pub fn format_curve_table(sim: &SimulationReport) -> String {
    let c = &sim.curve;
    let mut out = String::new();
    out.push_str(&format!(
        "{:>12} {:>14} {:>14} {:>14} {:>10} {:>12}\n",
        "f (Hz)", "Re(Z)", "Im(Z)", "|Z|", "phase", "residual"
    ));
    for i in 0..c.len() {
        out.push_str(&format!(
            "{:>12.4} {:>14.6e} {:>14.6e} {:>14.6e} {:>10.3} {:>12.4e}\n",
            c.frequency[i], c.real[i], c.imag[i], c.magnitude[i], c.phase[i], sim.summary.residuals[i]
        ));
    }
    out
}

fn unit_scales(geometry: &CellGeometry) -> [f64; 6] {
    let a = geometry.area;
    [a, a, a, 1.0, 1.0, 1.0]
}

fn fmt_percent(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

fn fmt_value(v: f64) -> String {
    if v != 0.0 && v.abs() < 1e-3 {
        format!("{v:.4e}")
    } else {
        format!("{v:.8}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelKind, ParameterBounds};
    use crate::error::FitError;
    use crate::fit::{ParameterUncertainty, Termination};
    use crate::models::ModelCurve;
    use crate::report::ResidualSummary;

    fn report(uncertainty: Result<ParameterUncertainty, FitError>) -> FitReport {
        let params = ParameterVector {
            lwire: 4e-7,
            rmem: 6e-4,
            rcl: 2e-3,
            qdl: 2.5,
            phi: 0.95,
            theta: 0.95,
        };
        let f = vec![100.0, 10.0];
        FitReport {
            model: ModelKind::TransmissionLine,
            window: (1.0, 10_000.0),
            rmem_seed: 6e-4,
            bounds: ParameterBounds::around_rmem(6e-4, 0.1),
            initial: params,
            params,
            uncertainty,
            summary: ResidualSummary::new(vec![1e-4, 2e-4], &[0.01, 0.02]),
            curve: ModelCurve::evaluate(ModelKind::TransmissionLine, &params, &f),
            evaluations: 12,
            iterations: 9,
            termination: Termination::Ftol,
            active_bounds: vec!["Theta"],
        }
    }

    #[test]
    fn fit_summary_shows_physical_units() {
        let u = ParameterUncertainty {
            standard_errors: [1e-8, 1e-5, 2e-5, 0.01, 0.001, 0.002],
            percent_errors: [None, Some(1.7), Some(1.0), Some(0.4), Some(0.1), Some(0.2)],
            sigma_squared: 1e-8,
        };
        let geometry = CellGeometry {
            area: 50.0,
            loading: 0.1,
        };
        let text = format_fit_summary("cell_a", &report(Ok(u)), &geometry);
        assert!(text.contains("=== eisfit - cell_a ==="));
        assert!(text.contains("Transmission Line"));
        // Rmem = 6e-4 * 50
        assert!(text.contains("0.03000000"));
        // Rmem std err = 1e-5 * 50
        assert!(text.contains("5.000e-4"));
        assert!(text.contains("Qdl/mg Pt: 0.500000"));
        assert!(text.contains("(at bound)"));
        assert!(!text.contains("unavailable"));
        // Lwire has a standard error but no percent error.
        let lwire = text.lines().find(|l| l.starts_with("Lwire")).unwrap();
        assert!(lwire.contains("5.000e-7"));
        assert!(lwire.contains("n/a"));
    }

    #[test]
    fn fit_summary_marks_missing_errors() {
        let geometry = CellGeometry {
            area: 1.0,
            loading: 1.0,
        };
        let err = FitError::InsufficientData { n: 2, params: 6 };
        let text = format_fit_summary("cell_b", &report(Err(err)), &geometry);
        assert!(text.contains("n/a"));
        assert!(text.contains("standard errors unavailable"));
    }
}
