//! Reporting: fit/simulation aggregates and formatted terminal output.
//!
//! Reports are built from engine-unit values; conversion to physical units
//! happens only when formatting.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::{ModelKind, ParameterBounds, ParameterVector};
use crate::error::FitError;
use crate::fit::{ParameterUncertainty, Termination};
use crate::models::ModelCurve;

/// Residual summary statistics shared by fits and simulations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidualSummary {
    /// `r_i = |Z_model - Z_data|` per windowed point.
    pub residuals: Vec<f64>,
    /// `sqrt(Σ r_i²)`.
    pub l2_norm: f64,
    /// `mean(r_i / |Z_data_i|) · 100`; `None` when some `|Z_data_i|` is zero.
    pub avg_residual_percent: Option<f64>,
}

impl ResidualSummary {
    /// Summarize residuals against the measured magnitudes at the same points.
    pub fn new(residuals: Vec<f64>, data_magnitude: &[f64]) -> Self {
        let l2_norm = residuals.iter().map(|r| r * r).sum::<f64>().sqrt();
        let n = residuals.len().max(1) as f64;
        let avg = residuals
            .iter()
            .zip(data_magnitude)
            .map(|(r, m)| r / m)
            .sum::<f64>()
            / n
            * 100.0;
        let avg_residual_percent = avg.is_finite().then_some(avg);
        Self {
            residuals,
            l2_norm,
            avg_residual_percent,
        }
    }
}

/// Outcome of one successful fit.
///
/// Parameter uncertainty can fail independently of the fit itself; the
/// fitted parameters are still reported in that case and the errors are
/// marked unavailable.
#[derive(Debug, Clone)]
pub struct FitReport {
    pub model: ModelKind,
    pub window: (f64, f64),
    /// Data-driven `Rmem` seed (engine units).
    pub rmem_seed: f64,
    pub bounds: ParameterBounds,
    /// Starting point handed to the solver (engine units).
    pub initial: ParameterVector,
    /// Fitted parameters (engine units).
    pub params: ParameterVector,
    pub uncertainty: Result<ParameterUncertainty, FitError>,
    pub summary: ResidualSummary,
    /// Fitted model at the windowed frequencies.
    pub curve: ModelCurve,
    pub evaluations: usize,
    pub iterations: usize,
    pub termination: Termination,
    pub active_bounds: Vec<&'static str>,
}

impl FitReport {
    pub fn standard_errors(&self) -> Option<[f64; 6]> {
        self.uncertainty.as_ref().ok().map(|u| u.standard_errors)
    }

    pub fn percent_errors(&self) -> Option<[Option<f64>; 6]> {
        self.uncertainty.as_ref().ok().map(|u| u.percent_errors)
    }

    pub fn l2_norm(&self) -> f64 {
        self.summary.l2_norm
    }

    pub fn avg_residual_percent(&self) -> Option<f64> {
        self.summary.avg_residual_percent
    }
}

/// Model evaluated at user-supplied parameters against a data window.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub model: ModelKind,
    pub window: (f64, f64),
    pub params: ParameterVector,
    pub summary: ResidualSummary,
    pub curve: ModelCurve,
}
