//! JSON export of fit results.
//!
//! One document per run, holding every fitted spectrum. Parameters are
//! written in both engine (area-normalized) and physical units; a spectrum
//! whose fit failed is kept with its error message and, when available, the
//! best parameters reached.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CellGeometry, ModelKind, ParameterVector};
use crate::error::{AppError, FitError};
use crate::fit::Termination;
use crate::models::ModelCurve;
use crate::report::FitReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitDocument {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub model: ModelKind,
    pub geometry: CellGeometry,
    pub window_hz: (f64, f64),
    pub spectra: Vec<SpectrumEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumEntry {
    pub name: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_params: Option<ParameterVector>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitEntry {
    pub params: ParameterVector,
    pub params_physical: ParameterVector,
    /// `None` when the Jacobian did not allow an uncertainty estimate.
    pub standard_errors: Option<[f64; 6]>,
    /// Entries are `null` for parameters fitted to zero.
    pub percent_errors: Option<[Option<f64>; 6]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncertainty_error: Option<String>,
    pub qdl_per_mg: f64,
    pub rmem_seed: f64,
    pub l2_norm: f64,
    pub avg_residual_percent: Option<f64>,
    pub residuals: Vec<f64>,
    pub evaluations: usize,
    pub iterations: usize,
    pub termination: Termination,
    pub active_bounds: Vec<String>,
    pub curve: ModelCurve,
}

impl FitEntry {
    pub fn from_report(report: &FitReport, geometry: &CellGeometry) -> Self {
        Self {
            params: report.params,
            params_physical: geometry.denormalize(&report.params),
            standard_errors: report.standard_errors(),
            percent_errors: report.percent_errors(),
            uncertainty_error: report.uncertainty.as_ref().err().map(|e| e.to_string()),
            qdl_per_mg: geometry.qdl_per_mg(report.params.qdl),
            rmem_seed: report.rmem_seed,
            l2_norm: report.l2_norm(),
            avg_residual_percent: report.avg_residual_percent(),
            residuals: report.summary.residuals.clone(),
            evaluations: report.evaluations,
            iterations: report.iterations,
            termination: report.termination,
            active_bounds: report.active_bounds.iter().map(|s| s.to_string()).collect(),
            curve: report.curve.clone(),
        }
    }
}

impl SpectrumEntry {
    pub fn new(name: &str, input: &Path, result: &Result<FitReport, FitError>, geometry: &CellGeometry) -> Self {
        let (fit, error, best_params) = match result {
            Ok(report) => (Some(FitEntry::from_report(report, geometry)), None, None),
            Err(e) => (None, Some(e.to_string()), e.best_params().copied()),
        };
        Self {
            name: name.to_string(),
            input: input.display().to_string(),
            fit,
            error,
            best_params,
        }
    }
}

/// Write a fit document.
pub fn write_fit_json(path: &Path, doc: &FitDocument) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, doc)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON: {e}")))?;
    Ok(())
}

/// Read a fit document.
pub fn read_fit_json(path: &Path) -> Result<FitDocument, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))
}
