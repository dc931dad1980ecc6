//! Shared fit/simulation pipeline used by the CLI commands.
//!
//! ingest -> normalize initial guess -> fit (parallel per file) -> reports

use std::time::{Duration, Instant};

use log::info;

use crate::domain::{FitConfig, Measurement, ModelKind, ParameterVector, CellGeometry};
use crate::error::{AppError, FitError};
use crate::fit::{FitOptions, fit_batch, simulate};
use crate::io::{LoadedSpectrum, load_spectrum};
use crate::report::{FitReport, SimulationReport};

/// One input file and the outcome of fitting it.
#[derive(Debug, Clone)]
pub struct SpectrumRun {
    pub spectrum: LoadedSpectrum,
    pub result: Result<FitReport, FitError>,
}

/// All computed outputs of a single `eisfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub runs: Vec<SpectrumRun>,
}

impl RunOutput {
    /// First failed fit, if any.
    pub fn first_error(&self) -> Option<&FitError> {
        self.runs.iter().find_map(|r| r.result.as_ref().err())
    }
}

/// Check geometry before it is used to scale parameters.
pub fn validate_geometry(geometry: &CellGeometry) -> Result<(), AppError> {
    if !(geometry.area.is_finite() && geometry.area > 0.0) {
        return Err(AppError::new(2, format!("Cell area must be > 0, got {}.", geometry.area)));
    }
    if !(geometry.loading.is_finite() && geometry.loading > 0.0) {
        return Err(AppError::new(
            2,
            format!("Catalyst loading must be > 0, got {}.", geometry.loading),
        ));
    }
    Ok(())
}

/// Solver-facing options for a run (initial guess converted to engine units).
pub fn fit_options(config: &FitConfig) -> FitOptions {
    FitOptions {
        model: config.model,
        initial: config.geometry.normalize(&config.initial),
        window: config.window,
        rmem_band: config.rmem_band,
        solver: config.solver.clone(),
    }
}

/// Load every file and fit them in parallel.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    validate_geometry(&config.geometry)?;
    if !(config.rmem_band.is_finite() && (0.0..1.0).contains(&config.rmem_band)) {
        return Err(AppError::new(
            2,
            format!("Rmem band must be in [0, 1), got {}.", config.rmem_band),
        ));
    }

    let spectra = config
        .files
        .iter()
        .map(|p| load_spectrum(p))
        .collect::<Result<Vec<_>, _>>()?;

    let opts = fit_options(config);
    let measurements: Vec<Measurement> = spectra.iter().map(|s| s.measurement.clone()).collect();
    info!(
        "fitting {} spectra with the {} model",
        measurements.len(),
        config.model.display_name()
    );
    let results = fit_batch(&measurements, &opts);

    let runs = spectra
        .into_iter()
        .zip(results)
        .map(|(spectrum, result)| SpectrumRun { spectrum, result })
        .collect();
    Ok(RunOutput { runs })
}

/// Load one file and evaluate the model at physical-unit `params`.
pub fn run_simulation(
    file: &std::path::Path,
    model: ModelKind,
    params: &ParameterVector,
    geometry: &CellGeometry,
    window: (f64, f64),
) -> Result<(LoadedSpectrum, SimulationReport), AppError> {
    validate_geometry(geometry)?;
    let spectrum = load_spectrum(file)?;
    let sim = simulate(&spectrum.measurement, model, &geometry.normalize(params), window)?;
    Ok((spectrum, sim))
}

/// Deadline for a fit started now, from an optional limit in seconds.
pub fn deadline_from_secs(secs: Option<f64>) -> Result<Option<Instant>, AppError> {
    match secs {
        None => Ok(None),
        Some(s) if s.is_finite() && s > 0.0 => Ok(Some(Instant::now() + Duration::from_secs_f64(s))),
        Some(s) => Err(AppError::new(2, format!("Timeout must be > 0 seconds, got {s}."))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{log_spaced, synthesize};
    use crate::domain::SolverOptions;
    use crate::io::write_spectrum;

    fn physical_truth() -> ParameterVector {
        ParameterVector {
            lwire: 2e-5,
            rmem: 1.0,
            rcl: 0.1,
            qdl: 2.5,
            phi: 0.95,
            theta: 0.95,
        }
    }

    fn geometry() -> CellGeometry {
        CellGeometry {
            area: 50.0,
            loading: 0.1,
        }
    }

    fn config(files: Vec<std::path::PathBuf>) -> FitConfig {
        FitConfig {
            files,
            model: ModelKind::TransmissionLine,
            initial: ParameterVector {
                rcl: 0.12,
                qdl: 2.3,
                ..physical_truth()
            },
            geometry: geometry(),
            window: (1.5, 8000.0),
            rmem_band: 0.1,
            solver: SolverOptions::default(),
            export_dir: None,
            export_json: None,
        }
    }

    fn write_synthetic(name: &str) -> std::path::PathBuf {
        let engine = geometry().normalize(&physical_truth());
        let f: Vec<f64> = log_spaced(1.0, 10_000.0, 40).into_iter().rev().collect();
        let m = synthesize(ModelKind::TransmissionLine, &engine, &f, None).unwrap();
        let dir = std::env::temp_dir().join("eis_fit_pipeline_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        write_spectrum(&path, &m, "synthetic").unwrap();
        path
    }

    #[test]
    fn fits_files_in_order() {
        let a = write_synthetic("a.txt");
        let b = write_synthetic("b.txt");
        let out = run_fit(&config(vec![a, b])).unwrap();
        assert_eq!(out.runs.len(), 2);
        assert_eq!(out.runs[0].spectrum.name, "a");
        assert_eq!(out.runs[1].spectrum.name, "b");
        assert!(out.first_error().is_none());

        let report = out.runs[0].result.as_ref().unwrap();
        let physical = geometry().denormalize(&report.params);
        assert!((physical.rcl - 0.1).abs() / 0.1 < 1e-4);
        assert!((physical.rmem - 1.0).abs() < 1e-4);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = run_fit(&config(vec!["/nonexistent/eis.txt".into()])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bad_geometry_is_rejected() {
        let mut cfg = config(vec![]);
        cfg.geometry.area = 0.0;
        assert_eq!(run_fit(&cfg).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn simulation_uses_physical_units() {
        let a = write_synthetic("sim.txt");
        let (spectrum, sim) =
            run_simulation(&a, ModelKind::TransmissionLine, &physical_truth(), &geometry(), (1.5, 8000.0))
                .unwrap();
        assert_eq!(spectrum.name, "sim");
        assert!(sim.summary.avg_residual_percent.unwrap() < 1e-9);
    }

    #[test]
    fn timeout_must_be_positive() {
        assert!(deadline_from_secs(None).unwrap().is_none());
        assert!(deadline_from_secs(Some(5.0)).unwrap().is_some());
        assert!(deadline_from_secs(Some(-1.0)).is_err());
    }
}
