//! Fit and simulation entry points.
//!
//! A fit runs the whole chain for one spectrum:
//!
//! - restrict the measurement to the frequency window
//! - seed `Rmem` from the data and centre its bounds on the seed
//! - minimize the complex-plane residuals
//! - estimate parameter uncertainty at the optimum
//!
//! Each call owns its inputs and outputs, so independent spectra can be
//! fitted in parallel (`fit_batch`).

use log::{info, warn};
use rayon::prelude::*;

use crate::domain::{Measurement, ModelKind, ParameterBounds, ParameterVector, SolverOptions};
use crate::error::FitError;
use crate::fit::residual::ResidualFunction;
use crate::fit::rmem::estimate_rmem;
use crate::fit::solver::solve;
use crate::fit::uncertainty::estimate_uncertainty;
use crate::fit::window::window;
use crate::models::ModelCurve;
use crate::report::{FitReport, ResidualSummary, SimulationReport};

/// Per-fit settings shared by every spectrum in a batch.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub model: ModelKind,
    /// Starting parameters in engine (area-normalized) units. `Rmem` is
    /// replaced by the data-driven seed.
    pub initial: ParameterVector,
    /// Open frequency window `(low, high)` in Hz.
    pub window: (f64, f64),
    /// Relative half-width of the `Rmem` bound interval.
    pub rmem_band: f64,
    pub solver: SolverOptions,
}

/// Fit one measurement.
pub fn fit_spectrum(measurement: &Measurement, opts: &FitOptions) -> Result<FitReport, FitError> {
    let (low, high) = opts.window;
    let series = window(measurement, low, high)?;

    let rmem_seed = estimate_rmem(&series);
    let bounds = ParameterBounds::around_rmem(rmem_seed, opts.rmem_band);
    let initial = ParameterVector {
        rmem: rmem_seed,
        ..opts.initial
    };
    info!(
        "fitting {} on {} points in ({low}, {high}) Hz, Rmem seed {rmem_seed:.6e}",
        opts.model.display_name(),
        series.len()
    );

    let rf = ResidualFunction::new(opts.model, &series);
    let out = solve(&rf, &initial, &bounds, &opts.solver)?;

    let uncertainty = estimate_uncertainty(&out.params, &out.residuals, &out.jacobian);
    if let Err(e) = &uncertainty {
        warn!("standard errors unavailable: {e}");
    }

    let summary = ResidualSummary::new(out.residuals.iter().copied().collect(), series.z_magnitude());
    let curve = ModelCurve::evaluate(opts.model, &out.params, series.frequency());

    Ok(FitReport {
        model: opts.model,
        window: opts.window,
        rmem_seed,
        bounds,
        initial,
        params: out.params,
        uncertainty,
        summary,
        curve,
        evaluations: out.evaluations,
        iterations: out.iterations,
        termination: out.termination,
        active_bounds: out.active_bounds,
    })
}

/// Fit several measurements independently and in parallel, preserving order.
pub fn fit_batch(measurements: &[Measurement], opts: &FitOptions) -> Vec<Result<FitReport, FitError>> {
    measurements
        .par_iter()
        .map(|m| fit_spectrum(m, opts))
        .collect()
}

/// Evaluate `model` at `params` (engine units) against a windowed measurement.
pub fn simulate(
    measurement: &Measurement,
    model: ModelKind,
    params: &ParameterVector,
    window_hz: (f64, f64),
) -> Result<SimulationReport, FitError> {
    let series = window(measurement, window_hz.0, window_hz.1)?;
    let rf = ResidualFunction::new(model, &series);
    let residuals: Vec<f64> = rf.evaluate(params).iter().copied().collect();
    if !residuals.iter().all(|r| r.is_finite()) {
        return Err(FitError::NonFiniteResidual(Box::new(*params)));
    }

    Ok(SimulationReport {
        model,
        window: window_hz,
        params: *params,
        summary: ResidualSummary::new(residuals, series.z_magnitude()),
        curve: ModelCurve::evaluate(model, params, series.frequency()),
    })
}
