//! Bounded nonlinear least squares.
//!
//! Minimizes `½·Σ r_i(p)²` over the box `lower <= p <= upper` with a
//! Levenberg–Marquardt iteration:
//!
//! - damped Gauss–Newton step `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` (Marquardt scaling,
//!   so parameters on wildly different scales are treated alike)
//! - coordinates sitting on a bound whose gradient pushes outward are frozen
//!   for the step (active set), the rest of the step is projected into the box;
//!   a projected trial on which the model is not finite is retried with the
//!   clipped coordinates kept just inside their bounds
//! - λ is updated from the gain ratio (Nielsen's rule)
//!
//! Termination follows the usual three tests: cost reduction (`ftol`), step
//! size (`xtol`) and projected gradient (`gtol`). A step that shrinks below
//! `xtol` only by being rejected counts as converged when the scaled projected
//! gradient `|g_j| / (|r|·|J_j|)` is small; otherwise the solve fails as
//! stalled. The residual evaluation
//! budget, an optional deadline and an optional cancellation flag bound the
//! run; hitting any of them returns an error carrying the best parameters so
//! far.

use std::sync::atomic::Ordering;

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::{ParameterBounds, ParameterVector, SolverOptions};
use crate::error::{FitError, NonConvergence};
use crate::fit::residual::ResidualFunction;
use crate::math::solve_damped;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-20;
const LAMBDA_MAX: f64 = 1e30;
/// Fraction of the distance to a bound kept when a step clipped onto it is retried.
const BOUNDARY_BACKOFF: f64 = 0.995;
/// Largest scaled projected gradient accepted when steps shrink below `xtol`
/// without lowering the cost.
const STALL_GRADIENT: f64 = 1e-3;
/// Residual norm, relative to the data norm, treated as an exact fit.
const ROUNDOFF_RESIDUAL: f64 = 1e-8;

/// Which test stopped the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    /// Cost reduction fell below `ftol` relative to the cost.
    Ftol,
    /// Step fell below `xtol` relative to the parameter norm.
    Xtol,
    /// Projected gradient fell below `gtol`.
    Gtol,
    /// Every residual is exactly zero.
    ZeroResidual,
}

/// Converged solution with everything the uncertainty estimate needs.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub params: ParameterVector,
    pub residuals: DVector<f64>,
    /// `∂r/∂p` at `params` (n × 6).
    pub jacobian: DMatrix<f64>,
    /// `½·Σ r_i²`.
    pub cost: f64,
    pub evaluations: usize,
    pub iterations: usize,
    pub termination: Termination,
    /// Names of parameters that finished on a bound.
    pub active_bounds: Vec<&'static str>,
}

/// Minimize the residuals of `rf` starting from `initial`.
pub fn solve(
    rf: &ResidualFunction<'_>,
    initial: &ParameterVector,
    bounds: &ParameterBounds,
    opts: &SolverOptions,
) -> Result<SolverOutput, FitError> {
    bounds.validate()?;
    let lo = bounds.lower.to_array();
    let hi = bounds.upper.to_array();
    let np = ParameterVector::LEN;

    let mut x = bounds.clamp(initial);
    let mut r = rf.evaluate(&x);
    let mut evaluations = 1usize;
    if !r.iter().all(|v| v.is_finite()) {
        return Err(FitError::NonFiniteResidual(Box::new(x)));
    }
    let mut cost = 0.5 * r.dot(&r);
    let mut lambda = LAMBDA_INIT;
    let mut nu = 2.0;
    let mut iterations = 0usize;

    let data_norm = rf.data_norm();

    let termination = 'outer: loop {
        check_interrupt(opts, evaluations, &x)?;

        if cost == 0.0 {
            break Termination::ZeroResidual;
        }

        let jac = rf.jacobian(&x, &bounds.lower, &bounds.upper);
        if !jac.iter().all(|v| v.is_finite()) {
            return Err(FitError::NonFiniteResidual(Box::new(x)));
        }
        let mut g = jac.transpose() * &r;
        let mut a = jac.transpose() * &jac;
        let col_norms = a.diagonal().map(f64::sqrt);

        // Freeze coordinates held by an active bound.
        let xa = x.to_array();
        for j in 0..np {
            let pinned = (xa[j] <= lo[j] && g[j] > 0.0) || (xa[j] >= hi[j] && g[j] < 0.0);
            if pinned {
                g[j] = 0.0;
                a.row_mut(j).fill(0.0);
                a.column_mut(j).fill(0.0);
                a[(j, j)] = 1.0;
            }
        }

        if g.amax() <= opts.gtol {
            break Termination::Gtol;
        }
        let r_norm = r.norm();
        // Residuals at round-off level carry no usable gradient direction.
        let stationary = scaled_gradient(&g, &col_norms, r_norm) <= STALL_GRADIENT
            || r_norm <= ROUNDOFF_RESIDUAL * data_norm;

        let d = DVector::from_iterator(
            np,
            (0..np).map(|j| if a[(j, j)] > 0.0 { a[(j, j)] } else { 1.0 }),
        );
        let x_vec = DVector::from_row_slice(&xa);
        let x_norm = x_vec.norm();

        loop {
            let reason = if evaluations >= opts.max_evaluations {
                Some(NonConvergence::EvaluationBudget)
            } else if lambda.is_nan() || lambda >= LAMBDA_MAX {
                Some(NonConvergence::DampingOverflow)
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(FitError::ConvergenceFailure {
                    reason,
                    evaluations,
                    best: Box::new(x),
                });
            }

            let Some(step) = solve_damped(&a, &g, &d, lambda) else {
                lambda *= nu;
                nu *= 2.0;
                continue;
            };

            let (mut trial, clipped) = project_step(&xa, &step, &lo, &hi);
            let mut r_new = rf.evaluate(&ParameterVector::from_array(trial));
            evaluations += 1;
            // A bound can sit where the model is singular (Qdl = 0): retry just inside it.
            if !r_new.iter().all(|v| v.is_finite())
                && clipped.iter().any(|&c| c)
                && evaluations < opts.max_evaluations
            {
                back_off(&xa, &mut trial, &clipped);
                r_new = rf.evaluate(&ParameterVector::from_array(trial));
                evaluations += 1;
            }
            let dx = DVector::from_row_slice(&trial) - &x_vec;
            let dx_norm = dx.norm();
            let x_new = ParameterVector::from_array(trial);

            let cost_new = if r_new.iter().all(|v| v.is_finite()) {
                0.5 * r_new.dot(&r_new)
            } else {
                f64::INFINITY
            };

            let actual = cost - cost_new;
            let small_step = dx_norm <= opts.xtol * (opts.xtol + x_norm);

            if cost_new.is_finite() && actual > 0.0 {
                let predicted = -(g.dot(&dx) + 0.5 * dx.dot(&(&a * &dx)));
                let rho = if predicted > 0.0 { actual / predicted } else { 0.0 };
                lambda = (lambda * (1.0_f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3)))
                    .max(LAMBDA_MIN);
                nu = 2.0;

                let cost_prev = cost;
                x = x_new;
                r = r_new;
                cost = cost_new;
                iterations += 1;
                debug!(
                    "iter {iterations}: cost={cost:.6e} lambda={lambda:.3e} |dx|={dx_norm:.3e} nfev={evaluations}"
                );

                if actual <= opts.ftol * cost_prev {
                    break 'outer Termination::Ftol;
                }
                if small_step {
                    break 'outer Termination::Xtol;
                }
                break;
            }

            if small_step {
                if cost_new.is_finite() && stationary {
                    break 'outer Termination::Xtol;
                }
                return Err(FitError::ConvergenceFailure {
                    reason: NonConvergence::Stalled,
                    evaluations,
                    best: Box::new(x),
                });
            }
            lambda *= nu;
            nu *= 2.0;
        }
    };

    let jacobian = rf.jacobian(&x, &bounds.lower, &bounds.upper);
    let active_bounds = active_bounds(&x, bounds);
    if !active_bounds.is_empty() {
        warn!(
            "parameters finished on a bound: {}",
            active_bounds.join(", ")
        );
    }
    info!(
        "{} fit finished ({termination:?}): cost={cost:.6e}, {iterations} iterations, {evaluations} evaluations",
        rf.model().display_name()
    );

    Ok(SolverOutput {
        params: x,
        residuals: r,
        jacobian,
        cost,
        evaluations,
        iterations,
        termination,
        active_bounds,
    })
}

fn check_interrupt(
    opts: &SolverOptions,
    evaluations: usize,
    best: &ParameterVector,
) -> Result<(), FitError> {
    if opts
        .cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
    {
        return Err(FitError::Cancelled {
            evaluations,
            best: Box::new(*best),
        });
    }
    if opts
        .deadline
        .is_some_and(|deadline| std::time::Instant::now() >= deadline)
    {
        return Err(FitError::DeadlineExceeded {
            evaluations,
            best: Box::new(*best),
        });
    }
    Ok(())
}

/// Project `x + step` onto the box, flagging the coordinates that were clipped.
fn project_step(
    x: &[f64; 6],
    step: &DVector<f64>,
    lo: &[f64; 6],
    hi: &[f64; 6],
) -> ([f64; 6], [bool; 6]) {
    let mut trial = *x;
    let mut clipped = [false; 6];
    for j in 0..ParameterVector::LEN {
        let t = x[j] + step[j];
        trial[j] = t.max(lo[j]).min(hi[j]);
        clipped[j] = trial[j] != t;
    }
    (trial, clipped)
}

/// Move each clipped coordinate back to `BOUNDARY_BACKOFF` of its way from `x`
/// to the bound it was clipped onto.
fn back_off(x: &[f64; 6], trial: &mut [f64; 6], clipped: &[bool; 6]) {
    for j in 0..ParameterVector::LEN {
        if clipped[j] {
            trial[j] = x[j] + BOUNDARY_BACKOFF * (trial[j] - x[j]);
        }
    }
}

/// `max_j |g_j| / (|r|·|J_j|)`, the cosine between the residual and each
/// Jacobian column. Columns with no sensitivity are skipped.
fn scaled_gradient(g: &DVector<f64>, col_norms: &DVector<f64>, r_norm: f64) -> f64 {
    g.iter()
        .zip(col_norms.iter())
        .filter(|(_, c)| **c > 0.0)
        .map(|(gj, c)| gj.abs() / (r_norm * c))
        .fold(0.0, f64::max)
}

fn active_bounds(x: &ParameterVector, bounds: &ParameterBounds) -> Vec<&'static str> {
    let xa = x.to_array();
    let lo = bounds.lower.to_array();
    let hi = bounds.upper.to_array();
    (0..ParameterVector::LEN)
        .filter(|&j| xa[j] <= lo[j] || xa[j] >= hi[j])
        .map(|j| ParameterVector::NAMES[j])
        .collect()
}
