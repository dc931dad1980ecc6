//! Shared domain types.
//!
//! These types are plain values: a fit never mutates a `Measurement` or a
//! `ParameterVector` in place, it builds new ones. That keeps every stage of
//! the pipeline re-entrant, so independent spectra can be fitted in parallel.

use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Equivalent-circuit model used to describe the catalyst layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Transmission-line model (Setzler & Fuller).
    #[value(alias = "tl")]
    TransmissionLine,
    /// 1-D linear diffusion.
    #[value(alias = "linear")]
    LinearDiffusion,
    /// 1-D spherical diffusion.
    #[value(alias = "spherical")]
    SphericalDiffusion,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::TransmissionLine,
        ModelKind::LinearDiffusion,
        ModelKind::SphericalDiffusion,
    ];

    /// Human-readable label for terminal output and reports.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::TransmissionLine => "Transmission Line",
            ModelKind::LinearDiffusion => "1-D Linear Diffusion",
            ModelKind::SphericalDiffusion => "1-D Spherical Diffusion",
        }
    }
}

impl FromStr for ModelKind {
    type Err = FitError;

    /// Accepts the CLI spellings as well as the display names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "transmissionline" | "tl" => Ok(ModelKind::TransmissionLine),
            "1dlineardiffusion" | "lineardiffusion" | "linear" => Ok(ModelKind::LinearDiffusion),
            "1dsphericaldiffusion" | "sphericaldiffusion" | "spherical" => {
                Ok(ModelKind::SphericalDiffusion)
            }
            _ => Err(FitError::UnknownModel(s.to_string())),
        }
    }
}

/// The six fit parameters in their fixed order `[Lwire, Rmem, Rcl, Qdl, Phi, Theta]`.
///
/// `lwire`, `rmem` and `rcl` are area-normalized inside the engine; see
/// [`CellGeometry`] for the conversion used at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterVector {
    pub lwire: f64,
    pub rmem: f64,
    pub rcl: f64,
    pub qdl: f64,
    pub phi: f64,
    pub theta: f64,
}

impl ParameterVector {
    pub const LEN: usize = 6;
    pub const NAMES: [&'static str; 6] = ["Lwire", "Rmem", "Rcl", "Qdl", "Phi", "Theta"];

    pub fn to_array(&self) -> [f64; 6] {
        [self.lwire, self.rmem, self.rcl, self.qdl, self.phi, self.theta]
    }

    pub fn from_array(v: [f64; 6]) -> Self {
        Self {
            lwire: v[0],
            rmem: v[1],
            rcl: v[2],
            qdl: v[3],
            phi: v[4],
            theta: v[5],
        }
    }
}

/// Per-parameter box constraints for the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    pub lower: ParameterVector,
    pub upper: ParameterVector,
}

impl ParameterBounds {
    /// Default box used for impedance fits.
    ///
    /// `Rmem` is confined to `[(1-band)·rmem0, (1+band)·rmem0]` around the
    /// data-driven seed; the other parameters get their physical ranges.
    pub fn around_rmem(rmem0: f64, band: f64) -> Self {
        let (lo, hi) = ((1.0 - band) * rmem0, (1.0 + band) * rmem0);
        Self {
            lower: ParameterVector {
                lwire: 0.0,
                rmem: lo.min(hi),
                rcl: 0.0,
                qdl: 0.0,
                phi: 0.0,
                theta: 0.0,
            },
            upper: ParameterVector {
                lwire: 1.0,
                rmem: lo.max(hi),
                rcl: f64::INFINITY,
                qdl: f64::INFINITY,
                phi: 1.0,
                theta: 1.0,
            },
        }
    }

    /// Check `lower <= upper` for every coordinate and that no bound is NaN.
    pub fn validate(&self) -> Result<(), FitError> {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();
        for i in 0..ParameterVector::LEN {
            if lo[i].is_nan() || hi[i].is_nan() || lo[i] > hi[i] {
                return Err(FitError::InvalidBounds(format!(
                    "{}: lower={} upper={}",
                    ParameterVector::NAMES[i],
                    lo[i],
                    hi[i]
                )));
            }
        }
        Ok(())
    }

    /// Clamp a parameter vector into the box.
    pub fn clamp(&self, p: &ParameterVector) -> ParameterVector {
        let lo = self.lower.to_array();
        let hi = self.upper.to_array();
        let mut v = p.to_array();
        for i in 0..ParameterVector::LEN {
            v[i] = v[i].max(lo[i]).min(hi[i]);
        }
        ParameterVector::from_array(v)
    }
}

/// One loaded impedance spectrum.
///
/// Invariants (checked by [`Measurement::new`]): all arrays have the same
/// non-zero length, frequencies are finite and strictly monotonic.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    frequency: Vec<f64>,
    z_real: Vec<f64>,
    z_imag: Vec<f64>,
    z_magnitude: Vec<f64>,
}

impl Measurement {
    /// Build a measurement. When `z_magnitude` is `None` it is derived as
    /// `|z_real + i·z_imag|`.
    pub fn new(
        frequency: Vec<f64>,
        z_real: Vec<f64>,
        z_imag: Vec<f64>,
        z_magnitude: Option<Vec<f64>>,
    ) -> Result<Self, FitError> {
        let n = frequency.len();
        if n == 0 {
            return Err(FitError::InvalidMeasurement("no data points".to_string()));
        }
        let z_magnitude = z_magnitude.unwrap_or_else(|| {
            z_real
                .iter()
                .zip(&z_imag)
                .map(|(re, im)| re.hypot(*im))
                .collect()
        });
        if z_real.len() != n || z_imag.len() != n || z_magnitude.len() != n {
            return Err(FitError::InvalidMeasurement(format!(
                "column lengths differ: frequency={n}, real={}, imag={}, magnitude={}",
                z_real.len(),
                z_imag.len(),
                z_magnitude.len()
            )));
        }
        if let Some(i) = frequency.iter().position(|f| !f.is_finite()) {
            return Err(FitError::InvalidMeasurement(format!(
                "non-finite frequency at row {i}"
            )));
        }
        if !is_strictly_monotonic(&frequency) {
            return Err(FitError::InvalidMeasurement(
                "frequency column is not strictly monotonic".to_string(),
            ));
        }

        Ok(Self {
            frequency,
            z_real,
            z_imag,
            z_magnitude,
        })
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn z_real(&self) -> &[f64] {
        &self.z_real
    }

    pub fn z_imag(&self) -> &[f64] {
        &self.z_imag
    }

    pub fn z_magnitude(&self) -> &[f64] {
        &self.z_magnitude
    }

    /// Phase in degrees, `atan(z_imag / z_real)`.
    pub fn phase(&self) -> Vec<f64> {
        phase_degrees(&self.z_real, &self.z_imag)
    }
}

/// A measurement restricted to an open frequency interval.
///
/// Built by [`crate::fit::window`]; never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedSeries {
    pub(crate) low: f64,
    pub(crate) high: f64,
    pub(crate) frequency: Vec<f64>,
    pub(crate) z_real: Vec<f64>,
    pub(crate) z_imag: Vec<f64>,
    pub(crate) z_magnitude: Vec<f64>,
}

impl WindowedSeries {
    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }

    /// The `(low, high)` bounds this series was cut with.
    pub fn bounds(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }

    pub fn z_real(&self) -> &[f64] {
        &self.z_real
    }

    pub fn z_imag(&self) -> &[f64] {
        &self.z_imag
    }

    pub fn z_magnitude(&self) -> &[f64] {
        &self.z_magnitude
    }

    /// Phase in degrees, `atan(z_imag / z_real)`.
    pub fn phase(&self) -> Vec<f64> {
        phase_degrees(&self.z_real, &self.z_imag)
    }
}

/// Single-argument arctangent phase in degrees.
///
/// This is not quadrant-aware: points with a negative real part get the
/// mirrored angle. Reported phase values depend on it, so it is kept as is.
pub fn phase_degrees(re: &[f64], im: &[f64]) -> Vec<f64> {
    re.iter()
        .zip(im)
        .map(|(r, i)| (i / r).atan().to_degrees())
        .collect()
}

fn is_strictly_monotonic(v: &[f64]) -> bool {
    if v.len() < 2 {
        return true;
    }
    let increasing = v.windows(2).all(|w| w[1] > w[0]);
    let decreasing = v.windows(2).all(|w| w[1] < w[0]);
    increasing || decreasing
}

/// Cell geometry used to convert between area-normalized and physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellGeometry {
    /// Active area in cm².
    pub area: f64,
    /// Catalyst loading in mg/cm².
    pub loading: f64,
}

impl CellGeometry {
    /// Physical inputs (`Lwire` in H·cm², `Rmem`/`Rcl` in Ω·cm²) to engine units.
    pub fn normalize(&self, p: &ParameterVector) -> ParameterVector {
        ParameterVector {
            lwire: p.lwire / self.area,
            rmem: p.rmem / self.area,
            rcl: p.rcl / self.area,
            ..*p
        }
    }

    /// Engine units back to the physical units shown to the user.
    pub fn denormalize(&self, p: &ParameterVector) -> ParameterVector {
        ParameterVector {
            lwire: p.lwire * self.area,
            rmem: p.rmem * self.area,
            rcl: p.rcl * self.area,
            ..*p
        }
    }

    /// `Qdl` per milligram of catalyst.
    pub fn qdl_per_mg(&self, qdl: f64) -> f64 {
        qdl / (self.area * self.loading)
    }
}

/// Solver knobs. Defaults match the reference fitting setup.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Relative tolerance on the parameter step.
    pub xtol: f64,
    /// Relative tolerance on the cost reduction.
    pub ftol: f64,
    /// Tolerance on the projected gradient.
    pub gtol: f64,
    /// Residual evaluation budget (Jacobian evaluations are not counted).
    pub max_evaluations: usize,
    /// Optional wall-clock deadline for the whole solve.
    pub deadline: Option<std::time::Instant>,
    /// Optional cooperative cancellation flag polled once per iteration.
    pub cancel: Option<std::sync::Arc<std::sync::atomic::AtomicBool>>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            xtol: 1e-11,
            ftol: 1e-11,
            gtol: 1e-11,
            max_evaluations: 50_000,
            deadline: None,
            cancel: None,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub files: Vec<PathBuf>,
    pub model: ModelKind,
    /// Initial parameters in physical units (`Lwire` H·cm², resistances Ω·cm²).
    pub initial: ParameterVector,
    pub geometry: CellGeometry,
    /// Open frequency window `(low, high)` in Hz.
    pub window: (f64, f64),
    /// Relative half-width of the `Rmem` bound interval around its seed.
    pub rmem_band: f64,
    pub solver: SolverOptions,

    pub export_dir: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}
