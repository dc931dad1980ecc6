//! Impedance evaluation for the three catalyst-layer models.
//!
//! Every model has the same series part
//!
//! ```text
//! Z(ω) = Lwire·(iω)^Theta + Rmem + Z_branch(ω)
//! ```
//!
//! and differs only in the charge-transfer / double-layer branch, built from
//! `x = Rcl·Qdl·(iω)^Phi`:
//!
//! - transmission line: `sqrt(Rcl / (Qdl·(iω)^Phi)) · coth(sqrt(x))`
//! - linear diffusion:  `Rcl · x^(-1/2) · coth(sqrt(x))`
//! - spherical diffusion: `Rcl / (sqrt(x)·coth(sqrt(x)) - 1)`
//!
//! For `|x| < 1e-3` the branch is taken from the series of `√x·coth(√x)`,
//! which removes the `0·∞` form at `Rcl = 0`: the transmission line and
//! linear diffusion branches tend to `1/(Qdl·(iω)^Phi)`, spherical diffusion
//! to `3/(Qdl·(iω)^Phi)`. `Qdl = 0` stays non-finite.
//!
//! `branch` is the only place that matches on [`ModelKind`]; the fitter, the
//! uncertainty estimate and the reports all go through `impedance`.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::domain::{ModelKind, ParameterVector, phase_degrees};
use crate::math::{coth, jw_pow, sqrt_coth_excess};

/// Below this `|x|` the branch is evaluated from its series.
const SERIES_LIMIT: f64 = 1e-3;

/// Charge-transfer / double-layer branch impedance at angular frequency `omega`.
fn branch(model: ModelKind, p: &ParameterVector, omega: f64) -> Complex64 {
    let cpe = jw_pow(omega, p.phi);
    let x = p.rcl * p.qdl * cpe;
    if x.norm() < SERIES_LIMIT {
        let excess = sqrt_coth_excess(x);
        return match model {
            ModelKind::TransmissionLine | ModelKind::LinearDiffusion => {
                (p.qdl * cpe).inv() + p.rcl * excess
            }
            ModelKind::SphericalDiffusion => (p.qdl * cpe * excess).inv(),
        };
    }
    let sqrt_x = x.sqrt();
    match model {
        ModelKind::TransmissionLine => (p.rcl / (p.qdl * cpe)).sqrt() * coth(sqrt_x),
        ModelKind::LinearDiffusion => p.rcl * x.powf(-0.5) * coth(sqrt_x),
        ModelKind::SphericalDiffusion => p.rcl / (sqrt_x * coth(sqrt_x) - 1.0),
    }
}

/// Model impedance at a single frequency (Hz).
pub fn impedance(model: ModelKind, p: &ParameterVector, frequency: f64) -> Complex64 {
    let omega = 2.0 * PI * frequency;
    p.lwire * jw_pow(omega, p.theta) + p.rmem + branch(model, p, omega)
}

/// Model impedance at every frequency in `frequencies`.
pub fn impedance_series(model: ModelKind, p: &ParameterVector, frequencies: &[f64]) -> Vec<Complex64> {
    frequencies.iter().map(|&f| impedance(model, p, f)).collect()
}

pub fn real(model: ModelKind, p: &ParameterVector, frequencies: &[f64]) -> Vec<f64> {
    frequencies.iter().map(|&f| impedance(model, p, f).re).collect()
}

pub fn imag(model: ModelKind, p: &ParameterVector, frequencies: &[f64]) -> Vec<f64> {
    frequencies.iter().map(|&f| impedance(model, p, f).im).collect()
}

/// `|real + i·imag|` at each frequency.
pub fn magnitude(model: ModelKind, p: &ParameterVector, frequencies: &[f64]) -> Vec<f64> {
    frequencies.iter().map(|&f| impedance(model, p, f).norm()).collect()
}

/// `(180/π)·atan(imag/real)` at each frequency.
pub fn phase(model: ModelKind, p: &ParameterVector, frequencies: &[f64]) -> Vec<f64> {
    let z = impedance_series(model, p, frequencies);
    let re: Vec<f64> = z.iter().map(|v| v.re).collect();
    let im: Vec<f64> = z.iter().map(|v| v.im).collect();
    phase_degrees(&re, &im)
}

/// A model evaluated on a frequency grid, in every representation the reports use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCurve {
    pub frequency: Vec<f64>,
    pub real: Vec<f64>,
    pub imag: Vec<f64>,
    pub magnitude: Vec<f64>,
    pub phase: Vec<f64>,
}

impl ModelCurve {
    pub fn evaluate(model: ModelKind, p: &ParameterVector, frequencies: &[f64]) -> Self {
        let z = impedance_series(model, p, frequencies);
        let real: Vec<f64> = z.iter().map(|v| v.re).collect();
        let imag: Vec<f64> = z.iter().map(|v| v.im).collect();
        let magnitude = z.iter().map(|v| v.norm()).collect();
        let phase = phase_degrees(&real, &imag);
        Self {
            frequency: frequencies.to_vec(),
            real,
            imag,
            magnitude,
            phase,
        }
    }

    pub fn len(&self) -> usize {
        self.frequency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterVector {
        ParameterVector {
            lwire: 4e-7,
            rmem: 6e-4,
            rcl: 2e-3,
            qdl: 2.5,
            phi: 0.95,
            theta: 0.95,
        }
    }

    fn freqs() -> Vec<f64> {
        vec![0.5, 3.0, 17.0, 120.0, 900.0, 8000.0]
    }

    #[test]
    fn magnitude_is_modulus_of_real_and_imag() {
        for model in ModelKind::ALL {
            let f = freqs();
            let re = real(model, &params(), &f);
            let im = imag(model, &params(), &f);
            let mag = magnitude(model, &params(), &f);
            for i in 0..f.len() {
                let want = Complex64::new(re[i], im[i]).norm();
                assert!((mag[i] - want).abs() <= 1e-12 * want, "{model:?} f={}", f[i]);
            }
        }
    }

    #[test]
    fn phase_matches_arctangent_of_ratio() {
        let f = freqs();
        let ph = phase(ModelKind::TransmissionLine, &params(), &f);
        let re = real(ModelKind::TransmissionLine, &params(), &f);
        let im = imag(ModelKind::TransmissionLine, &params(), &f);
        for i in 0..f.len() {
            assert!((ph[i] - (im[i] / re[i]).atan() * 180.0 / PI).abs() < 1e-12);
        }
    }

    #[test]
    fn transmission_line_and_linear_diffusion_coincide() {
        // sqrt(Rcl/(Qdl s)) == Rcl·(Rcl·Qdl·s)^(-1/2) for Rcl > 0 and arg(s) in [0, π/2].
        for &f in &freqs() {
            let a = impedance(ModelKind::TransmissionLine, &params(), f);
            let b = impedance(ModelKind::LinearDiffusion, &params(), f);
            assert!((a - b).norm() < 1e-12 * a.norm());
        }
    }

    #[test]
    fn small_qdl_collapses_branch_to_capacitor_plus_resistance() {
        // For x = Rcl·Qdl·s → 0:
        //   TL / linear: branch ≈ 1/(Qdl s) + Rcl/3
        //   spherical:   branch ≈ 3/(Qdl s) + Rcl/5
        let mut p = params();
        p.rcl = 0.05;
        p.qdl = 1e-4;
        let f = 50.0;
        let omega = 2.0 * PI * f;
        let s = jw_pow(omega, p.phi);
        let series = p.lwire * jw_pow(omega, p.theta) + p.rmem;

        let cap = 1.0 / (p.qdl * s);
        for model in [ModelKind::TransmissionLine, ModelKind::LinearDiffusion] {
            let br = impedance(model, &p, f) - series;
            let want = cap + p.rcl / 3.0;
            assert!((br - want).norm() < 1e-4 * p.rcl, "{model:?}: {br} vs {want}");
        }

        let br = impedance(ModelKind::SphericalDiffusion, &p, f) - series;
        let want = 3.0 * cap + p.rcl / 5.0;
        assert!((br - want).norm() < 1e-4 * p.rcl, "spherical: {br} vs {want}");
    }

    #[test]
    fn high_frequency_tends_to_series_terms() {
        let mut p = params();
        p.lwire = 0.0;
        // Large x: coth → 1, TL branch → sqrt(Rcl/(Qdl s)) → 0.
        let z = impedance(ModelKind::TransmissionLine, &p, 1e9);
        assert!((z.re - p.rmem).abs() < 1e-5);
    }

    #[test]
    fn model_curve_is_consistent() {
        let f = freqs();
        let curve = ModelCurve::evaluate(ModelKind::SphericalDiffusion, &params(), &f);
        assert_eq!(curve.len(), f.len());
        assert_eq!(curve.real, real(ModelKind::SphericalDiffusion, &params(), &f));
        assert_eq!(curve.magnitude, magnitude(ModelKind::SphericalDiffusion, &params(), &f));
    }

    #[test]
    fn zero_rcl_leaves_a_pure_cpe_branch() {
        let mut p = params();
        p.rcl = 0.0;
        let f = 25.0;
        let omega = 2.0 * PI * f;
        let series = p.lwire * jw_pow(omega, p.theta) + p.rmem;
        let cap = 1.0 / (p.qdl * jw_pow(omega, p.phi));
        for (model, want) in [
            (ModelKind::TransmissionLine, cap),
            (ModelKind::LinearDiffusion, cap),
            (ModelKind::SphericalDiffusion, 3.0 * cap),
        ] {
            let br = impedance(model, &p, f) - series;
            assert!(br.re.is_finite() && br.im.is_finite(), "{model:?}");
            assert!((br - want).norm() < 1e-12 * want.norm(), "{model:?}: {br} vs {want}");
        }
    }

    #[test]
    fn series_and_closed_form_agree_at_the_switch() {
        // |x| = Rcl·Qdl·ω^Phi straddling the series limit.
        let mut p = params();
        p.qdl = 1.0;
        p.phi = 1.0;
        let f = 10.0;
        let omega = 2.0 * PI * f;
        for model in ModelKind::ALL {
            p.rcl = 0.999e-3 / omega;
            let below = impedance(model, &p, f);
            p.rcl = 1.001e-3 / omega;
            let above = impedance(model, &p, f);
            assert!((below - above).norm() < 1e-2 * above.norm(), "{model:?}: {below} vs {above}");
        }
    }

    #[test]
    fn zero_qdl_is_not_finite() {
        let mut p = params();
        p.qdl = 0.0;
        for model in ModelKind::ALL {
            let z = impedance(model, &p, 10.0);
            assert!(!(z.re.is_finite() && z.im.is_finite()), "{model:?}: {z}");
        }
    }
}
