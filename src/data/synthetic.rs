//! Synthetic impedance spectra.
//!
//! Spectra are generated by evaluating a model on a log-spaced frequency grid.
//! Optional Gaussian noise is proportional to `|Z|` at each point and drawn
//! from a seeded RNG, so a given seed always produces the same spectrum.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Measurement, ModelKind, ParameterVector};
use crate::error::FitError;
use crate::models::impedance;

/// Relative Gaussian noise added to both impedance components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseSpec {
    /// Standard deviation as a fraction of `|Z|`.
    pub relative_sigma: f64,
    pub seed: u64,
}

/// `n` points log-spaced between `min` and `max` (inclusive, ascending).
pub fn log_spaced(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let ln_min = min.ln();
            let step = (max.ln() - ln_min) / (n as f64 - 1.0);
            (0..n).map(|i| (ln_min + step * i as f64).exp()).collect()
        }
    }
}

/// Evaluate `model` at `p` on `frequencies` and package it as a measurement.
pub fn synthesize(
    model: ModelKind,
    p: &ParameterVector,
    frequencies: &[f64],
    noise: Option<NoiseSpec>,
) -> Result<Measurement, FitError> {
    let mut re = Vec::with_capacity(frequencies.len());
    let mut im = Vec::with_capacity(frequencies.len());
    for &f in frequencies {
        let z = impedance(model, p, f);
        re.push(z.re);
        im.push(z.im);
    }

    if let Some(spec) = noise {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| FitError::InvalidMeasurement(format!("noise distribution error: {e}")))?;
        if !(spec.relative_sigma.is_finite() && spec.relative_sigma >= 0.0) {
            return Err(FitError::InvalidMeasurement(format!(
                "noise sigma must be finite and >= 0, got {}",
                spec.relative_sigma
            )));
        }
        let mut rng = StdRng::seed_from_u64(spec.seed);
        for i in 0..re.len() {
            let scale = spec.relative_sigma * re[i].hypot(im[i]);
            re[i] += scale * normal.sample(&mut rng);
            im[i] += scale * normal.sample(&mut rng);
        }
    }

    Measurement::new(frequencies.to_vec(), re, im, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterVector {
        ParameterVector {
            lwire: 1e-6,
            rmem: 0.01,
            rcl: 0.05,
            qdl: 2.0,
            phi: 0.9,
            theta: 0.9,
        }
    }

    #[test]
    fn log_spaced_hits_both_ends() {
        let f = log_spaced(1.0, 1e4, 5);
        let want = [1.0, 10.0, 100.0, 1000.0, 10000.0];
        for (a, b) in f.iter().zip(want) {
            assert!((a - b).abs() / b < 1e-12);
        }
        assert!(log_spaced(1.0, 10.0, 0).is_empty());
        assert_eq!(log_spaced(3.0, 10.0, 1), vec![3.0]);
    }

    #[test]
    fn clean_spectrum_matches_model() {
        let f = log_spaced(1.0, 1e3, 7);
        let m = synthesize(ModelKind::SphericalDiffusion, &params(), &f, None).unwrap();
        for (i, &fi) in f.iter().enumerate() {
            let z = impedance(ModelKind::SphericalDiffusion, &params(), fi);
            assert_eq!(m.z_real()[i], z.re);
            assert_eq!(m.z_imag()[i], z.im);
        }
    }

    #[test]
    fn noise_is_reproducible_per_seed() {
        let f = log_spaced(1.0, 1e3, 20);
        let noise = NoiseSpec {
            relative_sigma: 0.01,
            seed: 7,
        };
        let a = synthesize(ModelKind::TransmissionLine, &params(), &f, Some(noise)).unwrap();
        let b = synthesize(ModelKind::TransmissionLine, &params(), &f, Some(noise)).unwrap();
        let clean = synthesize(ModelKind::TransmissionLine, &params(), &f, None).unwrap();
        assert_eq!(a.z_real(), b.z_real());
        assert_ne!(a.z_real(), clean.z_real());
    }

    #[test]
    fn negative_sigma_is_rejected() {
        let f = log_spaced(1.0, 1e3, 4);
        let noise = NoiseSpec {
            relative_sigma: -1.0,
            seed: 1,
        };
        assert!(synthesize(ModelKind::TransmissionLine, &params(), &f, Some(noise)).is_err());
    }
}
