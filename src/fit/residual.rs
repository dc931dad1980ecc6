//! Residual vector consumed by the solver.
//!
//! Each residual is the distance in the complex plane between the model and
//! the measured impedance, `r_i = |Z_model(f_i) - Z_data(f_i)|`, so the
//! least-squares cost is the sum of squared complex-plane distances.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::domain::{ModelKind, ParameterVector, WindowedSeries};
use crate::models::impedance;

/// A model bound to a windowed data set.
#[derive(Debug, Clone, Copy)]
pub struct ResidualFunction<'a> {
    model: ModelKind,
    series: &'a WindowedSeries,
}

impl<'a> ResidualFunction<'a> {
    pub fn new(model: ModelKind, series: &'a WindowedSeries) -> Self {
        Self { model, series }
    }

    pub fn model(&self) -> ModelKind {
        self.model
    }

    pub fn series(&self) -> &'a WindowedSeries {
        self.series
    }

    /// Number of residuals (windowed points).
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// `sqrt(Σ |Z_data|²)`, the scale residuals are compared against.
    pub fn data_norm(&self) -> f64 {
        self.series
            .z_magnitude()
            .iter()
            .map(|m| m * m)
            .sum::<f64>()
            .sqrt()
    }

    /// Complex misfit `Z_model - Z_data` at every point.
    pub fn misfit(&self, p: &ParameterVector) -> Vec<Complex64> {
        let s = self.series;
        s.frequency()
            .iter()
            .zip(s.z_real().iter().zip(s.z_imag()))
            .map(|(&f, (&re, &im))| impedance(self.model, p, f) - Complex64::new(re, im))
            .collect()
    }

    /// `r_i = |Z_model - Z_data|`.
    pub fn evaluate(&self, p: &ParameterVector) -> DVector<f64> {
        DVector::from_iterator(self.len(), self.misfit(p).into_iter().map(|d| d.norm()))
    }

    /// Jacobian of the residual vector by forward differences on the complex
    /// model, `J_ij = Re(conj(Δ_i)·∂Z_i/∂p_j) / |Δ_i|`.
    ///
    /// Differencing the smooth complex model instead of `|Δ|` keeps the
    /// derivative accurate when a residual approaches zero. Steps that would
    /// leave `[lower, upper]` are taken backwards.
    pub fn jacobian(
        &self,
        p: &ParameterVector,
        lower: &ParameterVector,
        upper: &ParameterVector,
    ) -> DMatrix<f64> {
        let n = self.len();
        let x = p.to_array();
        let lo = lower.to_array();
        let hi = upper.to_array();
        let base = self.misfit(p);
        let mut jac = DMatrix::<f64>::zeros(n, ParameterVector::LEN);

        for j in 0..ParameterVector::LEN {
            let mut h = f64::EPSILON.sqrt() * x[j].abs().max(1.0);
            if x[j] + h > hi[j] && x[j] - h >= lo[j] {
                h = -h;
            }
            let mut xs = x;
            xs[j] += h;
            // Representable step actually taken.
            let h = xs[j] - x[j];
            let shifted = self.misfit(&ParameterVector::from_array(xs));

            for i in 0..n {
                let dz = (shifted[i] - base[i]) / h;
                let r = base[i].norm();
                jac[(i, j)] = if r > 0.0 {
                    (base[i].conj() * dz).re / r
                } else {
                    dz.norm()
                };
            }
        }
        jac
    }
}
