//! Small dense linear-algebra helpers on top of `nalgebra`.
//!
//! The parameter dimension is six, so every matrix here is tiny.
//!
//! - `solve_damped`: the Levenberg–Marquardt step `(A + λ·diag(d)) δ = -g`
//! - `equilibrated_inverse`: `inverse(A)` for a normal matrix `A = JᵀJ` with a
//!   scale-free conditioning check

use nalgebra::{DMatrix, DVector};

/// Largest acceptable condition number of the column-equilibrated normal matrix.
pub const MAX_CONDITION: f64 = 1e12;

/// Solve `(a + lambda·diag(d)) δ = -g`.
///
/// Tries Cholesky first and falls back to SVD; returns `None` if neither yields a
/// finite step.
pub fn solve_damped(
    a: &DMatrix<f64>,
    g: &DVector<f64>,
    d: &DVector<f64>,
    lambda: f64,
) -> Option<DVector<f64>> {
    let mut m = a.clone();
    for i in 0..m.nrows() {
        m[(i, i)] += lambda * d[i];
    }
    let rhs = -g;

    if let Some(chol) = m.clone().cholesky() {
        let step = chol.solve(&rhs);
        if step.iter().all(|v| v.is_finite()) {
            return Some(step);
        }
    }

    let svd = m.svd(true, true);
    for &tol in &[1e-14, 1e-12, 1e-10] {
        if let Ok(step) = svd.solve(&rhs, tol) {
            if step.iter().all(|v| v.is_finite()) {
                return Some(step);
            }
        }
    }
    None
}

/// Why [`equilibrated_inverse`] refused to invert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conditioning {
    /// Column `index` of the Jacobian is identically zero.
    ZeroColumn { index: usize },
    /// The equilibrated matrix has this (possibly infinite) condition number.
    IllConditioned { condition: f64 },
}

/// Invert a symmetric positive semi-definite normal matrix `a = JᵀJ`.
///
/// Parameters live on very different scales, so the raw condition number of `a`
/// says little. We scale to `C = D^{-1/2} a D^{-1/2}` with `D = diag(a)`, check
/// the condition number of `C` via its singular values, and return
/// `D^{-1/2} C^{-1} D^{-1/2}`.
pub fn equilibrated_inverse(a: &DMatrix<f64>) -> Result<DMatrix<f64>, Conditioning> {
    let n = a.nrows();
    let mut scale = DVector::<f64>::zeros(n);
    for i in 0..n {
        let d = a[(i, i)];
        if !(d.is_finite() && d > 0.0) {
            return Err(Conditioning::ZeroColumn { index: i });
        }
        scale[i] = 1.0 / d.sqrt();
    }

    let mut c = a.clone();
    for i in 0..n {
        for j in 0..n {
            c[(i, j)] *= scale[i] * scale[j];
        }
    }

    let svd = c.clone().svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    let condition = if s_min > 0.0 { s_max / s_min } else { f64::INFINITY };
    if !condition.is_finite() || condition > MAX_CONDITION {
        return Err(Conditioning::IllConditioned { condition });
    }

    let c_inv = svd
        .pseudo_inverse(0.0)
        .map_err(|_| Conditioning::IllConditioned { condition })?;

    let mut out = c_inv;
    for i in 0..n {
        for j in 0..n {
            out[(i, j)] *= scale[i] * scale[j];
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damped_solve_with_zero_lambda_is_newton_step() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let g = DVector::from_row_slice(&[1.0, 2.0]);
        let d = DVector::from_row_slice(&[4.0, 3.0]);
        let step = solve_damped(&a, &g, &d, 0.0).unwrap();
        let back = &a * &step;
        assert!((back[0] + 1.0).abs() < 1e-12);
        assert!((back[1] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_handles_badly_scaled_columns() {
        // Columns differ by 1e8 in scale but are well separated in direction.
        let j = DMatrix::from_row_slice(3, 2, &[1e-4, 1e4, 2e-4, -1e4, 0.5e-4, 3e4]);
        let a = j.transpose() * &j;
        let inv = equilibrated_inverse(&a).unwrap();
        let id = &a * &inv;
        assert!((id[(0, 0)] - 1.0).abs() < 1e-8);
        assert!(id[(0, 1)].abs() < 1e-6);
        assert!((id[(1, 1)] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn inverse_reports_zero_column() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let a = j.transpose() * &j;
        assert_eq!(equilibrated_inverse(&a), Err(Conditioning::ZeroColumn { index: 1 }));
    }

    #[test]
    fn inverse_reports_collinear_columns() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        let a = j.transpose() * &j;
        assert!(matches!(
            equilibrated_inverse(&a),
            Err(Conditioning::IllConditioned { .. })
        ));
    }
}
