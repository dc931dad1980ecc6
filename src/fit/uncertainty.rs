//! Parameter uncertainty from the Jacobian at the optimum.
//!
//! Gauss–Newton covariance:
//!
//! ```text
//! Cov = inverse(JᵀJ) · (rᵀr) / (n - p)
//! ```
//!
//! Standard errors are `sqrt(diag(Cov))`, percent errors `100·σ/|p|`; a
//! percent error is unavailable for a parameter sitting at zero.
//! Degrees of freedom and the conditioning of `JᵀJ` are checked before any
//! statistics are computed.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::domain::ParameterVector;
use crate::error::FitError;
use crate::math::{Conditioning, equilibrated_inverse};

/// Standard and percent errors, in the parameter order of [`ParameterVector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUncertainty {
    pub standard_errors: [f64; 6],
    /// `None` where `100·σ/|p|` is not finite.
    pub percent_errors: [Option<f64>; 6],
    /// Reduced chi-square `rᵀr / (n - p)`.
    pub sigma_squared: f64,
}

/// Estimate parameter uncertainty from residuals `r` and Jacobian `jac` (n × 6).
pub fn estimate_uncertainty(
    params: &ParameterVector,
    r: &DVector<f64>,
    jac: &DMatrix<f64>,
) -> Result<ParameterUncertainty, FitError> {
    let n = r.len();
    let p = ParameterVector::LEN;
    if n <= p {
        return Err(FitError::InsufficientData { n, params: p });
    }

    let jtj = jac.transpose() * jac;
    let inv = equilibrated_inverse(&jtj).map_err(|c| match c {
        Conditioning::ZeroColumn { index } => FitError::SingularJacobian {
            parameter: Some(ParameterVector::NAMES[index]),
            condition: f64::INFINITY,
        },
        Conditioning::IllConditioned { condition } => FitError::SingularJacobian {
            parameter: None,
            condition,
        },
    })?;

    let sigma_squared = r.dot(r) / (n - p) as f64;
    let values = params.to_array();
    let mut standard_errors = [0.0; 6];
    let mut percent_errors = [None; 6];
    for i in 0..p {
        // Round-off can leave a tiny negative diagonal on a near-singular matrix.
        let var = (inv[(i, i)] * sigma_squared).max(0.0);
        standard_errors[i] = var.sqrt();
        let pct = 100.0 * standard_errors[i] / values[i].abs();
        percent_errors[i] = pct.is_finite().then_some(pct);
    }

    Ok(ParameterUncertainty {
        standard_errors,
        percent_errors,
        sigma_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterVector {
        ParameterVector::from_array([1.0, 2.0, 3.0, 4.0, 0.5, 0.25])
    }

    fn well_posed_jacobian(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, 6, |i, j| {
            let t = i as f64 / n as f64;
            (t * (j as f64 + 1.0)).powi(j as i32) + if i == j { 1.0 } else { 0.0 }
        })
    }

    #[test]
    fn six_points_leave_no_degrees_of_freedom() {
        let r = DVector::from_element(6, 0.1);
        let jac = well_posed_jacobian(6);
        let err = estimate_uncertainty(&params(), &r, &jac).unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { n: 6, params: 6 }));
    }

    #[test]
    fn zero_column_is_singular_and_named() {
        let r = DVector::from_element(10, 0.1);
        let mut jac = well_posed_jacobian(10);
        jac.column_mut(5).fill(0.0);
        let err = estimate_uncertainty(&params(), &r, &jac).unwrap_err();
        match err {
            FitError::SingularJacobian { parameter, .. } => assert_eq!(parameter, Some("Theta")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicated_column_is_singular() {
        let r = DVector::from_element(10, 0.1);
        let mut jac = well_posed_jacobian(10);
        let c0 = jac.column(0).clone_owned();
        jac.set_column(3, &(c0 * 2.0));
        let err = estimate_uncertainty(&params(), &r, &jac).unwrap_err();
        assert!(matches!(err, FitError::SingularJacobian { parameter: None, .. }));
    }

    #[test]
    fn identity_jacobian_gives_closed_form_errors() {
        // J = [I; I] (12 × 6) → JᵀJ = 2I, Cov = I/2 · rᵀr/(12-6).
        let mut jac = DMatrix::<f64>::zeros(12, 6);
        for i in 0..6 {
            jac[(i, i)] = 1.0;
            jac[(i + 6, i)] = 1.0;
        }
        let r = DVector::from_element(12, 0.5);
        let u = estimate_uncertainty(&params(), &r, &jac).unwrap();
        let sigma2 = 12.0 * 0.25 / 6.0;
        assert!((u.sigma_squared - sigma2).abs() < 1e-12);
        let se = (sigma2 / 2.0_f64).sqrt();
        for i in 0..6 {
            assert!((u.standard_errors[i] - se).abs() < 1e-12);
        }
        assert!((u.percent_errors[1].unwrap() - 100.0 * se / 2.0).abs() < 1e-9);
    }

    #[test]
    fn parameter_at_zero_has_no_percent_error() {
        let mut jac = DMatrix::<f64>::zeros(12, 6);
        for i in 0..6 {
            jac[(i, i)] = 1.0;
            jac[(i + 6, i)] = 1.0;
        }
        let r = DVector::from_element(12, 0.5);
        let p = ParameterVector::from_array([0.0, 2.0, 3.0, 4.0, 0.5, 0.25]);
        let u = estimate_uncertainty(&p, &r, &jac).unwrap();
        assert!(u.standard_errors[0].is_finite());
        assert_eq!(u.percent_errors[0], None);
        assert!(u.percent_errors[1..].iter().all(|v| v.is_some()));
    }
}
