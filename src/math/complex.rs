//! Complex building blocks for the impedance models.
//!
//! - `jw_pow(ω, a) = (iω)^a`, the constant-phase factor
//! - `coth(z) = (e^z + e^-z) / (e^z - e^-z)`
//! - `sqrt_coth_excess(x) = (√x·coth(√x) - 1) / x`, the small-`x` series the
//!   models switch to near `x = 0`
//!
//! Numerical notes:
//! - `coth` is evaluated through `e^{-2z}` (or `e^{2z}` for `Re z < 0`), which is
//!   the same function but cannot overflow for large `|Re z|`.
//! - For small `|z|` the denominator `1 - e^{-2z}` cancels catastrophically, so
//!   we compute it with a complex `expm1`.

use std::f64::consts::FRAC_PI_2;

use num_complex::Complex64;

/// `(iω)^a` for `ω >= 0`, as `ω^a · e^{i·a·π/2}`.
pub fn jw_pow(omega: f64, a: f64) -> Complex64 {
    Complex64::from_polar(omega.powf(a), a * FRAC_PI_2)
}

/// `e^z - 1` without cancellation for small `|z|`.
pub fn exp_m1(z: Complex64) -> Complex64 {
    // e^{a+ib} - 1 = (e^a cos b - 1) + i e^a sin b
    //             = (expm1(a) cos b - 2 sin²(b/2)) + i e^a sin b
    let (a, b) = (z.re, z.im);
    let half = (b / 2.0).sin();
    Complex64::new(a.exp_m1() * b.cos() - 2.0 * half * half, a.exp() * b.sin())
}

/// Hyperbolic cotangent of a complex argument.
pub fn coth(z: Complex64) -> Complex64 {
    // coth(z) = (1 + e^{-2z}) / (1 - e^{-2z}) = -(2 + m) / m, m = expm1(-2z).
    // coth is odd, so for Re z < 0 evaluate at -z and negate.
    if z.re < 0.0 {
        return -coth(-z);
    }
    let m = exp_m1(-2.0 * z);
    -(Complex64::new(2.0, 0.0) + m) / m
}

/// `(√x·coth(√x) - 1) / x` from the series of `u·coth(u)` in `x = u²`.
///
/// Round-off accurate for `|x| < 1e-3`; finite at `x = 0`, where it is `1/3`.
pub fn sqrt_coth_excess(x: Complex64) -> Complex64 {
    // 1/3 - x/45 + 2x²/945 - x³/4725 + 2x⁴/93555
    const COEFFS: [f64; 5] = [1.0 / 3.0, -1.0 / 45.0, 2.0 / 945.0, -1.0 / 4725.0, 2.0 / 93555.0];
    COEFFS
        .iter()
        .rev()
        .fold(Complex64::new(0.0, 0.0), |acc, &c| acc * x + c)
}
