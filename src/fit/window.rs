//! Frequency windowing.
//!
//! Points are selected element-wise with `low < f < high` (both ends open),
//! so the qualifying points do not need to form a contiguous run in the raw
//! ordering.

use crate::domain::{Measurement, WindowedSeries};
use crate::error::FitError;

/// Restrict `m` to the points with `low < frequency < high`, preserving order.
pub fn window(m: &Measurement, low: f64, high: f64) -> Result<WindowedSeries, FitError> {
    if low.is_nan() || high.is_nan() || low >= high {
        return Err(FitError::EmptyWindow { low, high });
    }

    let mut out = WindowedSeries {
        low,
        high,
        frequency: Vec::new(),
        z_real: Vec::new(),
        z_imag: Vec::new(),
        z_magnitude: Vec::new(),
    };

    for (i, &f) in m.frequency().iter().enumerate() {
        if f > low && f < high {
            out.frequency.push(f);
            out.z_real.push(m.z_real()[i]);
            out.z_imag.push(m.z_imag()[i]);
            out.z_magnitude.push(m.z_magnitude()[i]);
        }
    }

    if out.is_empty() {
        return Err(FitError::EmptyWindow { low, high });
    }
    Ok(out)
}
