//! Data-driven seed for the membrane resistance.
//!
//! Where the imaginary impedance is closest to zero the real part is dominated
//! by the ohmic (membrane) resistance. The value seeds the initial guess and
//! centres the `Rmem` bound interval; it is not a fit.

use crate::domain::WindowedSeries;

/// `z_real` at the index of minimal `|z_imag|` (first occurrence wins on ties).
pub fn estimate_rmem(series: &WindowedSeries) -> f64 {
    let mut best = 0usize;
    let mut best_abs = f64::INFINITY;
    for (i, im) in series.z_imag().iter().enumerate() {
        let a = im.abs();
        if a < best_abs {
            best_abs = a;
            best = i;
        }
    }
    series.z_real()[best]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Measurement;
    use crate::fit::window;

    #[test]
    fn picks_real_part_at_smallest_imaginary_magnitude() {
        let f = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let re = vec![0.9, 0.8, 0.7, 0.6, 0.5];
        let im = vec![-0.3, -0.1, 0.02, -0.05, 0.2];
        let m = Measurement::new(f, re, im, None).unwrap();
        let w = window(&m, 0.0, 10.0).unwrap();
        assert_eq!(estimate_rmem(&w), 0.7);
    }

    #[test]
    fn ties_resolve_to_first_index() {
        let f = vec![1.0, 2.0, 3.0];
        let re = vec![3.0, 2.0, 1.0];
        let im = vec![0.5, -0.1, 0.1];
        let m = Measurement::new(f, re, im, None).unwrap();
        let w = window(&m, 0.0, 10.0).unwrap();
        assert_eq!(estimate_rmem(&w), 2.0);
    }
}
