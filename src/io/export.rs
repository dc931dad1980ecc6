//! Text fit report (`<stem>_fit.txt`).
//!
//! Layout:
//!
//! - two header lines
//! - one tab-separated row per fitted frequency: `f, Re(Z), Im(Z), |Z|`
//! - a `#`-commented summary block with fitted values, standard errors and
//!   percent errors in physical units
//!
//! Numbers follow printf-style conversions (`%5.8f`, `%.3e`, ...) and rows use
//! shortest round-trip floats, so files written here line up with reports
//! produced by older fitting tools. Standard errors that could not be
//! computed are written as `n/a`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;

use crate::domain::{CellGeometry, Measurement};
use crate::error::AppError;
use crate::report::FitReport;

/// `<dir>/<stem>_fit.txt`.
pub fn report_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}_fit.txt"))
}

/// Write the text report for one fit.
pub fn write_fit_report(path: &Path, report: &FitReport, geometry: &CellGeometry) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    out.write_all(render_fit_report(report, geometry).as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| AppError::new(2, format!("Failed to write report '{}': {e}", path.display())))?;
    info!("saved fit report to {}", path.display());
    Ok(())
}

/// Render the report body.
pub fn render_fit_report(report: &FitReport, geometry: &CellGeometry) -> String {
    let mut s = String::new();
    s.push_str("#Fitted model at fitting frequencies:\n#Frequency\t\tRe(Z)\t\t\tIm(Z)\t\t\t|Z|\n");

    let c = &report.curve;
    for i in 0..c.len() {
        s.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            py_repr(c.frequency[i]),
            py_repr(c.real[i]),
            py_repr(c.imag[i]),
            py_repr(c.magnitude[i])
        ));
    }

    let area = geometry.area;
    let p = &report.params;
    let se = report.standard_errors();
    let pct = report.percent_errors();
    // Index into the [Lwire, Rmem, Rcl, Qdl, Phi, Theta] order, scaled for display.
    let err = |i: usize, scale: f64| match se {
        Some(v) => c_exp(v[i] * scale, 3),
        None => "n/a".to_string(),
    };
    let rel = |i: usize| match pct.and_then(|v| v[i]) {
        Some(v) => c_fixed(v, 8, 2),
        None => format!("{:>8}", "n/a"),
    };

    s.push_str("#\n#\n#\t\t\t\t   Fit values\t\t\t~std dev\t\t\t   ~stdDev % of value\n#\n");
    s.push_str(&format!(
        "#\tRmem  [ohm*cm^2] \t  = {}\t\t\t{}\t\t\t\t{}\n",
        c_fixed(p.rmem * area, 5, 8),
        err(1, area),
        rel(1)
    ));
    s.push_str(&format!(
        "#\tRcl   [ohm*cm^2] \t  = {}\t\t\t{}\t\t\t\t{}\n",
        c_fixed(p.rcl * area, 5, 8),
        err(2, area),
        rel(2)
    ));
    s.push_str(&format!(
        "#\tQdl   [F/(cm^2*sec^phi)]  = {}\t\t\t{}\t\t\t\t{}\n",
        c_fixed(p.qdl, 5, 8),
        err(3, 1.0),
        rel(3)
    ));
    s.push_str(&format!(
        "#\tphi   [ ]  \t\t  = {}\t\t\t{}\t\t\t\t{}\n",
        c_fixed(p.phi, 5, 8),
        err(4, 1.0),
        rel(4)
    ));
    s.push_str(&format!(
        "#\tLwire [H*cm^2] \t\t  = {}\t\t\t{}\t\t\t\t{}\n",
        c_exp(p.lwire * area, 4),
        err(0, area),
        rel(0)
    ));
    s.push_str(&format!(
        "#\ttheta   [ ]  \t\t  = {}\t\t\t{}\t\t\t\t{}\n",
        c_fixed(p.theta, 5, 8),
        err(5, 1.0),
        rel(5)
    ));
    s.push_str(&format!(
        "#\n#\tQdl/mgpt = {}\n#\tL2 norm of res = {}",
        c_fixed(geometry.qdl_per_mg(p.qdl), 5, 6),
        c_fixed(report.l2_norm(), 10, 8)
    ));
    s.push_str(&format!(
        "\n#\tAvg. |Z| residual % WRT to data |Z| = {}",
        report
            .avg_residual_percent()
            .map_or_else(|| "n/a".to_string(), py_repr)
    ));
    s
}

/// Write a measurement as a tab-separated export readable by
/// [`load_spectrum`](crate::io::load_spectrum).
pub fn write_spectrum(path: &Path, m: &Measurement, comment: &str) -> Result<(), AppError> {
    let mut s = String::new();
    for line in comment.lines() {
        s.push_str(&format!("# {line}\n"));
    }
    s.push_str("Index\tFrequency (Hz)\tZ' (Ohm)\tZ'' (Ohm)\t|Z| (Ohm)\n");
    for i in 0..m.len() {
        s.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            i + 1,
            py_repr(m.frequency()[i]),
            py_repr(m.z_real()[i]),
            py_repr(m.z_imag()[i]),
            py_repr(m.z_magnitude()[i])
        ));
    }
    std::fs::write(path, s)
        .map_err(|e| AppError::new(2, format!("Failed to write spectrum '{}': {e}", path.display())))?;
    info!("wrote {} points to {}", m.len(), path.display());
    Ok(())
}

fn non_finite(x: f64) -> Option<&'static str> {
    if x.is_nan() {
        Some("nan")
    } else if x == f64::INFINITY {
        Some("inf")
    } else if x == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}

/// Shortest round-trip float, switching to exponent form outside
/// `[1e-4, 1e16)` (`1e-05`, `2.5e+16`, `0.001`, `3.0`).
pub fn py_repr(x: f64) -> String {
    if let Some(s) = non_finite(x) {
        return s.to_string();
    }
    let a = x.abs();
    if a == 0.0 || (1e-4..1e16).contains(&a) {
        let s = format!("{x}");
        if s.contains('.') { s } else { format!("{s}.0") }
    } else {
        let s = format!("{x:e}");
        split_exponent(&s)
    }
}

/// printf `%W.Pf`.
pub fn c_fixed(x: f64, width: usize, precision: usize) -> String {
    match non_finite(x) {
        Some(s) => format!("{s:>width$}"),
        None => format!("{x:>width$.precision$}"),
    }
}

/// printf `%.Pe` (sign and at least two exponent digits).
pub fn c_exp(x: f64, precision: usize) -> String {
    if let Some(s) = non_finite(x) {
        return s.to_string();
    }
    split_exponent(&format!("{x:.precision$e}"))
}

/// Rewrite Rust's `1.5e-5` exponent as `1.5e-05`.
fn split_exponent(s: &str) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s.to_string(),
    }
}
