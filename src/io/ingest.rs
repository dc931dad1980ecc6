//! Spectrum ingest.
//!
//! Instrument exports are delimited text with a fixed column layout:
//!
//! | index | 0     | 1     | 2   | 3    | 4   |
//! |-------|-------|-------|-----|------|-----|
//! | value | point | f(Hz) | Z'  | Z''  | |Z| |
//!
//! - `.txt` files are tab-separated, `.csv` files comma-separated
//! - lines starting with `#` are comments
//! - the first non-comment line is a header
//! - a header naming `-Z''` means the imaginary column holds the negated
//!   value, so it is negated back on load
//!
//! Rows that fail to parse are skipped and reported; the remaining rows must
//! still form a valid [`Measurement`].

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::{debug, warn};

use crate::domain::Measurement;
use crate::error::AppError;

const COL_FREQUENCY: usize = 1;
const COL_REAL: usize = 2;
const COL_IMAG: usize = 3;
const COL_MAGNITUDE: usize = 4;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// One file turned into a measurement.
#[derive(Debug, Clone)]
pub struct LoadedSpectrum {
    /// File stem, used to name derived outputs.
    pub name: String,
    pub path: PathBuf,
    pub measurement: Measurement,
    /// Whether the imaginary column was stored as `-Z''` and negated.
    pub negated_imag: bool,
    pub row_errors: Vec<RowError>,
}

/// Load a `.txt` (tab) or `.csv` (comma) spectrum.
pub fn load_spectrum(path: &Path) -> Result<LoadedSpectrum, AppError> {
    let delimiter = delimiter_for(path)?;
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open data file '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read header of '{}': {e}", path.display())))?
        .clone();
    if headers.len() <= COL_IMAG {
        return Err(AppError::new(
            2,
            format!(
                "'{}' has {} columns; expected point, frequency, Z', Z'' and |Z|.",
                path.display(),
                headers.len()
            ),
        ));
    }
    let negated_imag = is_negated_imag_header(&headers[COL_IMAG]);

    let mut frequency = Vec::new();
    let mut z_real = Vec::new();
    let mut z_imag = Vec::new();
    let mut z_magnitude = Vec::new();
    let mut has_magnitude = true;
    let mut row_errors = Vec::new();

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                row_errors.push(RowError {
                    line,
                    message: format!("parse error: {e}"),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        match parse_row(&record) {
            Ok((f, re, im, mag)) => {
                frequency.push(f);
                z_real.push(re);
                z_imag.push(if negated_imag { -im } else { im });
                match mag {
                    Some(m) => z_magnitude.push(m),
                    None => has_magnitude = false,
                }
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    for err in &row_errors {
        warn!("{}: line {}: {}", path.display(), err.line, err.message);
    }
    debug!(
        "{}: {} points loaded, {} rows skipped",
        path.display(),
        frequency.len(),
        row_errors.len()
    );

    let magnitude = has_magnitude.then_some(z_magnitude);
    let measurement = Measurement::new(frequency, z_real, z_imag, magnitude).map_err(|e| {
        AppError::new(e.exit_code(), format!("'{}': {e}", path.display()))
    })?;

    Ok(LoadedSpectrum {
        name: file_stem(path),
        path: path.to_path_buf(),
        measurement,
        negated_imag,
        row_errors,
    })
}

fn delimiter_for(path: &Path) -> Result<u8, AppError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => Ok(b'\t'),
        Some("csv") => Ok(b','),
        _ => Err(AppError::new(
            2,
            format!(
                "Unsupported data file '{}': expected a .txt (tab) or .csv (comma) export.",
                path.display()
            ),
        )),
    }
}

fn is_negated_imag_header(name: &str) -> bool {
    name.trim().trim_start_matches('\u{feff}').starts_with("-Z''")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
        .to_string()
}

fn parse_row(record: &StringRecord) -> Result<(f64, f64, f64, Option<f64>), String> {
    let field = |idx: usize, name: &str| -> Result<f64, String> {
        let raw = record
            .get(idx)
            .ok_or_else(|| format!("missing {name} column"))?;
        raw.parse::<f64>()
            .map_err(|_| format!("invalid {name} value '{raw}'"))
    };

    let f = field(COL_FREQUENCY, "frequency")?;
    let re = field(COL_REAL, "Z'")?;
    let im = field(COL_IMAG, "Z''")?;
    let mag = match record.get(COL_MAGNITUDE) {
        Some(raw) if !raw.is_empty() => Some(
            raw.parse::<f64>()
                .map_err(|_| format!("invalid |Z| value '{raw}'"))?,
        ),
        _ => None,
    };
    Ok((f, re, im, mag))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("eis_fit_ingest_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_tab_separated_export() {
        let path = write_temp(
            "cell_a.txt",
            "# instrument export\n\
             Index\tFrequency (Hz)\tZ' (Ω)\tZ'' (Ω)\t|Z| (Ω)\n\
             1\t1000\t3\t4\t5\n\
             2\t100\t6\t-8\t10\n\
             3\t10\t1\t0\t1\n",
        );
        let s = load_spectrum(&path).unwrap();
        assert_eq!(s.name, "cell_a");
        assert!(!s.negated_imag);
        assert_eq!(s.measurement.frequency(), &[1000.0, 100.0, 10.0]);
        assert_eq!(s.measurement.z_imag(), &[4.0, -8.0, 0.0]);
        assert_eq!(s.measurement.z_magnitude(), &[5.0, 10.0, 1.0]);
        assert!(s.row_errors.is_empty());
    }

    #[test]
    fn negated_imaginary_column_is_flipped() {
        let path = write_temp(
            "cell_b.csv",
            "Index,Frequency (Hz),Z' (Ω),-Z'' (Ω),|Z| (Ω)\n\
             1,1000,3,4,5\n\
             2,100,6,-8,10\n",
        );
        let s = load_spectrum(&path).unwrap();
        assert!(s.negated_imag);
        assert_eq!(s.measurement.z_imag(), &[-4.0, 8.0]);
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let path = write_temp(
            "cell_c.txt",
            "Index\tFrequency (Hz)\tZ' (Ω)\tZ'' (Ω)\t|Z| (Ω)\n\
             1\t1000\t3\t4\t5\n\
             2\toops\t6\t-8\t10\n\
             3\t10\t1\t0\t1\n",
        );
        let s = load_spectrum(&path).unwrap();
        assert_eq!(s.measurement.len(), 2);
        assert_eq!(s.row_errors.len(), 1);
        assert!(s.row_errors[0].message.contains("frequency"));
    }

    #[test]
    fn missing_magnitude_is_derived() {
        let path = write_temp(
            "cell_d.csv",
            "Index,Frequency (Hz),Z' (Ω),Z'' (Ω)\n1,1000,3,4\n2,100,6,-8\n",
        );
        let s = load_spectrum(&path).unwrap();
        assert!((s.measurement.z_magnitude()[1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_spectrum(Path::new("cell.xlsx")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn empty_data_is_a_data_error() {
        let path = write_temp("cell_e.txt", "# nothing\nIndex\tFrequency\tZ'\tZ''\t|Z|\n");
        let err = load_spectrum(&path).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
