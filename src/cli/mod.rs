//! Command-line parsing for the impedance fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code. Every numeric option can also come from an `EISFIT_*`
//! environment variable (a `.env` file in the working directory is loaded
//! before parsing).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{CellGeometry, ModelKind, ParameterVector};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "eisfit",
    version,
    about = "Equivalent-circuit fitting for electrochemical impedance spectra"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one or more spectra, print a summary per file, and optionally export.
    Fit(FitArgs),
    /// Evaluate the model at the given parameters against a spectrum (no fitting).
    Sim(SimArgs),
    /// Write a synthetic spectrum generated from the model.
    Synth(SynthArgs),
}

/// Model choice, parameters (physical units) and cell geometry.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Equivalent-circuit model.
    #[arg(short = 'm', long, value_enum, env = "EISFIT_MODEL", default_value_t = ModelKind::TransmissionLine)]
    pub model: ModelKind,

    /// Membrane resistance [ohm*cm^2]. Replaced by the data-driven seed when fitting.
    #[arg(long, env = "EISFIT_RMEM", default_value_t = 0.03)]
    pub rmem: f64,

    /// Catalyst-layer resistance [ohm*cm^2].
    #[arg(long, env = "EISFIT_RCL", default_value_t = 0.1)]
    pub rcl: f64,

    /// Double-layer CPE coefficient [F/(cm^2*s^phi)].
    #[arg(long, env = "EISFIT_QDL", default_value_t = 2.5)]
    pub qdl: f64,

    /// Double-layer CPE exponent.
    #[arg(long, env = "EISFIT_PHI", default_value_t = 0.95)]
    pub phi: f64,

    /// Wire inductance [H*cm^2].
    #[arg(long, env = "EISFIT_LWIRE", default_value_t = 2e-5)]
    pub lwire: f64,

    /// Wire inductance exponent.
    #[arg(long, env = "EISFIT_THETA", default_value_t = 0.95)]
    pub theta: f64,

    /// Active cell area [cm^2].
    #[arg(long, env = "EISFIT_AREA", default_value_t = 50.0)]
    pub area: f64,

    /// Catalyst loading [mg/cm^2].
    #[arg(long, env = "EISFIT_LOADING", default_value_t = 0.1)]
    pub loading: f64,

    /// Lower frequency bound [Hz] (exclusive).
    #[arg(long, env = "EISFIT_F_LOW", default_value_t = 1.0)]
    pub f_low: f64,

    /// Upper frequency bound [Hz] (exclusive).
    #[arg(long, env = "EISFIT_F_HIGH", default_value_t = 10000.0)]
    pub f_high: f64,
}

impl ModelArgs {
    /// Parameters as entered, in physical units.
    pub fn params(&self) -> ParameterVector {
        ParameterVector {
            lwire: self.lwire,
            rmem: self.rmem,
            rcl: self.rcl,
            qdl: self.qdl,
            phi: self.phi,
            theta: self.theta,
        }
    }

    pub fn geometry(&self) -> CellGeometry {
        CellGeometry {
            area: self.area,
            loading: self.loading,
        }
    }

    pub fn window(&self) -> (f64, f64) {
        (self.f_low, self.f_high)
    }
}

/// Options for fitting.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Spectrum files (`.txt` tab-separated or `.csv`).
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Relative half-width of the Rmem bound interval around its seed.
    #[arg(long, env = "EISFIT_RMEM_BAND", default_value_t = 0.1)]
    pub rmem_band: f64,

    /// Residual evaluation budget per fit.
    #[arg(long, env = "EISFIT_MAX_EVALUATIONS", default_value_t = 50_000)]
    pub max_evaluations: usize,

    /// Relative step tolerance.
    #[arg(long, env = "EISFIT_XTOL", default_value_t = 1e-11)]
    pub xtol: f64,

    /// Relative cost-reduction tolerance.
    #[arg(long, env = "EISFIT_FTOL", default_value_t = 1e-11)]
    pub ftol: f64,

    /// Projected-gradient tolerance.
    #[arg(long, env = "EISFIT_GTOL", default_value_t = 1e-11)]
    pub gtol: f64,

    /// Wall-clock limit for each fit, in seconds.
    #[arg(long, env = "EISFIT_TIMEOUT_SECS")]
    pub timeout_secs: Option<f64>,

    /// Directory for `<stem>_fit.txt` reports.
    #[arg(long, env = "EISFIT_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,

    /// Write all results to a JSON document.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}

/// Options for simulation.
#[derive(Debug, Args, Clone)]
pub struct SimArgs {
    /// Spectrum file to compare against.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Also print the model curve point by point.
    #[arg(long)]
    pub table: bool,
}

/// Options for synthetic spectrum generation.
#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output `.txt` file.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Number of log-spaced frequencies.
    #[arg(long, default_value_t = 60)]
    pub points: usize,

    /// Lowest generated frequency [Hz].
    #[arg(long, default_value_t = 0.1)]
    pub f_min: f64,

    /// Highest generated frequency [Hz].
    #[arg(long, default_value_t = 100_000.0)]
    pub f_max: f64,

    /// Gaussian noise as a fraction of |Z| (0 disables noise).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_defaults() {
        let cli = Cli::parse_from(["eisfit", "fit", "a.txt", "b.csv"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.model.model, ModelKind::TransmissionLine);
        assert_eq!(args.model.window(), (1.0, 10000.0));
        assert_eq!(args.max_evaluations, 50_000);
        assert!((args.model.rmem - 0.03).abs() < 1e-15);
        assert!((args.model.geometry().area - 50.0).abs() < 1e-15);
        assert!(args.export_json.is_none());
    }

    #[test]
    fn model_aliases() {
        let cli = Cli::parse_from(["eisfit", "sim", "a.txt", "--model", "spherical", "--table"]);
        let Command::Sim(args) = cli.command else {
            panic!("expected sim");
        };
        assert_eq!(args.model.model, ModelKind::SphericalDiffusion);
        assert!(args.table);
    }

    #[test]
    fn fit_requires_a_file() {
        assert!(Cli::try_parse_from(["eisfit", "fit"]).is_err());
    }
}
