//! Top-level application orchestration.
//!
//! `src/main.rs` only sets up logging; this module:
//! - loads `.env` and parses CLI arguments
//! - runs fits or simulations through the shared pipeline
//! - prints reports
//! - writes optional exports

use chrono::Utc;
use clap::Parser;
use log::error;

use crate::cli::{Command, FitArgs, SimArgs, SynthArgs};
use crate::data::synthetic::{NoiseSpec, log_spaced, synthesize};
use crate::domain::{FitConfig, SolverOptions};
use crate::error::AppError;
use crate::io::{FitDocument, SpectrumEntry, report_path, write_fit_json, write_fit_report, write_spectrum};

pub mod pipeline;

/// Entry point for the `eisfit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Sim(args) => handle_sim(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    for r in &run.runs {
        match &r.result {
            Ok(report) => println!(
                "{}",
                crate::report::format_fit_summary(&r.spectrum.name, report, &config.geometry)
            ),
            Err(e) => {
                error!("{}: fit failed: {e}", r.spectrum.path.display());
                if let Some(best) = e.best_params() {
                    error!(
                        "{}: best parameters so far (physical units): {:?}",
                        r.spectrum.name,
                        config.geometry.denormalize(best)
                    );
                }
            }
        }
    }

    // Optional exports.
    if let Some(dir) = &config.export_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;
        for r in &run.runs {
            if let Ok(report) = &r.result {
                write_fit_report(&report_path(dir, &r.spectrum.name), report, &config.geometry)?;
            }
        }
    }
    if let Some(path) = &config.export_json {
        let doc = FitDocument {
            tool: "eisfit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            model: config.model,
            geometry: config.geometry,
            window_hz: config.window,
            spectra: run
                .runs
                .iter()
                .map(|r| SpectrumEntry::new(&r.spectrum.name, &r.spectrum.path, &r.result, &config.geometry))
                .collect(),
        };
        write_fit_json(path, &doc)?;
    }

    match run.first_error() {
        Some(e) => Err(e.clone().into()),
        None => Ok(()),
    }
}

fn handle_sim(args: SimArgs) -> Result<(), AppError> {
    let geometry = args.model.geometry();
    let (spectrum, sim) = pipeline::run_simulation(
        &args.file,
        args.model.model,
        &args.model.params(),
        &geometry,
        args.model.window(),
    )?;

    println!(
        "{}",
        crate::report::format_simulation_summary(&spectrum.name, &sim, &geometry)
    );
    if args.table {
        println!("{}", crate::report::format_curve_table(&sim));
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let geometry = args.model.geometry();
    pipeline::validate_geometry(&geometry)?;
    if !(args.f_min > 0.0 && args.f_max > args.f_min && args.points >= 2) {
        return Err(AppError::new(
            2,
            "Synthetic grid needs 0 < f_min < f_max and at least 2 points.",
        ));
    }

    // Instruments sweep from high to low frequency.
    let mut freqs = log_spaced(args.f_min, args.f_max, args.points);
    freqs.reverse();
    let noise = (args.noise > 0.0).then_some(NoiseSpec {
        relative_sigma: args.noise,
        seed: args.seed,
    });
    let params = geometry.normalize(&args.model.params());
    let m = synthesize(args.model.model, &params, &freqs, noise)?;

    let comment = format!(
        "synthetic spectrum: {}\nparameters (physical units): {:?}\narea={} cm^2, noise={}, seed={}",
        args.model.model.display_name(),
        args.model.params(),
        geometry.area,
        args.noise,
        args.seed
    );
    write_spectrum(&args.out, &m, &comment)
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    Ok(FitConfig {
        files: args.files.clone(),
        model: args.model.model,
        initial: args.model.params(),
        geometry: args.model.geometry(),
        window: args.model.window(),
        rmem_band: args.rmem_band,
        solver: SolverOptions {
            xtol: args.xtol,
            ftol: args.ftol,
            gtol: args.gtol,
            max_evaluations: args.max_evaluations,
            deadline: pipeline::deadline_from_secs(args.timeout_secs)?,
            cancel: None,
        },
        export_dir: args.export_dir.clone(),
        export_json: args.export_json.clone(),
    })
}
