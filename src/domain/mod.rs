//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the model selector (`ModelKind`)
//! - spectra (`Measurement`, `WindowedSeries`)
//! - parameters and their box constraints (`ParameterVector`, `ParameterBounds`)
//! - run configuration (`FitConfig`, `SolverOptions`, `CellGeometry`)

pub mod types;

pub use types::*;
