//! `eis-fit` library crate.
//!
//! The binary (`eisfit`) is a thin wrapper around this library so that:
//!
//! - the fitting engine is testable without spawning processes
//! - the engine can be embedded without the CLI (batch scripts, services)
//! - I/O and presentation stay out of the numerical code

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
