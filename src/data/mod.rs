//! Data sources that do not come from files.
//!
//! - seeded synthetic spectra (`synthetic`)

pub mod synthetic;

pub use synthetic::*;
