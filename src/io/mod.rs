//! Input/output helpers.
//!
//! - spectrum ingest from `.txt`/`.csv` exports (`ingest`)
//! - text fit reports and spectrum files (`export`)
//! - JSON fit documents (`json`)

pub mod export;
pub mod ingest;
pub mod json;

pub use export::*;
pub use ingest::*;
pub use json::*;
