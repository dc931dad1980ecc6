//! Equivalent-circuit impedance models.
//!
//! Models are implemented as small, pure functions of `(model, params, frequency)`
//! so that fitting, simulation and reporting share one evaluation path.

pub mod model;

pub use model::*;
