//! Mathematical utilities: complex kernels and small linear algebra.

pub mod complex;
pub mod linalg;

pub use complex::*;
pub use linalg::*;
