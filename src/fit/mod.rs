//! Impedance fitting.
//!
//! Responsibilities:
//!
//! - select the frequency window and seed `Rmem` from the data
//! - build the complex-plane residual vector and its Jacobian
//! - run the bounded least-squares solver
//! - estimate parameter uncertainty at the optimum

pub mod fitter;
pub mod residual;
pub mod rmem;
pub mod solver;
pub mod uncertainty;
pub mod window;

pub use fitter::*;
pub use residual::*;
pub use rmem::*;
pub use solver::*;
pub use uncertainty::*;
pub use window::*;
