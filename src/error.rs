use thiserror::Error;

use crate::domain::ParameterVector;

/// Failures raised by the fitting engine.
///
/// Every variant is returned to the immediate caller; the engine never turns a
/// degenerate input into a NaN-filled "result".
#[derive(Debug, Clone, Error)]
pub enum FitError {
    /// The frequency window excludes every data point.
    #[error("no data points lie strictly between {low} Hz and {high} Hz")]
    EmptyWindow { low: f64, high: f64 },

    /// The model selector does not name one of the known variants.
    #[error("unknown model variant '{0}'")]
    UnknownModel(String),

    /// The solver stopped without meeting any tolerance.
    #[error("solver did not converge after {evaluations} residual evaluations: {reason}")]
    ConvergenceFailure {
        reason: NonConvergence,
        evaluations: usize,
        best: Box<ParameterVector>,
    },

    /// `JᵀJ` is singular or too ill-conditioned to invert.
    #[error("{}", singular_message(.parameter, .condition))]
    SingularJacobian {
        parameter: Option<&'static str>,
        condition: f64,
    },

    /// Not enough residuals to leave positive degrees of freedom.
    #[error("{n} residual points cannot support {params} parameters (need n > {params})")]
    InsufficientData { n: usize, params: usize },

    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("invalid parameter bounds: {0}")]
    InvalidBounds(String),

    #[error("model produced a non-finite residual at {0:?}")]
    NonFiniteResidual(Box<ParameterVector>),

    #[error("fit cancelled after {evaluations} residual evaluations")]
    Cancelled {
        evaluations: usize,
        best: Box<ParameterVector>,
    },

    #[error("fit deadline exceeded after {evaluations} residual evaluations")]
    DeadlineExceeded {
        evaluations: usize,
        best: Box<ParameterVector>,
    },
}

/// Why a solve ended in [`FitError::ConvergenceFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonConvergence {
    /// The residual evaluation budget ran out.
    EvaluationBudget,
    /// The damping parameter reached its ceiling without an acceptable step.
    DampingOverflow,
    /// Steps shrank below `xtol` while the projected gradient was still large.
    Stalled,
}

impl std::fmt::Display for NonConvergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            NonConvergence::EvaluationBudget => "evaluation budget exhausted",
            NonConvergence::DampingOverflow => "damping parameter overflowed",
            NonConvergence::Stalled => "step collapsed away from a stationary point",
        };
        f.write_str(msg)
    }
}

fn singular_message(parameter: &Option<&'static str>, condition: &f64) -> String {
    match parameter {
        Some(name) => format!(
            "Jacobian is singular: parameter {name} has no local sensitivity (pinned at a bound?)"
        ),
        None => format!("Jacobian is ill-conditioned (condition number {condition:.3e})"),
    }
}

impl FitError {
    /// Best parameters reached before the solver gave up, if any.
    pub fn best_params(&self) -> Option<&ParameterVector> {
        match self {
            FitError::ConvergenceFailure { best, .. }
            | FitError::Cancelled { best, .. }
            | FitError::DeadlineExceeded { best, .. } => Some(best.as_ref()),
            _ => None,
        }
    }

    /// Process exit code used by the binary for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::UnknownModel(_) | FitError::InvalidBounds(_) => 2,
            FitError::EmptyWindow { .. }
            | FitError::InvalidMeasurement(_)
            | FitError::InsufficientData { .. } => 3,
            _ => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
