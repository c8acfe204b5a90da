//! Error types for the simulation core

use thiserror::Error;

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors that terminate a simulation run
///
/// All three are terminal: a failed run never yields a partial trajectory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// A structural precondition on the input was violated
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Two bodies share the same position (or are so close the force
    /// overflows), the force law is undefined
    #[error("numerical singularity: bodies {first} and {second} coincide at t = {t}")]
    NumericalSingularity { first: usize, second: usize, t: f64 },

    /// The step controller ran out of its step or rejection budget
    #[error("integration diverged at t = {t}: {reason}")]
    IntegrationDivergence { t: f64, reason: String },
}

impl SimError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SimError::InvalidConfiguration(msg.into())
    }

    pub(crate) fn divergence(t: f64, reason: impl Into<String>) -> Self {
        SimError::IntegrationDivergence {
            t,
            reason: reason.into(),
        }
    }
}
