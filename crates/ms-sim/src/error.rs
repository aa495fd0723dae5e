//! Error types for simulator operations.

use ms_core::CoreError;
use thiserror::Error;

/// Errors raised while configuring, stepping or scheduling a simulator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: String },

    #[error("Length mismatch: {what} (expected {expected}, got {actual})")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("State index out of range: index={index}, len={len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Scheduler error: {message}")]
    Scheduler { message: String },

    #[error("Simulator lock poisoned by a panicking callback")]
    Poisoned,
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Convenience for model callbacks reporting their own failures.
    pub fn model(message: impl Into<String>) -> Self {
        SimError::Model {
            message: message.into(),
        }
    }
}

impl From<CoreError> for SimError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::IndexOutOfBounds { index, len, .. } => {
                SimError::IndexOutOfRange { index, len }
            }
            other => SimError::InvalidConfig {
                what: other.to_string(),
            },
        }
    }
}
