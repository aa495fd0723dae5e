use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// A configuration or request value failed a guard.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("{what} must be finite, got {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("{what} must be greater than zero, got {value}")]
    NotPositive { what: &'static str, value: f64 },

    #[error("{what} index {index} is outside 0..{len}")]
    IndexOutOfBounds {
        what: &'static str,
        index: usize,
        len: usize,
    },
}
