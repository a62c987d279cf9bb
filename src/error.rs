use thiserror::Error;

/// The error taxonomy of the core pipeline (parse / I/O / storage / config /
/// cancellation). Recoverable variants are caught and logged by the caller;
/// only [`CoreError::Configuration`] is allowed to propagate out of `main`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("could not parse catalog number from {0:?}")]
    ParseFailure(String),

    #[error("external call failed: {0}")]
    ExternalIo(String),

    #[error("constraint violation writing {table}: {reason}")]
    ConstraintViolation { table: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    pub const fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Configuration(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
