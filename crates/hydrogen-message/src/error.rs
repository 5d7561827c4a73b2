use thiserror::Error;

/// Errors surfaced by `hydrogen-message` (C1/C2/C3).
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("unsupported transform target: {0}")]
    UnsupportedFormat(String),
}
