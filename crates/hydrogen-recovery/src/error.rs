use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(String),

    #[error("retries exhausted after {0} attempts: {1}")]
    RetriesExhausted(u32, String),

    #[error("operation failed: {0}")]
    OperationFailed(String),
}
