use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorrelatorError {
    #[error("timed out waiting for a response")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[from] hydrogen_transport::TransportError),

    #[error("reconnect attempts exhausted")]
    ReconnectExhausted,

    #[error("invalid configuration: {0}")]
    Config(String),
}
