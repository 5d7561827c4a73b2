use thiserror::Error;

/// Errors surfaced by a [`crate::Communicator`] implementation (spec §4.4).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("message codec error: {0}")]
    Codec(#[from] hydrogen_message::MessageError),

    #[error("unsupported operation for this transport: {0}")]
    Unsupported(String),
}
