use thiserror::Error;

#[derive(Debug, Error)]
pub enum FifoError {
    #[error("failed to create or open pipe: {0}")]
    Open(String),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("pipe not connected")]
    NotConnected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message codec error: {0}")]
    Codec(#[from] hydrogen_message::MessageError),

    #[error("reconnect attempts exhausted")]
    ReconnectExhausted,
}
