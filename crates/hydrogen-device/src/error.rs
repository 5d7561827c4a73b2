use thiserror::Error;

use crate::kind::ProtocolKind;

/// Grounded on the original `multi_protocol_communicator.cpp`: sending on a
/// protocol the device never configured is a hard error, never a silent
/// fallback to another active transport.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("protocol {0} is not active for this device")]
    ProtocolNotActive(ProtocolKind),

    #[error("transport error: {0}")]
    Transport(#[from] hydrogen_transport::TransportError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
