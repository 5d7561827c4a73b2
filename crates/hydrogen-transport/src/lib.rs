//! Transport communicators (C4): one uniform [`Communicator`] contract,
//! implemented per wire protocol.

mod communicator;
mod error;
mod stats;

#[cfg(feature = "websocket")]
mod websocket;

#[cfg(feature = "tcp")]
mod tcp;

#[cfg(feature = "stdio")]
mod stdio;

#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "grpc")]
mod grpc;

#[cfg(feature = "zmq")]
mod zmq;

#[cfg(feature = "fifo")]
mod fifo;

pub use communicator::{Communicator, ConnectionHandler, MessageHandler};
pub use error::TransportError;
pub use stats::{CommunicatorStats, StatsSnapshot};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketCommunicator;

#[cfg(feature = "tcp")]
pub use tcp::{Framing, TcpCommunicator};

#[cfg(feature = "stdio")]
pub use stdio::StdioCommunicator;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttCommunicator, MqttConfig};

#[cfg(feature = "grpc")]
pub use grpc::GrpcCommunicator;

#[cfg(feature = "zmq")]
pub use zmq::{SocketKind, ZmqCommunicator, ZmqConfig};

#[cfg(feature = "fifo")]
pub use fifo::FifoCommunicator;
