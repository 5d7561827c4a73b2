//! The uniform per-protocol contract every transport implements (spec §4.4,
//! grounded on the original `device_communicator.h` / `protocol_communicators.h`
//! interface — every transport exposes the same connect/send/receive/stats
//! shape regardless of wire format).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hydrogen_message::{Message, QosLevel};

use crate::error::TransportError;
use crate::stats::StatsSnapshot;

/// Invoked for every inbound message, off the transport's own read loop.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;
/// Invoked whenever the transport's connection state flips.
pub type ConnectionHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// A single protocol communicator: one instance per device-protocol pair
/// (spec §4.4/§4.5 — instances are never shared across devices).
#[async_trait]
pub trait Communicator: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
    fn is_connected(&self) -> bool;

    /// Fire-and-forget send; resolves once the payload is handed to the
    /// transport, not once a peer acknowledges it.
    async fn send_async(&self, message: &Message) -> Result<(), TransportError>;

    /// Send `message` and block until a correlated response arrives or
    /// `timeout` elapses. Transports with no request/response notion of
    /// their own (e.g. plain STDIO) may return `TransportError::Unsupported`.
    async fn send_sync(&self, message: &Message, timeout: Duration) -> Result<Message, TransportError>;

    /// Register a handler invoked for every inbound message. Replaces any
    /// previously registered handler.
    fn on_message(&self, handler: MessageHandler);

    /// Register a handler invoked with `true`/`false` on connect/disconnect.
    fn on_connection_changed(&self, handler: ConnectionHandler);

    fn stats(&self) -> StatsSnapshot;
    fn reset_stats(&self);

    fn set_qos(&self, qos: QosLevel);
    fn set_compression(&self, enabled: bool);
    fn set_encryption(&self, enabled: bool);
}
