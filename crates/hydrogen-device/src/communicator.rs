//! Per-device multi-protocol fan-in/fan-out (C5), grounded on the original
//! `multi_protocol_communicator.cpp`'s "one object per device, owns whichever
//! transports are configured" shape.

use std::collections::HashMap;
use std::sync::Arc;

use hydrogen_message::Message;
use hydrogen_transport::Communicator;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::DeviceError;
use crate::kind::ProtocolKind;

/// Invoked for every inbound message, tagged with the transport it arrived on.
pub type DeviceMessageHandler = Arc<dyn Fn(ProtocolKind, Message) + Send + Sync>;
/// Invoked whenever one of the device's transports flips connection state.
pub type DeviceConnectionHandler = Arc<dyn Fn(ProtocolKind, bool) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ProtocolStatus {
    pub connected: bool,
    pub config_snapshot: serde_json::Value,
}

struct ProtocolEntry {
    communicator: Arc<dyn Communicator>,
    config_snapshot: serde_json::Value,
}

pub struct DeviceCommunicator {
    device_id: String,
    protocols: RwLock<HashMap<ProtocolKind, ProtocolEntry>>,
    message_handler: RwLock<Option<DeviceMessageHandler>>,
    connection_handler: RwLock<Option<DeviceConnectionHandler>>,
}

impl DeviceCommunicator {
    pub fn new(device_id: impl Into<String>) -> Arc<Self> {
        Arc::new(DeviceCommunicator {
            device_id: device_id.into(),
            protocols: RwLock::new(HashMap::new()),
            message_handler: RwLock::new(None),
            connection_handler: RwLock::new(None),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Registers `communicator` under `kind` and wires its callbacks to tag
    /// every event with that kind before forwarding to this device's own
    /// handlers.
    pub async fn add_protocol(
        self: &Arc<Self>,
        kind: ProtocolKind,
        communicator: Arc<dyn Communicator>,
        config_snapshot: serde_json::Value,
    ) {
        let device = self.clone();
        communicator.on_message(Arc::new(move |msg: Message| {
            let device = device.clone();
            tokio::spawn(async move {
                if let Some(h) = device.message_handler.read().await.as_ref() {
                    h(kind, msg);
                }
            });
        }));

        let device = self.clone();
        communicator.on_connection_changed(Arc::new(move |connected: bool| {
            let device = device.clone();
            tokio::spawn(async move {
                if let Some(h) = device.connection_handler.read().await.as_ref() {
                    h(kind, connected);
                }
            });
        }));

        self.protocols.write().await.insert(
            kind,
            ProtocolEntry {
                communicator,
                config_snapshot,
            },
        );
    }

    pub async fn remove_protocol(&self, kind: ProtocolKind) -> bool {
        self.protocols.write().await.remove(&kind).is_some()
    }

    pub async fn has_protocol(&self, kind: ProtocolKind) -> bool {
        self.protocols.read().await.contains_key(&kind)
    }

    pub async fn active_protocols(&self) -> Vec<ProtocolKind> {
        self.protocols
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.communicator.is_connected())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Routes to exactly the named protocol. Never falls back to another
    /// active transport if `kind` isn't configured (spec §4.5).
    pub async fn send(&self, message: &Message, kind: ProtocolKind) -> Result<(), DeviceError> {
        let protocols = self.protocols.read().await;
        let entry = protocols.get(&kind).ok_or(DeviceError::ProtocolNotActive(kind))?;
        entry.communicator.send_async(message).await.map_err(DeviceError::from)
    }

    /// Sends on every active transport; returns `true` only if all sends
    /// succeeded.
    pub async fn broadcast(&self, message: &Message) -> bool {
        let protocols = self.protocols.read().await;
        let mut all_ok = true;
        for (kind, entry) in protocols.iter() {
            if let Err(e) = entry.communicator.send_async(message).await {
                warn!(device = %self.device_id, protocol = %kind, error = %e, "broadcast send failed");
                all_ok = false;
            }
        }
        all_ok
    }

    pub async fn on_message(&self, handler: DeviceMessageHandler) {
        *self.message_handler.write().await = Some(handler);
    }

    pub async fn on_connection(&self, handler: DeviceConnectionHandler) {
        *self.connection_handler.write().await = Some(handler);
    }

    pub async fn status(&self) -> HashMap<ProtocolKind, ProtocolStatus> {
        self.protocols
            .read()
            .await
            .iter()
            .map(|(kind, entry)| {
                (
                    *kind,
                    ProtocolStatus {
                        connected: entry.communicator.is_connected(),
                        config_snapshot: entry.config_snapshot.clone(),
                    },
                )
            })
            .collect()
    }
}
