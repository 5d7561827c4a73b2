//! Device registry and client-command correlation.
//!
//! `DeviceCommunicator::send` is fire-and-forget (spec §4.5); responses
//! arrive later through the device's own tagged `message_handler` callback.
//! To route a RESPONSE/ERROR back to the client that issued the original
//! COMMAND, the connection plane records a `messageId -> clientId` entry
//! when the command is dispatched and drains it when a correlated reply
//! comes back from the device side, analogous to but independent from
//! `hydrogen_correlator`'s own pending-oneshot map (that one correlates a
//! device-facing request with its device-facing reply; this one correlates
//! a client-facing request with its client-facing reply).

use std::collections::HashMap;
use std::sync::Arc;

use hydrogen_device::{DeviceCommunicator, ProtocolKind};
use tokio::sync::RwLock;

struct DeviceEntry {
    communicator: Arc<DeviceCommunicator>,
    default_protocol: ProtocolKind,
}

pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceEntry>>,
    /// `originalMessageId` -> the client id that should receive the reply.
    pending_replies: RwLock<HashMap<String, String>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry {
            devices: RwLock::new(HashMap::new()),
            pending_replies: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(
        &self,
        device_id: impl Into<String>,
        communicator: Arc<DeviceCommunicator>,
        default_protocol: ProtocolKind,
    ) {
        self.devices.write().await.insert(
            device_id.into(),
            DeviceEntry { communicator, default_protocol },
        );
    }

    pub async fn unregister(&self, device_id: &str) -> bool {
        self.devices.write().await.remove(device_id).is_some()
    }

    pub async fn is_registered(&self, device_id: &str) -> bool {
        self.devices.read().await.contains_key(device_id)
    }

    pub async fn device_ids(&self) -> Vec<String> {
        self.devices.read().await.keys().cloned().collect()
    }

    pub async fn get(&self, device_id: &str) -> Option<Arc<DeviceCommunicator>> {
        self.devices.read().await.get(device_id).map(|e| e.communicator.clone())
    }

    pub async fn default_protocol(&self, device_id: &str) -> Option<ProtocolKind> {
        self.devices.read().await.get(device_id).map(|e| e.default_protocol)
    }

    /// Records that `message_id` was sent to `device_id` on behalf of
    /// `client_id`, so the eventual device-side reply can be routed back.
    pub async fn track_pending(&self, message_id: impl Into<String>, client_id: impl Into<String>) {
        self.pending_replies.write().await.insert(message_id.into(), client_id.into());
    }

    /// Looks up and removes the client id waiting on `original_message_id`,
    /// if any reply is expected for it.
    pub async fn take_pending(&self, original_message_id: &str) -> Option<String> {
        self.pending_replies.write().await.remove(original_message_id)
    }

    /// Drops any pending-reply entries for a client that disconnected, so
    /// they don't accumulate unboundedly.
    pub async fn drop_pending_for_client(&self, client_id: &str) {
        self.pending_replies.write().await.retain(|_, v| v != client_id);
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_lookup_round_trips() {
        let registry = DeviceRegistry::new();
        let device = DeviceCommunicator::new("dev-1");
        registry.register("dev-1", device, ProtocolKind::Tcp).await;

        assert!(registry.is_registered("dev-1").await);
        assert_eq!(registry.default_protocol("dev-1").await, Some(ProtocolKind::Tcp));
        assert!(registry.unregister("dev-1").await);
        assert!(!registry.is_registered("dev-1").await);
    }

    #[tokio::test]
    async fn pending_reply_round_trips_and_clears() {
        let registry = DeviceRegistry::new();
        registry.track_pending("m1", "client-a").await;
        assert_eq!(registry.take_pending("m1").await, Some("client-a".to_string()));
        assert_eq!(registry.take_pending("m1").await, None);
    }

    #[tokio::test]
    async fn drop_pending_for_client_removes_only_that_clients_entries() {
        let registry = DeviceRegistry::new();
        registry.track_pending("m1", "client-a").await;
        registry.track_pending("m2", "client-b").await;
        registry.drop_pending_for_client("client-a").await;
        assert_eq!(registry.take_pending("m1").await, None);
        assert_eq!(registry.take_pending("m2").await, Some("client-b".to_string()));
    }
}
