//! Per-device multi-protocol communicator (C5).

mod communicator;
mod config;
mod discovery;
mod error;
mod kind;

pub use communicator::{DeviceCommunicator, DeviceConnectionHandler, DeviceMessageHandler, ProtocolStatus};
pub use config::{load_device_feature_config, DeviceFeatureConfig};
pub use discovery::{DeviceAnnouncement, DiscoveryHook};
pub use error::DeviceError;
pub use kind::ProtocolKind;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hydrogen_message::{Message, QosLevel};
    use hydrogen_transport::{Communicator, ConnectionHandler, MessageHandler, StatsSnapshot, TransportError};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeCommunicator {
        connected: AtomicBool,
        sent: AtomicU32,
        fail_send: bool,
    }

    #[async_trait]
    impl Communicator for FakeCommunicator {
        async fn connect(&self) -> Result<(), TransportError> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn disconnect(&self) -> Result<(), TransportError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        async fn send_async(&self, _message: &Message) -> Result<(), TransportError> {
            if self.fail_send {
                return Err(TransportError::Send("forced failure".into()));
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn send_sync(&self, _message: &Message, _timeout: Duration) -> Result<Message, TransportError> {
            Err(TransportError::Unsupported("fake".into()))
        }
        fn on_message(&self, _handler: MessageHandler) {}
        fn on_connection_changed(&self, _handler: ConnectionHandler) {}
        fn stats(&self) -> StatsSnapshot {
            StatsSnapshot::default()
        }
        fn reset_stats(&self) {}
        fn set_qos(&self, _qos: QosLevel) {}
        fn set_compression(&self, _enabled: bool) {}
        fn set_encryption(&self, _enabled: bool) {}
    }

    fn sample_command() -> Message {
        Message::from_json(
            r#"{"messageId":"m1","deviceId":"dev-1","timestamp":"2026-01-01T00:00:00Z","messageType":"COMMAND","command":"PING"}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn send_to_unconfigured_protocol_errors_without_fallback() {
        let device = DeviceCommunicator::new("dev-1");
        let result = device.send(&sample_command(), ProtocolKind::Mqtt).await;
        assert!(matches!(result, Err(DeviceError::ProtocolNotActive(ProtocolKind::Mqtt))));
    }

    #[tokio::test]
    async fn broadcast_is_all_ok_only_when_every_transport_succeeds() {
        let device = DeviceCommunicator::new("dev-1");
        let ok = Arc::new(FakeCommunicator {
            connected: AtomicBool::new(true),
            sent: AtomicU32::new(0),
            fail_send: false,
        });
        let failing = Arc::new(FakeCommunicator {
            connected: AtomicBool::new(true),
            sent: AtomicU32::new(0),
            fail_send: true,
        });
        device.add_protocol(ProtocolKind::Tcp, ok.clone(), serde_json::json!({})).await;
        device.add_protocol(ProtocolKind::Mqtt, failing, serde_json::json!({})).await;

        let all_ok = device.broadcast(&sample_command()).await;
        assert!(!all_ok);
        assert_eq!(ok.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn active_protocols_reflects_connection_state() {
        let device = DeviceCommunicator::new("dev-1");
        let connected = Arc::new(FakeCommunicator {
            connected: AtomicBool::new(true),
            sent: AtomicU32::new(0),
            fail_send: false,
        });
        let disconnected = Arc::new(FakeCommunicator {
            connected: AtomicBool::new(false),
            sent: AtomicU32::new(0),
            fail_send: false,
        });
        device.add_protocol(ProtocolKind::Tcp, connected, serde_json::json!({})).await;
        device.add_protocol(ProtocolKind::Stdio, disconnected, serde_json::json!({})).await;

        let active = device.active_protocols().await;
        assert_eq!(active, vec![ProtocolKind::Tcp]);
    }
}
