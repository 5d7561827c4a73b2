//! Client-side correlation / subscription plane (C6).

mod config;
mod correlator;
mod error;

pub use config::load_correlator_config;
pub use correlator::{
    Correlator, CorrelatorConfig, ConnectionCallback, EventCallback, PropertyCallback, ResponseCallback,
};
pub use error::CorrelatorError;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hydrogen_message::{Message, QosLevel};
    use hydrogen_transport::{Communicator, ConnectionHandler, MessageHandler, StatsSnapshot, TransportError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct LoopbackCommunicator {
        connected: AtomicBool,
        handler: Mutex<Option<MessageHandler>>,
        conn_handler: Mutex<Option<ConnectionHandler>>,
    }

    impl LoopbackCommunicator {
        fn new() -> Arc<Self> {
            Arc::new(LoopbackCommunicator {
                connected: AtomicBool::new(true),
                handler: Mutex::new(None),
                conn_handler: Mutex::new(None),
            })
        }

        fn deliver(&self, msg: Message) {
            if let Some(h) = self.handler.lock().unwrap().as_ref() {
                h(msg);
            }
        }
    }

    #[async_trait]
    impl Communicator for LoopbackCommunicator {
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
            Ok(())
        }
        async fn send_sync(&self, _message: &Message, _timeout: Duration) -> Result<Message, TransportError> {
            Err(TransportError::Unsupported("loopback".into()))
        }
        fn on_message(&self, handler: MessageHandler) {
            *self.handler.lock().unwrap() = Some(handler);
        }
        fn on_connection_changed(&self, handler: ConnectionHandler) {
            *self.conn_handler.lock().unwrap() = Some(handler);
        }
        fn stats(&self) -> StatsSnapshot {
            StatsSnapshot::default()
        }
        fn reset_stats(&self) {}
        fn set_qos(&self, _qos: QosLevel) {}
        fn set_compression(&self, _enabled: bool) {}
        fn set_encryption(&self, _enabled: bool) {}
    }

    fn command(id: &str) -> Message {
        Message::from_json(&format!(
            r#"{{"messageId":"{id}","deviceId":"dev-1","timestamp":"2026-01-01T00:00:00Z","messageType":"COMMAND","command":"PING"}}"#
        ))
        .unwrap()
    }

    fn response_to(original_id: &str) -> Message {
        Message::from_json(&format!(
            r#"{{"messageId":"r1","deviceId":"dev-1","timestamp":"2026-01-01T00:00:00Z","messageType":"RESPONSE","originalMessageId":"{original_id}","status":"SUCCESS"}}"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn send_completes_when_correlated_response_arrives() {
        let transport = LoopbackCommunicator::new();
        let correlator = Correlator::new(transport.clone(), CorrelatorConfig::default());
        let cmd = command("m1");

        let transport2 = transport.clone();
        let id = cmd.envelope().message_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            transport2.deliver(response_to(&id));
        });

        let result = correlator.send(&cmd, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn send_times_out_and_removes_slot() {
        let transport = LoopbackCommunicator::new();
        let correlator = Correlator::new(transport, CorrelatorConfig::default());
        let cmd = command("m2");
        let result = correlator.send(&cmd, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(CorrelatorError::Timeout)));
    }

    #[tokio::test]
    async fn event_subscription_receives_matching_events() {
        let transport = LoopbackCommunicator::new();
        let correlator = Correlator::new(transport.clone(), CorrelatorConfig::default());
        let received = Arc::new(AtomicBool::new(false));
        let received2 = received.clone();
        correlator
            .subscribe_event("dev-1", "TEMP_CHANGED", Arc::new(move |_msg| {
                received2.store(true, Ordering::SeqCst);
            }))
            .await;

        let event = Message::from_json(
            r#"{"messageId":"e1","deviceId":"dev-1","timestamp":"2026-01-01T00:00:00Z","messageType":"EVENT","event":"TEMP_CHANGED"}"#,
        )
        .unwrap();
        transport.deliver(event);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(received.load(Ordering::SeqCst));
    }
}
