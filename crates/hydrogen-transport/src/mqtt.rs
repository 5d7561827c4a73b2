//! MQTT transport via `rumqttc` (spec §4.4). No direct precedent in the
//! example pack for an MQTT client crate — `rumqttc` is the idiomatic
//! tokio-native choice (see `DESIGN.md`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hydrogen_message::{to_internal, to_protocol, Format, Message, ProtocolPayload, QosLevel};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::communicator::{Communicator, ConnectionHandler, MessageHandler};
use crate::error::TransportError;
use crate::stats::{CommunicatorStats, StatsSnapshot};

pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Topic prefix messages are published under and subscribed from
    /// (`<prefix>/+`), matching `hydrogen_message::transformer::to_protocol`.
    pub topic_prefix: String,
    pub keep_alive: Duration,
}

fn to_rumqttc_qos(qos: QosLevel) -> QoS {
    match qos {
        QosLevel::AtMostOnce => QoS::AtMostOnce,
        QosLevel::AtLeastOnce => QoS::AtLeastOnce,
        // Native QoS 2 passthrough — see SPEC_FULL.md Open Question 1.
        QosLevel::ExactlyOnce => QoS::ExactlyOnce,
    }
}

pub struct MqttCommunicator {
    config: MqttConfig,
    client: Arc<Mutex<Option<AsyncClient>>>,
    poll_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    connected: Arc<AtomicBool>,
    stats: Arc<CommunicatorStats>,
    message_handler: Arc<RwLock<Option<MessageHandler>>>,
    connection_handler: Arc<RwLock<Option<ConnectionHandler>>>,
    pending: Arc<Mutex<std::collections::HashMap<String, oneshot::Sender<Message>>>>,
    qos: Arc<RwLock<QosLevel>>,
    compression: Arc<AtomicBool>,
    encryption: Arc<AtomicBool>,
}

impl MqttCommunicator {
    pub fn new(config: MqttConfig) -> Self {
        MqttCommunicator {
            config,
            client: Arc::new(Mutex::new(None)),
            poll_task: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(CommunicatorStats::default()),
            message_handler: Arc::new(RwLock::new(None)),
            connection_handler: Arc::new(RwLock::new(None)),
            pending: Arc::new(Mutex::new(std::collections::HashMap::new())),
            qos: Arc::new(RwLock::new(QosLevel::default())),
            compression: Arc::new(AtomicBool::new(false)),
            encryption: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl Communicator for MqttCommunicator {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut opts = MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        opts.set_keep_alive(self.config.keep_alive);

        let (client, mut eventloop) = AsyncClient::new(opts, 64);
        let sub_filter = format!("{}/+", self.config.topic_prefix);
        client
            .subscribe(&sub_filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        *self.client.lock().await = Some(client);
        self.connected.store(true, Ordering::SeqCst);
        if let Some(h) = self.connection_handler.read().await.as_ref() {
            h(true);
        }

        let stats = self.stats.clone();
        let message_handler = self.message_handler.clone();
        let connection_handler = self.connection_handler.clone();
        let pending = self.pending.clone();
        let connected = self.connected.clone();

        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = ProtocolPayload::Mqtt {
                            topic: publish.topic.clone(),
                            payload: publish.payload.to_vec(),
                        };
                        stats.record_received(publish.payload.len());
                        match to_internal(&payload, Format::Mqtt) {
                            Ok(msg) => {
                                let correlated = msg
                                    .envelope()
                                    .original_message_id
                                    .as_ref()
                                    .and_then(|id| pending.lock().await.remove(id));
                                match correlated {
                                    Some(tx) => {
                                        let _ = tx.send(msg);
                                    }
                                    None => {
                                        if let Some(h) = message_handler.read().await.as_ref() {
                                            h(msg);
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                stats.record_receive_error();
                                warn!(error = %e, "malformed mqtt payload");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt event loop error");
                        connected.store(false, Ordering::SeqCst);
                        if let Some(h) = connection_handler.read().await.as_ref() {
                            h(false);
                        }
                        break;
                    }
                }
            }
        });
        *self.poll_task.lock().await = Some(handle);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(client) = self.client.lock().await.take() {
            let _ = client.disconnect().await;
        }
        if let Some(handle) = self.poll_task.lock().await.take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_async(&self, message: &Message) -> Result<(), TransportError> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or(TransportError::NotConnected)?;
        let payload = to_protocol(message, Format::Mqtt, &self.config.topic_prefix)?;
        let ProtocolPayload::Mqtt { topic, payload } = payload else {
            unreachable!("to_protocol(.., Format::Mqtt) always returns ProtocolPayload::Mqtt")
        };
        let qos = to_rumqttc_qos(*self.qos.read().await);
        client
            .publish(&topic, qos, false, payload.clone())
            .await
            .map_err(|e| {
                self.stats.record_send_error();
                TransportError::Send(e.to_string())
            })?;
        self.stats.record_sent(payload.len());
        Ok(())
    }

    async fn send_sync(&self, message: &Message, timeout: Duration) -> Result<Message, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .await
            .insert(message.envelope().message_id.clone(), tx);
        if let Err(e) = self.send_async(message).await {
            self.pending.lock().await.remove(&message.envelope().message_id);
            return Err(e);
        }
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::Receive("response channel closed".into())),
            Err(_) => {
                self.pending.lock().await.remove(&message.envelope().message_id);
                Err(TransportError::Timeout)
            }
        }
    }

    fn on_message(&self, handler: MessageHandler) {
        let slot = self.message_handler.clone();
        tokio::spawn(async move {
            *slot.write().await = Some(handler);
        });
    }

    fn on_connection_changed(&self, handler: ConnectionHandler) {
        let slot = self.connection_handler.clone();
        tokio::spawn(async move {
            *slot.write().await = Some(handler);
        });
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn reset_stats(&self) {
        self.stats.reset();
    }

    fn set_qos(&self, qos: QosLevel) {
        let slot = self.qos.clone();
        tokio::spawn(async move {
            *slot.write().await = qos;
        });
    }

    fn set_compression(&self, enabled: bool) {
        self.compression.store(enabled, Ordering::SeqCst);
    }

    fn set_encryption(&self, enabled: bool) {
        self.encryption.store(enabled, Ordering::SeqCst);
    }
}
