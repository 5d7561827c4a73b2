//! gRPC transport via `tonic`/`prost`, grounded on
//! `inference-grpc`'s optional-protoc `build.rs` and modular service layout
//! in the example pack (this repo's teacher has no gRPC surface of its own).
//!
//! Implements the uniform [`Communicator`] contract over the unary
//! `SendCommand` RPC, plus two inherent methods — [`GrpcCommunicator::subscribe_events`]
//! and [`GrpcCommunicator::open_duplex`] — for the server-streaming and
//! bidirectional-streaming modes spec §4.4.1 calls for, which have no
//! equivalent in the request/response `Communicator` trait.

#[allow(clippy::all)]
mod hydrogen {
    include!(concat!(env!("CARGO_MANIFEST_DIR"), "/src/proto/hydrogen.rs"));
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hydrogen_message::{Message, QosLevel};
use tokio::sync::{Mutex, RwLock};
use tokio_stream::StreamExt;
use tonic::transport::Channel;
use tonic::Request;
use tracing::warn;

use self::hydrogen::hydrogen_gateway_client::HydrogenGatewayClient;
use self::hydrogen::Envelope as WireEnvelope;

use crate::communicator::{Communicator, ConnectionHandler, MessageHandler};
use crate::error::TransportError;
use crate::stats::{CommunicatorStats, StatsSnapshot};

pub struct GrpcCommunicator {
    url: String,
    client: Arc<Mutex<Option<HydrogenGatewayClient<Channel>>>>,
    connected: Arc<AtomicBool>,
    stats: Arc<CommunicatorStats>,
    message_handler: Arc<RwLock<Option<MessageHandler>>>,
    connection_handler: Arc<RwLock<Option<ConnectionHandler>>>,
    qos: Arc<RwLock<QosLevel>>,
    compression: Arc<AtomicBool>,
    encryption: Arc<AtomicBool>,
}

impl GrpcCommunicator {
    pub fn new(url: impl Into<String>) -> Self {
        GrpcCommunicator {
            url: url.into(),
            client: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(CommunicatorStats::default()),
            message_handler: Arc::new(RwLock::new(None)),
            connection_handler: Arc::new(RwLock::new(None)),
            qos: Arc::new(RwLock::new(QosLevel::default())),
            compression: Arc::new(AtomicBool::new(false)),
            encryption: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Server-streaming mode: send one request envelope, then spawn a task
    /// feeding every streamed event to the registered message handler.
    pub async fn subscribe_events(&self, request: &Message) -> Result<(), TransportError> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(TransportError::NotConnected)?;
        let json = request.to_json()?;
        let mut stream = client
            .stream_events(Request::new(WireEnvelope { json_payload: json }))
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?
            .into_inner();

        let stats = self.stats.clone();
        let message_handler = self.message_handler.clone();
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(envelope) => {
                        stats.record_received(envelope.json_payload.len());
                        match Message::from_json(&envelope.json_payload) {
                            Ok(msg) => {
                                if let Some(h) = message_handler.read().await.as_ref() {
                                    h(msg);
                                }
                            }
                            Err(e) => {
                                stats.record_receive_error();
                                warn!(error = %e, "malformed grpc event payload");
                            }
                        }
                    }
                    Err(status) => {
                        warn!(error = %status, "grpc event stream error");
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    /// Bidirectional-streaming mode: `outbound` is forwarded to the server
    /// as it arrives; inbound frames are delivered to the message handler.
    pub async fn open_duplex(
        &self,
        mut outbound: tokio::sync::mpsc::Receiver<Message>,
    ) -> Result<(), TransportError> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let request_stream = async_stream::stream! {
            while let Some(msg) = outbound.recv().await {
                if let Ok(json) = msg.to_json() {
                    yield WireEnvelope { json_payload: json };
                }
            }
        };

        let mut response_stream = client
            .duplex(Request::new(request_stream))
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?
            .into_inner();

        let stats = self.stats.clone();
        let message_handler = self.message_handler.clone();
        tokio::spawn(async move {
            while let Some(item) = response_stream.next().await {
                match item {
                    Ok(envelope) => {
                        stats.record_received(envelope.json_payload.len());
                        if let Ok(msg) = Message::from_json(&envelope.json_payload) {
                            if let Some(h) = message_handler.read().await.as_ref() {
                                h(msg);
                            }
                        }
                    }
                    Err(status) => {
                        warn!(error = %status, "grpc duplex stream error");
                        break;
                    }
                }
            }
        });
        Ok(())
    }
}

#[async_trait]
impl Communicator for GrpcCommunicator {
    async fn connect(&self) -> Result<(), TransportError> {
        let client = HydrogenGatewayClient::connect(self.url.clone())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        *self.client.lock().await = Some(client);
        self.connected.store(true, Ordering::SeqCst);
        if let Some(h) = self.connection_handler.read().await.as_ref() {
            h(true);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        *self.client.lock().await = None;
        self.connected.store(false, Ordering::SeqCst);
        if let Some(h) = self.connection_handler.read().await.as_ref() {
            h(false);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_async(&self, message: &Message) -> Result<(), TransportError> {
        let _ = self.send_sync(message, Duration::from_secs(30)).await?;
        Ok(())
    }

    async fn send_sync(&self, message: &Message, timeout: Duration) -> Result<Message, TransportError> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(TransportError::NotConnected)?;
        let json = message.to_json()?;
        let byte_len = json.len();

        let mut request = Request::new(WireEnvelope { json_payload: json });
        request.set_timeout(timeout);

        let response = client.send_command(request).await.map_err(|e| {
            self.stats.record_send_error();
            TransportError::Send(e.to_string())
        })?;
        self.stats.record_sent(byte_len);

        let envelope = response.into_inner();
        self.stats.record_received(envelope.json_payload.len());
        Ok(Message::from_json(&envelope.json_payload)?)
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
