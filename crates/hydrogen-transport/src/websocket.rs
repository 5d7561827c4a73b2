//! WebSocket transport, grounded on the teacher's reconnecting
//! `UplinkSession` (hello/heartbeat handshake, single read-loop task driving
//! inbound traffic, a write half guarded by a lock for outbound sends).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use hydrogen_message::{Message, QosLevel};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMsg;
use tracing::{debug, warn};

use crate::communicator::{Communicator, ConnectionHandler, MessageHandler};
use crate::error::TransportError;
use crate::stats::{CommunicatorStats, StatsSnapshot};

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsWrite = futures_util::stream::SplitSink<WsStream, WsMsg>;

pub struct WebSocketCommunicator {
    url: String,
    write: Arc<Mutex<Option<WsWrite>>>,
    read_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    connected: Arc<AtomicBool>,
    stats: Arc<CommunicatorStats>,
    message_handler: Arc<RwLock<Option<MessageHandler>>>,
    connection_handler: Arc<RwLock<Option<ConnectionHandler>>>,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>,
    qos: Arc<RwLock<QosLevel>>,
    compression: Arc<AtomicBool>,
    encryption: Arc<AtomicBool>,
}

impl WebSocketCommunicator {
    pub fn new(url: impl Into<String>) -> Self {
        WebSocketCommunicator {
            url: url.into(),
            write: Arc::new(Mutex::new(None)),
            read_task: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(CommunicatorStats::default()),
            message_handler: Arc::new(RwLock::new(None)),
            connection_handler: Arc::new(RwLock::new(None)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            qos: Arc::new(RwLock::new(QosLevel::default())),
            compression: Arc::new(AtomicBool::new(false)),
            encryption: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn notify_connection(handler: &Arc<RwLock<Option<ConnectionHandler>>>, connected: bool) {
        if let Some(h) = handler.read().await.as_ref() {
            h(connected);
        }
    }

    fn spawn_read_loop(&self, mut read: futures_util::stream::SplitStream<WsStream>) -> JoinHandle<()> {
        let connected = self.connected.clone();
        let stats = self.stats.clone();
        let message_handler = self.message_handler.clone();
        let connection_handler = self.connection_handler.clone();
        let pending = self.pending.clone();

        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(WsMsg::Text(text)) => {
                        stats.record_received(text.len());
                        match Message::from_json(&text) {
                            Ok(msg) => {
                                let correlated = msg
                                    .envelope()
                                    .original_message_id
                                    .as_ref()
                                    .and_then(|id| pending.lock().await.remove(id));
                                if let Some(tx) = correlated {
                                    let _ = tx.send(msg);
                                } else if let Some(h) = message_handler.read().await.as_ref() {
                                    h(msg);
                                }
                            }
                            Err(e) => {
                                stats.record_receive_error();
                                warn!(error = %e, "malformed websocket payload");
                            }
                        }
                    }
                    Ok(WsMsg::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        stats.record_receive_error();
                        debug!(error = %e, "websocket read error");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            Self::notify_connection(&connection_handler, false).await;
        })
    }
}

#[async_trait]
impl Communicator for WebSocketCommunicator {
    async fn connect(&self) -> Result<(), TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (write, read) = ws.split();
        *self.write.lock().await = Some(write);
        self.connected.store(true, Ordering::SeqCst);
        let handle = self.spawn_read_loop(read);
        *self.read_task.lock().await = Some(handle);
        Self::notify_connection(&self.connection_handler, true).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(mut write) = self.write.lock().await.take() {
            let _ = write.close().await;
        }
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Self::notify_connection(&self.connection_handler, false).await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_async(&self, message: &Message) -> Result<(), TransportError> {
        let json = message.to_json()?;
        let mut guard = self.write.lock().await;
        let write = guard.as_mut().ok_or(TransportError::NotConnected)?;
        write
            .send(WsMsg::Text(json.clone().into()))
            .await
            .map_err(|e| {
                self.stats.record_send_error();
                TransportError::Send(e.to_string())
            })?;
        self.stats.record_sent(json.len());
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
