//! STDIO transport: line-buffered JSON over the process's own stdin/stdout,
//! for devices driven as a child process (spec §4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hydrogen_message::{Message, QosLevel};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::communicator::{Communicator, ConnectionHandler, MessageHandler};
use crate::error::TransportError;
use crate::stats::{CommunicatorStats, StatsSnapshot};

/// STDIO has no request/response correlation of its own and no dedicated
/// connect/disconnect handshake — `connect()`/`disconnect()` only start or
/// stop the background read loop.
pub struct StdioCommunicator {
    terminator: u8,
    stdout: Arc<Mutex<tokio::io::Stdout>>,
    read_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    connected: Arc<AtomicBool>,
    stats: Arc<CommunicatorStats>,
    message_handler: Arc<RwLock<Option<MessageHandler>>>,
    connection_handler: Arc<RwLock<Option<ConnectionHandler>>>,
    qos: Arc<RwLock<QosLevel>>,
    compression: Arc<AtomicBool>,
    encryption: Arc<AtomicBool>,
}

impl Default for StdioCommunicator {
    fn default() -> Self {
        Self::new(b'\n')
    }
}

impl StdioCommunicator {
    pub fn new(terminator: u8) -> Self {
        StdioCommunicator {
            terminator,
            stdout: Arc::new(Mutex::new(tokio::io::stdout())),
            read_task: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(CommunicatorStats::default()),
            message_handler: Arc::new(RwLock::new(None)),
            connection_handler: Arc::new(RwLock::new(None)),
            qos: Arc::new(RwLock::new(QosLevel::default())),
            compression: Arc::new(AtomicBool::new(false)),
            encryption: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Non-blocking probe for whether stdin currently has a complete buffered
    /// line available, per spec's `hasInput()` operation. Best-effort: always
    /// `true` once the read loop is running, since availability is pushed to
    /// `on_message` rather than polled.
    pub fn has_input(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Communicator for StdioCommunicator {
    async fn connect(&self) -> Result<(), TransportError> {
        let terminator = self.terminator;
        let stats = self.stats.clone();
        let message_handler = self.message_handler.clone();
        let connection_handler = self.connection_handler.clone();
        let connected = self.connected.clone();

        let handle = tokio::spawn(async move {
            let mut reader = BufReader::new(tokio::io::stdin());
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(terminator, &mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        while buf.last() == Some(&terminator) || buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                        let text = String::from_utf8_lossy(&buf);
                        stats.record_received(text.len());
                        match Message::from_json(&text) {
                            Ok(msg) => {
                                if let Some(h) = message_handler.read().await.as_ref() {
                                    h(msg);
                                }
                            }
                            Err(e) => {
                                stats.record_receive_error();
                                warn!(error = %e, "malformed stdio payload");
                            }
                        }
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            if let Some(h) = connection_handler.read().await.as_ref() {
                h(false);
            }
        });

        *self.read_task.lock().await = Some(handle);
        self.connected.store(true, Ordering::SeqCst);
        if let Some(h) = self.connection_handler.read().await.as_ref() {
            h(true);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_async(&self, message: &Message) -> Result<(), TransportError> {
        let json = message.to_json()?;
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(json.as_bytes()).await.map_err(|e| {
            self.stats.record_send_error();
            TransportError::Send(e.to_string())
        })?;
        stdout.write_all(&[self.terminator]).await.ok();
        stdout.flush().await.ok();
        self.stats.record_sent(json.len());
        Ok(())
    }

    async fn send_sync(&self, _message: &Message, _timeout: Duration) -> Result<Message, TransportError> {
        Err(TransportError::Unsupported(
            "STDIO has no built-in request/response correlation".into(),
        ))
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
