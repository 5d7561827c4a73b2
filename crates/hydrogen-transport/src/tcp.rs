//! Raw TCP transport: a reconnecting client mode plus an optional fan-out
//! server mode, grounded on the teacher's `local_fanout::FanoutServer`
//! (broadcast channel feeding one writer task per consumer).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hydrogen_message::{Message, QosLevel};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::communicator::{Communicator, ConnectionHandler, MessageHandler};
use crate::error::TransportError;
use crate::stats::{CommunicatorStats, StatsSnapshot};

/// How message boundaries are delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON message per LF-terminated line.
    Newline,
    /// 4-byte big-endian length prefix followed by the JSON payload.
    LengthPrefixed,
}

async fn write_frame<W: AsyncWriteExt + Unpin>(w: &mut W, framing: Framing, json: &str) -> std::io::Result<()> {
    match framing {
        Framing::Newline => {
            w.write_all(json.as_bytes()).await?;
            w.write_all(b"\n").await
        }
        Framing::LengthPrefixed => {
            let len = (json.len() as u32).to_be_bytes();
            w.write_all(&len).await?;
            w.write_all(json.as_bytes()).await
        }
    }
}

async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut BufReader<R>,
    framing: Framing,
) -> std::io::Result<Option<String>> {
    match framing {
        Framing::Newline => {
            let mut line = String::new();
            let n = tokio::io::AsyncBufReadExt::read_line(reader, &mut line).await?;
            if n == 0 {
                return Ok(None);
            }
            Ok(Some(line.trim_end_matches(['\n', '\r']).to_owned()))
        }
        Framing::LengthPrefixed => {
            let mut len_buf = [0u8; 4];
            if reader.read_exact(&mut len_buf).await.is_err() {
                return Ok(None);
            }
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
        }
    }
}

enum Role {
    Client { addr: String },
    Server { bind_addr: String },
}

type PendingMap = HashMap<String, oneshot::Sender<Message>>;

pub struct TcpCommunicator {
    role: Role,
    framing: Framing,
    keep_alive: Option<Duration>,
    write: Arc<Mutex<Option<WriteHalf<TcpStream>>>>,
    broadcast_tx: Arc<Mutex<Option<broadcast::Sender<String>>>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    connected: Arc<AtomicBool>,
    stats: Arc<CommunicatorStats>,
    message_handler: Arc<RwLock<Option<MessageHandler>>>,
    connection_handler: Arc<RwLock<Option<ConnectionHandler>>>,
    pending: Arc<Mutex<PendingMap>>,
    qos: Arc<RwLock<QosLevel>>,
    compression: Arc<AtomicBool>,
    encryption: Arc<AtomicBool>,
}

impl TcpCommunicator {
    pub fn client(addr: impl Into<String>, framing: Framing, keep_alive: Option<Duration>) -> Self {
        TcpCommunicator::new(Role::Client { addr: addr.into() }, framing, keep_alive)
    }

    pub fn server(bind_addr: impl Into<String>, framing: Framing) -> Self {
        TcpCommunicator::new(Role::Server { bind_addr: bind_addr.into() }, framing, None)
    }

    fn new(role: Role, framing: Framing, keep_alive: Option<Duration>) -> Self {
        TcpCommunicator {
            role,
            framing,
            keep_alive,
            write: Arc::new(Mutex::new(None)),
            broadcast_tx: Arc::new(Mutex::new(None)),
            tasks: Arc::new(Mutex::new(Vec::new())),
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

    async fn dispatch_inbound(
        json: &str,
        stats: &CommunicatorStats,
        pending: &Arc<Mutex<PendingMap>>,
        message_handler: &Arc<RwLock<Option<MessageHandler>>>,
    ) {
        stats.record_received(json.len());
        match Message::from_json(json) {
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
                warn!(error = %e, "malformed tcp payload");
            }
        }
    }

    fn spawn_client_read_loop(&self, read_half: ReadHalf<TcpStream>) -> JoinHandle<()> {
        let framing = self.framing;
        let stats = self.stats.clone();
        let pending = self.pending.clone();
        let message_handler = self.message_handler.clone();
        let connection_handler = self.connection_handler.clone();
        let connected = self.connected.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match read_frame(&mut reader, framing).await {
                    Ok(Some(json)) => {
                        Self::dispatch_inbound(&json, &stats, &pending, &message_handler).await;
                    }
                    Ok(None) | Err(_) => break,
                }
            }
            connected.store(false, Ordering::SeqCst);
            if let Some(h) = connection_handler.read().await.as_ref() {
                h(false);
            }
        })
    }
}

#[async_trait]
impl Communicator for TcpCommunicator {
    async fn connect(&self) -> Result<(), TransportError> {
        match &self.role {
            Role::Client { addr } => {
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(|e| TransportError::Connect(e.to_string()))?;
                if self.keep_alive.is_some() {
                    let _ = stream.set_nodelay(true);
                }
                let (read_half, write_half) = tokio::io::split(stream);
                *self.write.lock().await = Some(write_half);
                self.connected.store(true, Ordering::SeqCst);
                let handle = self.spawn_client_read_loop(read_half);
                self.tasks.lock().await.push(handle);
                if let Some(h) = self.connection_handler.read().await.as_ref() {
                    h(true);
                }
                Ok(())
            }
            Role::Server { bind_addr } => {
                let listener = TcpListener::bind(bind_addr)
                    .await
                    .map_err(|e| TransportError::Connect(e.to_string()))?;
                let (tx, _rx) = broadcast::channel::<String>(256);
                *self.broadcast_tx.lock().await = Some(tx.clone());
                self.connected.store(true, Ordering::SeqCst);

                let framing = self.framing;
                let stats = self.stats.clone();
                let pending = self.pending.clone();
                let message_handler = self.message_handler.clone();

                let accept_handle = tokio::spawn(async move {
                    loop {
                        let Ok((stream, _peer)) = listener.accept().await else {
                            break;
                        };
                        let (read_half, write_half) = tokio::io::split(stream);
                        let mut rx = tx.subscribe();
                        let mut write_half = write_half;
                        tokio::spawn(async move {
                            while let Ok(json) = rx.recv().await {
                                if write_frame(&mut write_half, framing, &json).await.is_err() {
                                    break;
                                }
                            }
                        });

                        let stats = stats.clone();
                        let pending = pending.clone();
                        let message_handler = message_handler.clone();
                        tokio::spawn(async move {
                            let mut reader = BufReader::new(read_half);
                            while let Ok(Some(json)) = read_frame(&mut reader, framing).await {
                                TcpCommunicator::dispatch_inbound(&json, &stats, &pending, &message_handler).await;
                            }
                        });
                    }
                });
                self.tasks.lock().await.push(accept_handle);
                Ok(())
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(mut w) = self.write.lock().await.take() {
            let _ = w.shutdown().await;
        }
        *self.broadcast_tx.lock().await = None;
        for t in self.tasks.lock().await.drain(..) {
            t.abort();
        }
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
        let json = message.to_json()?;
        if let Some(tx) = self.broadcast_tx.lock().await.as_ref() {
            let _ = tx.send(json.clone());
            self.stats.record_sent(json.len());
            return Ok(());
        }
        let mut guard = self.write.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
        write_frame(stream, self.framing, &json).await.map_err(|e| {
            self.stats.record_send_error();
            TransportError::Send(e.to_string())
        })?;
        self.stats.record_sent(json.len());
        Ok(())
    }

    async fn send_sync(&self, message: &Message, timeout: Duration) -> Result<Message, TransportError> {
        if self.broadcast_tx.lock().await.is_some() {
            return Err(TransportError::Unsupported(
                "send_sync is ambiguous in TCP server/fan-out mode".into(),
            ));
        }
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
