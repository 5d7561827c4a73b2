//! ZeroMQ transport via the `zeromq` crate (spec §4.4). No direct precedent
//! in the example pack for a ZMQ crate — `zeromq` is the pure-Rust,
//! tokio-native choice (see `DESIGN.md`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hydrogen_message::{to_internal, to_protocol, Format, Message, ProtocolPayload, QosLevel};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;
use zeromq::{Socket, SocketRecv, SocketSend, ZmqMessage};

use crate::communicator::{Communicator, ConnectionHandler, MessageHandler};
use crate::error::TransportError;
use crate::stats::{CommunicatorStats, StatsSnapshot};

/// Which ZMQ socket pattern to open. Hydrogen devices speak request/reply
/// (`Dealer`/`Router`) or pub/sub (`Pub`/`Sub`) depending on deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Dealer,
    Router,
    Pub,
    Sub,
    Push,
    Pull,
}

pub struct ZmqConfig {
    pub kind: SocketKind,
    pub endpoint: String,
    pub bind: bool,
    /// SUB-only: topic prefixes to subscribe to (empty = subscribe to all).
    pub subscribe_filters: Vec<String>,
}

enum Inner {
    Dealer(zeromq::DealerSocket),
    Router(zeromq::RouterSocket),
    Pub(zeromq::PubSocket),
    Sub(zeromq::SubSocket),
    Push(zeromq::PushSocket),
    Pull(zeromq::PullSocket),
}

pub struct ZmqCommunicator {
    config: ZmqConfig,
    socket: Arc<Mutex<Option<Inner>>>,
    read_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    connected: Arc<AtomicBool>,
    stats: Arc<CommunicatorStats>,
    message_handler: Arc<RwLock<Option<MessageHandler>>>,
    connection_handler: Arc<RwLock<Option<ConnectionHandler>>>,
    pending: Arc<Mutex<std::collections::HashMap<String, oneshot::Sender<Message>>>>,
    qos: Arc<RwLock<QosLevel>>,
    compression: Arc<AtomicBool>,
    encryption: Arc<AtomicBool>,
}

fn frames_to_vecs(msg: ZmqMessage) -> Vec<Vec<u8>> {
    msg.into_vec().into_iter().map(|b| b.to_vec()).collect()
}

fn vecs_to_zmq_message(frames: Vec<Vec<u8>>) -> Result<ZmqMessage, TransportError> {
    let mut iter = frames.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| TransportError::Send("empty multipart frame".into()))?;
    let mut msg = ZmqMessage::from(first);
    for frame in iter {
        msg.push_back(frame.into());
    }
    Ok(msg)
}

impl ZmqCommunicator {
    pub fn new(config: ZmqConfig) -> Self {
        ZmqCommunicator {
            config,
            socket: Arc::new(Mutex::new(None)),
            read_task: Arc::new(Mutex::new(None)),
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

    fn dispatch(
        frames: Vec<Vec<u8>>,
        stats: &CommunicatorStats,
        pending: &Arc<Mutex<std::collections::HashMap<String, oneshot::Sender<Message>>>>,
        message_handler: &Arc<RwLock<Option<MessageHandler>>>,
        pending_rt: tokio::runtime::Handle,
    ) {
        let total: usize = frames.iter().map(Vec::len).sum();
        stats.record_received(total);
        let payload = ProtocolPayload::ZmqMultipart(frames);
        match to_internal(&payload, Format::Zmq) {
            Ok(msg) => {
                let pending = pending.clone();
                let message_handler = message_handler.clone();
                pending_rt.spawn(async move {
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
                });
            }
            Err(e) => {
                stats.record_receive_error();
                warn!(error = %e, "malformed zmq payload");
            }
        }
    }
}

#[async_trait]
impl Communicator for ZmqCommunicator {
    async fn connect(&self) -> Result<(), TransportError> {
        let mut inner = match self.config.kind {
            SocketKind::Dealer => Inner::Dealer(zeromq::DealerSocket::new()),
            SocketKind::Router => Inner::Router(zeromq::RouterSocket::new()),
            SocketKind::Pub => Inner::Pub(zeromq::PubSocket::new()),
            SocketKind::Sub => Inner::Sub(zeromq::SubSocket::new()),
            SocketKind::Push => Inner::Push(zeromq::PushSocket::new()),
            SocketKind::Pull => Inner::Pull(zeromq::PullSocket::new()),
        };

        macro_rules! open {
            ($sock:expr) => {
                if self.config.bind {
                    $sock.bind(&self.config.endpoint).await
                } else {
                    $sock.connect(&self.config.endpoint).await
                }
                .map_err(|e| TransportError::Connect(e.to_string()))?
            };
        }

        match &mut inner {
            Inner::Dealer(s) => {
                open!(s);
            }
            Inner::Router(s) => {
                open!(s);
            }
            Inner::Pub(s) => {
                open!(s);
            }
            Inner::Sub(s) => {
                open!(s);
                if self.config.subscribe_filters.is_empty() {
                    s.subscribe("").await.map_err(|e| TransportError::Connect(e.to_string()))?;
                } else {
                    for filter in &self.config.subscribe_filters {
                        s.subscribe(filter).await.map_err(|e| TransportError::Connect(e.to_string()))?;
                    }
                }
            }
            Inner::Push(s) => {
                open!(s);
            }
            Inner::Pull(s) => {
                open!(s);
            }
        }

        self.connected.store(true, Ordering::SeqCst);
        if let Some(h) = self.connection_handler.read().await.as_ref() {
            h(true);
        }

        let kind = self.config.kind;
        let stats = self.stats.clone();
        let pending = self.pending.clone();
        let message_handler = self.message_handler.clone();
        let connected = self.connected.clone();
        let connection_handler = self.connection_handler.clone();
        let rt_handle = tokio::runtime::Handle::current();

        *self.socket.lock().await = Some(inner);

        if matches!(kind, SocketKind::Pub | SocketKind::Push) {
            // Send-only sockets have no read loop.
            return Ok(());
        }

        let socket_slot = self.socket.clone();
        let handle = tokio::spawn(async move {
            loop {
                let recv_result = {
                    let mut guard = socket_slot.lock().await;
                    match guard.as_mut() {
                        Some(Inner::Dealer(s)) => s.recv().await,
                        Some(Inner::Router(s)) => s.recv().await,
                        Some(Inner::Sub(s)) => s.recv().await,
                        Some(Inner::Pull(s)) => s.recv().await,
                        _ => break,
                    }
                };
                match recv_result {
                    Ok(msg) => {
                        Self::dispatch(frames_to_vecs(msg), &stats, &pending, &message_handler, rt_handle.clone());
                    }
                    Err(e) => {
                        warn!(error = %e, "zmq recv error");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            if let Some(h) = connection_handler.read().await.as_ref() {
                h(false);
            }
        });
        *self.read_task.lock().await = Some(handle);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        *self.socket.lock().await = None;
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
        let payload = to_protocol(message, Format::Zmq, "")?;
        let ProtocolPayload::ZmqMultipart(frames) = payload else {
            unreachable!("to_protocol(.., Format::Zmq) always returns ProtocolPayload::ZmqMultipart")
        };
        let byte_len: usize = frames.iter().map(Vec::len).sum();
        let zmsg = vecs_to_zmq_message(frames)?;

        let mut guard = self.socket.lock().await;
        let result = match guard.as_mut() {
            Some(Inner::Dealer(s)) => s.send(zmsg).await,
            Some(Inner::Router(s)) => s.send(zmsg).await,
            Some(Inner::Pub(s)) => s.send(zmsg).await,
            Some(Inner::Push(s)) => s.send(zmsg).await,
            Some(Inner::Sub(_)) | Some(Inner::Pull(_)) => {
                return Err(TransportError::Unsupported(
                    "this ZMQ socket kind is receive-only".into(),
                ))
            }
            None => return Err(TransportError::NotConnected),
        };
        result.map_err(|e| {
            self.stats.record_send_error();
            TransportError::Send(e.to_string())
        })?;
        self.stats.record_sent(byte_len);
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
