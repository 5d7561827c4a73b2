//! The FIFO session state machine: connect/reconnect, framed read loop,
//! bounded inbound queue with drop-oldest backpressure (spec §4.9).

use std::collections::VecDeque;
use std::os::unix::fs::OpenOptionsExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hydrogen_message::Message;
use tokio::fs::File;
use tokio::io::{split, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{FifoConfig, FramingMode, PipeType};
use crate::error::FifoError;
use crate::framing::{write_frame, FrameReader};
use crate::stats::{FifoStats, FifoStatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// One open FIFO endpoint, read and written as framed Hydrogen messages.
pub struct FifoSession {
    config: Arc<RwLock<FifoConfig>>,
    state: Arc<RwLock<ConnectionState>>,
    stats: Arc<FifoStats>,
    write_half: Arc<Mutex<Option<WriteHalf<File>>>>,
    read_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    inbound: Arc<Mutex<VecDeque<Message>>>,
    inbound_notify: Arc<Notify>,
    message_handler: Arc<RwLock<Option<MessageHandler>>>,
    bidirectional: Arc<AtomicBool>,
    multiplexing: Arc<AtomicBool>,
}

impl FifoSession {
    pub fn new(config: FifoConfig) -> Self {
        FifoSession {
            config: Arc::new(RwLock::new(config)),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            stats: Arc::new(FifoStats::default()),
            write_half: Arc::new(Mutex::new(None)),
            read_task: Arc::new(Mutex::new(None)),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            inbound_notify: Arc::new(Notify::new()),
            message_handler: Arc::new(RwLock::new(None)),
            bidirectional: Arc::new(AtomicBool::new(false)),
            multiplexing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn on_message(&self, handler: MessageHandler) {
        let slot = self.message_handler.clone();
        tokio::spawn(async move {
            *slot.write().await = Some(handler);
        });
    }

    pub fn enable_bidirectional(&self, enabled: bool) {
        self.bidirectional.store(enabled, Ordering::SeqCst);
    }

    pub fn enable_multiplexing(&self, enabled: bool) {
        self.multiplexing.store(enabled, Ordering::SeqCst);
    }

    /// No multi-client fan-out at this layer yet (server-side multiplexing
    /// is the job of `hydrogen-server`); always empty until that wiring
    /// lands, matching `enableMultiplexing` being off by default.
    pub fn connected_clients(&self) -> Vec<String> {
        Vec::new()
    }

    pub async fn update_config(&self, config: FifoConfig) {
        *self.config.write().await = config;
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn statistics(&self) -> FifoStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn is_healthy(&self) -> bool {
        let snap = self.stats.snapshot();
        let error_rate = if snap.messages_received + snap.messages_sent > 0 {
            snap.errors as f64 / (snap.messages_received + snap.messages_sent) as f64
        } else {
            0.0
        };
        *self.state.read().await == ConnectionState::Connected && error_rate < 0.1
    }

    pub async fn has_message(&self) -> bool {
        !self.inbound.lock().await.is_empty()
    }

    /// Pop the oldest queued inbound message, blocking (without a hard
    /// timeout here — callers wrap with `tokio::time::timeout` per
    /// `read_timeout`) until one arrives.
    pub async fn read_message(&self) -> Message {
        loop {
            if let Some(msg) = self.inbound.lock().await.pop_front() {
                return msg;
            }
            self.inbound_notify.notified().await;
        }
    }

    async fn open_pipe(config: &FifoConfig) -> Result<File, FifoError> {
        if config.pipe_type == PipeType::WindowsNamedPipe {
            // TODO: implement via tokio::net::windows::named_pipe when this
            // crate gains a Windows CI target.
            return Err(FifoError::Open("Windows named pipes are not yet implemented".into()));
        }

        let path = std::path::Path::new(&config.pipe_name);
        if !path.exists() {
            nix::unistd::mkfifo(path, nix::sys::stat::Mode::from_bits_truncate(0o600))
                .map_err(|e| FifoError::Open(format!("mkfifo failed: {e}")))?;
        }

        // O_RDWR never blocks on a FIFO even with no peer present yet,
        // unlike O_RDONLY/O_WRONLY which wait for the other end.
        let std_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::fcntl::OFlag::O_NONBLOCK.bits())
            .open(path)
            .map_err(|e| FifoError::Open(e.to_string()))?;
        Ok(File::from_std(std_file))
    }

    pub async fn connect(&self) -> Result<(), FifoError> {
        *self.state.write().await = ConnectionState::Connecting;
        let config = self.config.read().await.clone();

        let file = tokio::time::timeout(config.connect_timeout, Self::open_pipe(&config))
            .await
            .map_err(|_| FifoError::Open("connect timed out".into()))??;

        let (read_half, write_half) = split(file);
        *self.write_half.lock().await = Some(write_half);
        *self.state.write().await = ConnectionState::Connected;

        let handle = self.spawn_read_loop(read_half, config);
        *self.read_task.lock().await = Some(handle);
        Ok(())
    }

    fn spawn_read_loop(&self, read_half: ReadHalf<File>, config: FifoConfig) -> JoinHandle<()> {
        let stats = self.stats.clone();
        let inbound = self.inbound.clone();
        let inbound_notify = self.inbound_notify.clone();
        let message_handler = self.message_handler.clone();
        let state = self.state.clone();
        let config_slot = self.config.clone();
        let write_half = self.write_half.clone();

        tokio::spawn(async move {
            let mut read_half = read_half;
            let mut attempts = 0u32;
            loop {
                let mut framer = FrameReader::new(config.max_message_size);
                loop {
                    match framer
                        .next_frame(&mut read_half, config.framing_mode, &config.custom_delimiter)
                        .await
                    {
                        Ok(Some(bytes)) => {
                            stats.record_received(bytes.len());
                            let text = String::from_utf8_lossy(&bytes);
                            match Message::from_json(&text) {
                                Ok(msg) => {
                                    let mut q = inbound.lock().await;
                                    if q.len() >= config.max_queue_size {
                                        q.pop_front();
                                        stats.record_error();
                                    }
                                    q.push_back(msg.clone());
                                    drop(q);
                                    inbound_notify.notify_one();
                                    if let Some(h) = message_handler.read().await.as_ref() {
                                        h(msg);
                                    }
                                }
                                Err(e) => {
                                    stats.record_error();
                                    warn!(error = %e, "malformed fifo payload");
                                }
                            }
                        }
                        Ok(None) => break, // EOF: peer closed their end.
                        Err(e) => {
                            stats.record_error();
                            warn!(error = %e, "fifo framing error");
                            break;
                        }
                    }
                }

                if !config.enable_auto_reconnect {
                    *state.write().await = ConnectionState::Error;
                    return;
                }
                *state.write().await = ConnectionState::Reconnecting;
                attempts += 1;
                if attempts > config.max_reconnect_attempts {
                    *state.write().await = ConnectionState::Error;
                    return;
                }
                tokio::time::sleep(config.reconnect_delay).await;

                let current = config_slot.read().await.clone();
                match FifoSession::open_pipe(&current).await {
                    Ok(file) => {
                        let (new_read, new_write) = split(file);
                        *write_half.lock().await = Some(new_write);
                        read_half = new_read;
                        *state.write().await = ConnectionState::Connected;
                        attempts = 0;
                        info!(pipe = %current.pipe_name, "fifo reconnected");
                    }
                    Err(e) => {
                        debug!(error = %e, "fifo reconnect attempt failed");
                        continue;
                    }
                }
            }
        })
    }

    pub async fn disconnect(&self) -> Result<(), FifoError> {
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
        }
        *self.write_half.lock().await = None;
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    pub async fn reconnect(&self) -> Result<(), FifoError> {
        self.disconnect().await?;
        self.connect().await
    }

    pub async fn send_message(&self, message: &Message) -> Result<(), FifoError> {
        let config = self.config.read().await;
        let json = message.to_json()?;
        let mut guard = self.write_half.lock().await;
        let write_half = guard.as_mut().ok_or(FifoError::NotConnected)?;
        tokio::time::timeout(
            config.write_timeout,
            write_frame(write_half, config.framing_mode, &config.custom_delimiter, json.as_bytes()),
        )
        .await
        .map_err(|_| FifoError::Framing("write timed out".into()))??;
        self.stats.record_sent(json.len());
        Ok(())
    }
}
