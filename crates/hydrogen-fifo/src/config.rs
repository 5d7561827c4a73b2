//! FIFO session configuration (spec §4.9).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeType {
    UnixFifo,
    WindowsNamedPipe,
}

/// Where a message boundary falls, per spec §4.9 "Framing semantics".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    Newline,
    JsonLines,
    LengthPrefixed,
    CustomDelimiter,
    NullTerminated,
}

#[derive(Debug, Clone)]
pub struct FifoConfig {
    pub pipe_name: String,
    pub pipe_type: PipeType,
    pub framing_mode: FramingMode,
    /// Required when `framing_mode == CustomDelimiter`.
    pub custom_delimiter: Vec<u8>,
    pub buffer_size: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_message_size: usize,
    pub max_queue_size: usize,
    pub enable_auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub enable_performance_metrics: bool,
    pub enable_debug_logging: bool,
}

impl Default for FifoConfig {
    fn default() -> Self {
        FifoConfig {
            pipe_name: String::new(),
            pipe_type: PipeType::UnixFifo,
            framing_mode: FramingMode::Newline,
            custom_delimiter: Vec::new(),
            buffer_size: 64 * 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_message_size: 1024 * 1024,
            max_queue_size: 1000,
            enable_auto_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(500),
            enable_performance_metrics: true,
            enable_debug_logging: false,
        }
    }
}
