//! FIFO session statistics (spec §4.9 "Statistics").

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct FifoStats {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_transferred: AtomicU64,
    errors: AtomicU64,
    started_at: Instant,
}

impl Default for FifoStats {
    fn default() -> Self {
        FifoStats {
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FifoStatsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_transferred: u64,
    pub errors: u64,
    pub messages_per_second: f64,
    pub bytes_per_second: f64,
    pub uptime_ms: u64,
}

impl FifoStats {
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_transferred.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> FifoStatsSnapshot {
        let uptime = self.started_at.elapsed();
        let uptime_secs = uptime.as_secs_f64().max(f64::EPSILON);
        let sent = self.messages_sent.load(Ordering::Relaxed);
        let received = self.messages_received.load(Ordering::Relaxed);
        let bytes = self.bytes_transferred.load(Ordering::Relaxed);
        FifoStatsSnapshot {
            messages_sent: sent,
            messages_received: received,
            bytes_transferred: bytes,
            errors: self.errors.load(Ordering::Relaxed),
            messages_per_second: (sent + received) as f64 / uptime_secs,
            bytes_per_second: bytes as f64 / uptime_secs,
            uptime_ms: uptime.as_millis() as u64,
        }
    }
}
