//! Connection-plane statistics (spec §4.7 `getStatistics()`, §6.6 persisted
//! snapshot), tracked with atomics so hot paths never take a lock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub total_clients_connected: u64,
    pub current_active_clients: usize,
    pub total_messages_processed: u64,
    pub total_bytes_transferred: u64,
    pub total_errors: u64,
    pub uptime_ms: u64,
}

#[derive(Debug)]
pub struct ServerStatistics {
    started_at: Instant,
    total_clients_connected: AtomicU64,
    current_active_clients: AtomicUsize,
    total_messages_processed: AtomicU64,
    total_bytes_transferred: AtomicU64,
    total_errors: AtomicU64,
}

impl ServerStatistics {
    pub fn new() -> Self {
        ServerStatistics {
            started_at: Instant::now(),
            total_clients_connected: AtomicU64::new(0),
            current_active_clients: AtomicUsize::new(0),
            total_messages_processed: AtomicU64::new(0),
            total_bytes_transferred: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
        }
    }

    pub fn record_client_connected(&self) {
        self.total_clients_connected.fetch_add(1, Ordering::Relaxed);
        self.current_active_clients.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_client_disconnected(&self) {
        self.current_active_clients.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_message(&self, bytes: u64) {
        self.total_messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_transferred.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total_clients_connected: self.total_clients_connected.load(Ordering::Relaxed),
            current_active_clients: self.current_active_clients.load(Ordering::Relaxed),
            total_messages_processed: self.total_messages_processed.load(Ordering::Relaxed),
            total_bytes_transferred: self.total_bytes_transferred.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            uptime_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for ServerStatistics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_activity() {
        let stats = ServerStatistics::new();
        stats.record_client_connected();
        stats.record_client_connected();
        stats.record_client_disconnected();
        stats.record_message(128);
        stats.record_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_clients_connected, 2);
        assert_eq!(snapshot.current_active_clients, 1);
        assert_eq!(snapshot.total_messages_processed, 1);
        assert_eq!(snapshot.total_bytes_transferred, 128);
        assert_eq!(snapshot.total_errors, 1);
    }
}
