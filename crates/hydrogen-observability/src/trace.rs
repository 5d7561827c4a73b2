//! Optional message-trace ring (spec §4.11), generalized from the teacher's
//! `rt-ui-log::UiLogger` broadcast-and-buffer pattern into the richer
//! per-message trace entry shape.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub message_id: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipe_path: Option<String>,
    pub direction: TraceDirection,
    pub size: usize,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    pub processing_time_ms: f64,
}

pub struct MessageTrace {
    capacity: usize,
    buffer: RwLock<VecDeque<TraceEntry>>,
    tx: broadcast::Sender<TraceEntry>,
}

impl MessageTrace {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(256.max(capacity.min(4096)));
        Arc::new(MessageTrace {
            capacity,
            buffer: RwLock::new(VecDeque::with_capacity(capacity)),
            tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEntry> {
        self.tx.subscribe()
    }

    pub async fn record(&self, entry: TraceEntry) {
        let mut buffer = self.buffer.write().await;
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(entry.clone());
        drop(buffer);
        let _ = self.tx.send(entry);
    }

    pub async fn snapshot(&self) -> Vec<TraceEntry> {
        self.buffer.read().await.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> TraceEntry {
        TraceEntry {
            message_id: id.into(),
            client_id: "c1".into(),
            pipe_path: None,
            direction: TraceDirection::Sent,
            size: 10,
            message_type: "COMMAND".into(),
            content: None,
            processing_time_ms: 0.5,
        }
    }

    #[tokio::test]
    async fn ring_drops_oldest_past_capacity() {
        let trace = MessageTrace::new(2);
        trace.record(entry("a")).await;
        trace.record(entry("b")).await;
        trace.record(entry("c")).await;
        let snap = trace.snapshot().await;
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].message_id, "b");
    }

    #[tokio::test]
    async fn subscribers_receive_recorded_entries() {
        let trace = MessageTrace::new(10);
        let mut rx = trace.subscribe();
        trace.record(entry("a")).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.message_id, "a");
    }
}
