//! Per-client session tracking (spec §4.7). Unlike
//! `hydrogen_transport::TcpCommunicator`'s fan-out server mode, which
//! broadcasts identically to every reader, each client here gets its own
//! outbound channel so `sendMessageToClient` can address one session.

use std::collections::HashMap;
use std::time::Instant;

use hydrogen_message::Message;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTransport {
    Tcp,
    WebSocket,
    Fifo,
}

pub struct ClientSession {
    pub client_id: String,
    pub transport: ClientTransport,
    pub connected_at: Instant,
    pub last_seen: Instant,
    pub outbound: mpsc::UnboundedSender<Message>,
    /// Heartbeats sent since the last response seen from this client;
    /// reset to 0 whenever any message arrives. The heartbeat sweep marks
    /// a session stale once this exceeds the configured miss threshold.
    pub missed_heartbeats: u32,
}

impl ClientSession {
    fn touch(&mut self) {
        self.last_seen = Instant::now();
        self.missed_heartbeats = 0;
    }
}

/// The connection plane's live client table, keyed by client id.
pub struct SessionTable {
    sessions: RwLock<HashMap<String, ClientSession>>,
}

impl SessionTable {
    pub fn new() -> Self {
        SessionTable { sessions: RwLock::new(HashMap::new()) }
    }

    pub async fn insert(
        &self,
        client_id: String,
        transport: ClientTransport,
        outbound: mpsc::UnboundedSender<Message>,
    ) {
        let now = Instant::now();
        let session = ClientSession {
            client_id: client_id.clone(),
            transport,
            connected_at: now,
            last_seen: now,
            outbound,
            missed_heartbeats: 0,
        };
        self.sessions.write().await.insert(client_id, session);
    }

    pub async fn remove(&self, client_id: &str) -> Option<ClientSession> {
        self.sessions.write().await.remove(client_id)
    }

    pub async fn contains(&self, client_id: &str) -> bool {
        self.sessions.read().await.contains_key(client_id)
    }

    pub async fn client_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn touch(&self, client_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(client_id) {
            session.touch();
        }
    }

    pub async fn send_to(&self, client_id: &str, message: Message) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(client_id) {
            Some(session) => session.outbound.send(message).is_ok(),
            None => false,
        }
    }

    pub async fn broadcast(&self, message: Message) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            let _ = session.outbound.send(message.clone());
        }
    }

    /// Returns client ids idle past `timeout`, for the cleanup sweep.
    pub async fn idle_since(&self, timeout: std::time::Duration) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| s.last_seen.elapsed() > timeout)
            .map(|s| s.client_id.clone())
            .collect()
    }

    /// Bumps every session's missed-heartbeat counter and returns ids that
    /// crossed `max_missed`, for the heartbeat sweep.
    pub async fn tick_heartbeats(&self, max_missed: u32) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let mut stale = Vec::new();
        for session in sessions.values_mut() {
            session.missed_heartbeats += 1;
            if session.missed_heartbeats > max_missed {
                stale.push(session.client_id.clone());
            }
        }
        stale
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}
