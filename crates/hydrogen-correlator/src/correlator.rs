//! Client-side correlation and subscription plane (C6), grounded on the
//! reserve-before-write slot-map pattern described in spec §4.6 and present
//! in the teacher's `UplinkSession` request bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hydrogen_message::Message;
use hydrogen_transport::Communicator;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::warn;

use crate::error::CorrelatorError;

pub type ResponseCallback = Arc<dyn Fn(Result<Message, CorrelatorError>) + Send + Sync>;
pub type PropertyCallback = Arc<dyn Fn(&Value) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn(&Message) + Send + Sync>;
pub type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub enable_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        CorrelatorConfig {
            enable_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        }
    }
}

type SubKey = (String, String);

pub struct Correlator {
    communicator: Arc<dyn Communicator>,
    config: CorrelatorConfig,
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>,
    async_pending: Arc<Mutex<HashMap<String, ResponseCallback>>>,
    property_subs: Arc<RwLock<HashMap<SubKey, Vec<PropertyCallback>>>>,
    event_subs: Arc<RwLock<HashMap<SubKey, Vec<EventCallback>>>>,
    connection_cb: Arc<RwLock<Option<ConnectionCallback>>>,
}

impl Correlator {
    pub fn new(communicator: Arc<dyn Communicator>, config: CorrelatorConfig) -> Arc<Self> {
        let correlator = Arc::new(Correlator {
            communicator: communicator.clone(),
            config,
            pending: Arc::new(Mutex::new(HashMap::new())),
            async_pending: Arc::new(Mutex::new(HashMap::new())),
            property_subs: Arc::new(RwLock::new(HashMap::new())),
            event_subs: Arc::new(RwLock::new(HashMap::new())),
            connection_cb: Arc::new(RwLock::new(None)),
        });

        let dispatcher = correlator.clone();
        communicator.on_message(Arc::new(move |msg: Message| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(msg).await;
            });
        }));

        let on_conn = correlator.clone();
        communicator.on_connection_changed(Arc::new(move |connected: bool| {
            let on_conn = on_conn.clone();
            tokio::spawn(async move {
                on_conn.handle_connection_change(connected).await;
            });
        }));

        correlator
    }

    async fn dispatch(&self, msg: Message) {
        match &msg {
            Message::Response(_) | Message::Error(_) => {
                let original = msg.envelope().original_message_id.clone();
                let Some(id) = original else {
                    warn!("orphan response with no originalMessageId dropped");
                    return;
                };
                if let Some(tx) = self.pending.lock().await.remove(&id) {
                    let _ = tx.send(msg);
                    return;
                }
                if let Some(cb) = self.async_pending.lock().await.remove(&id) {
                    cb(Ok(msg));
                    return;
                }
                warn!(original_message_id = %id, "orphan response logged and dropped");
            }
            Message::Event(event) => {
                let device_id = msg.envelope().device_id.clone();

                let event_key = (device_id.clone(), event.event.clone());
                if let Some(callbacks) = self.event_subs.read().await.get(&event_key) {
                    for cb in callbacks {
                        cb(&msg);
                    }
                }

                let property_subs = self.property_subs.read().await;
                for (prop, value) in event.properties.iter() {
                    let key = (device_id.clone(), prop.clone());
                    if let Some(callbacks) = property_subs.get(&key) {
                        for cb in callbacks {
                            cb(value);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    async fn handle_connection_change(&self, connected: bool) {
        if let Some(h) = self.connection_cb.read().await.as_ref() {
            h(connected);
        }
        if connected {
            return;
        }
        // Pending syncs time out via their own drained oneshot; pending
        // asyncs get an explicit error so no caller blocks forever.
        self.pending.lock().await.clear();
        let mut async_pending = self.async_pending.lock().await;
        for (_, cb) in async_pending.drain() {
            cb(Err(CorrelatorError::Transport(hydrogen_transport::TransportError::NotConnected)));
        }
        drop(async_pending);

        if self.config.enable_reconnect {
            self.spawn_reconnect();
        }
    }

    fn spawn_reconnect(&self) {
        let communicator = self.communicator.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let mut attempt = 0u32;
            let mut delay = config.reconnect_delay;
            while attempt < config.max_reconnect_attempts {
                tokio::time::sleep(delay).await;
                if communicator.connect().await.is_ok() {
                    return;
                }
                attempt += 1;
                delay = delay.mul_f64(config.backoff_multiplier);
            }
            warn!("reconnect attempts exhausted");
        });
    }

    /// Blocks until a correlated response arrives or `timeout` elapses. The
    /// slot is removed on every exit path so it can never leak.
    pub async fn send(&self, message: &Message, timeout: Duration) -> Result<Message, CorrelatorError> {
        let id = message.envelope().message_id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.communicator.send_async(message).await {
            self.pending.lock().await.remove(&id);
            return Err(CorrelatorError::Transport(e));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(CorrelatorError::Transport(hydrogen_transport::TransportError::NotConnected)),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(CorrelatorError::Timeout)
            }
        }
    }

    /// Registers `cb` before the bytes are written so a fast reply can never
    /// race the registration.
    pub async fn send_async(&self, message: &Message, cb: ResponseCallback) {
        let id = message.envelope().message_id.clone();
        self.async_pending.lock().await.insert(id.clone(), cb.clone());

        if let Err(e) = self.communicator.send_async(message).await {
            self.async_pending.lock().await.remove(&id);
            cb(Err(CorrelatorError::Transport(e)));
        }
    }

    pub async fn subscribe_property(&self, device_id: impl Into<String>, property: impl Into<String>, cb: PropertyCallback) {
        let key = (device_id.into(), property.into());
        self.property_subs.write().await.entry(key).or_default().push(cb);
    }

    pub async fn unsubscribe_property(&self, device_id: &str, property: &str) {
        self.property_subs.write().await.remove(&(device_id.to_string(), property.to_string()));
    }

    pub async fn subscribe_event(&self, device_id: impl Into<String>, event_type: impl Into<String>, cb: EventCallback) {
        let key = (device_id.into(), event_type.into());
        self.event_subs.write().await.entry(key).or_default().push(cb);
    }

    pub async fn unsubscribe_event(&self, device_id: &str, event_type: &str) {
        self.event_subs.write().await.remove(&(device_id.to_string(), event_type.to_string()));
    }

    pub async fn set_connection_callback(&self, cb: ConnectionCallback) {
        *self.connection_cb.write().await = Some(cb);
    }
}
