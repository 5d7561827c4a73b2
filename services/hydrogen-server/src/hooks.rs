//! Connection-plane callback hooks (spec §4.7): `onClientConnected`,
//! `onClientDisconnected`, `onMessageReceived`, `onError`.

use std::sync::Arc;

use hydrogen_message::Message;

pub type ClientConnectedHook = Arc<dyn Fn(&str) + Send + Sync>;
pub type ClientDisconnectedHook = Arc<dyn Fn(&str) + Send + Sync>;
pub type MessageReceivedHook = Arc<dyn Fn(&str, &Message) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ConnectionPlaneHooks {
    pub on_client_connected: Option<ClientConnectedHook>,
    pub on_client_disconnected: Option<ClientDisconnectedHook>,
    pub on_message_received: Option<MessageReceivedHook>,
    pub on_error: Option<ErrorHook>,
}

impl ConnectionPlaneHooks {
    pub fn fire_connected(&self, client_id: &str) {
        if let Some(hook) = &self.on_client_connected {
            hook(client_id);
        }
    }

    pub fn fire_disconnected(&self, client_id: &str) {
        if let Some(hook) = &self.on_client_disconnected {
            hook(client_id);
        }
    }

    pub fn fire_message_received(&self, client_id: &str, message: &Message) {
        if let Some(hook) = &self.on_message_received {
            hook(client_id, message);
        }
    }

    pub fn fire_error(&self, error: &str, client_id: Option<&str>) {
        if let Some(hook) = &self.on_error {
            hook(error, client_id);
        }
    }
}

impl std::fmt::Debug for ConnectionPlaneHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPlaneHooks")
            .field("on_client_connected", &self.on_client_connected.is_some())
            .field("on_client_disconnected", &self.on_client_disconnected.is_some())
            .field("on_message_received", &self.on_message_received.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fires_only_registered_hooks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let hooks = ConnectionPlaneHooks {
            on_client_connected: Some(Arc::new(move |_id| {
                calls2.fetch_add(1, Ordering::SeqCst);
            })),
            ..Default::default()
        };
        hooks.fire_connected("c1");
        hooks.fire_disconnected("c1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
