//! Spec §4.7 ordering invariant: messages queued to one client's outbound
//! channel — whether via unicast `sendMessageToClient` or `broadcastMessage`
//! — are delivered in the order they were enqueued, with no reordering of
//! a broadcast against an interleaved unicast write to the same session.

use std::sync::Arc;

use hydrogen_auth::AuthManager;
use hydrogen_message::{Envelope, Message, MessageType, SystemMessage};
use hydrogen_server::{load_config_from_str, ClientTransport, ConnectionPlane};
use tokio::sync::mpsc;

fn event(tag: &str) -> Message {
    Message::System(SystemMessage {
        envelope: Envelope::new(tag, MessageType::Heartbeat),
        details: Default::default(),
        extra: Default::default(),
    })
}

#[tokio::test]
async fn unicast_and_broadcast_preserve_per_client_fifo_order() {
    let config = load_config_from_str("", "HYDROGEN_ORDERTEST_").unwrap();
    let auth = AuthManager::new(Default::default());
    let plane = ConnectionPlane::new(config, auth);
    plane.start().await.unwrap();

    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    plane.accept_client("a".into(), ClientTransport::Tcp, None, tx_a).await.unwrap();
    plane.accept_client("b".into(), ClientTransport::Tcp, None, tx_b).await.unwrap();

    plane.send_message_to_client("a", event("unicast-1")).await.unwrap();
    plane.broadcast_message(event("broadcast-1")).await;
    plane.send_message_to_client("a", event("unicast-2")).await.unwrap();

    let first = rx_a.recv().await.unwrap();
    let second = rx_a.recv().await.unwrap();
    let third = rx_a.recv().await.unwrap();
    assert_eq!(first.envelope().device_id, "unicast-1");
    assert_eq!(second.envelope().device_id, "broadcast-1");
    assert_eq!(third.envelope().device_id, "unicast-2");

    // Client B only ever saw the broadcast, not A's unicast traffic.
    let only = rx_b.recv().await.unwrap();
    assert_eq!(only.envelope().device_id, "broadcast-1");

    plane.stop().await.unwrap();
}
