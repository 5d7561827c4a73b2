//! Spec §4.7 lifecycle and access-control scenarios: start/stop/restart,
//! max-clients rejection, command allow-listing, and the C12 permission
//! gate on device-bound commands.

use std::sync::Arc;

use hydrogen_auth::AuthManager;
use hydrogen_device::{DeviceCommunicator, ProtocolKind};
use hydrogen_message::{CommandMessage, Envelope, Message, MessageType};
use hydrogen_server::{load_config_from_str, ClientTransport, ConnectionPlane, PlaneStatus, ServerError};
use tokio::sync::mpsc;

fn plane_with_config(toml: &str, prefix: &str) -> Arc<ConnectionPlane> {
    let config = load_config_from_str(toml, prefix).unwrap();
    let auth = AuthManager::new(Default::default());
    ConnectionPlane::new(config, auth)
}

#[tokio::test]
async fn start_stop_restart_transitions_status() {
    let plane = plane_with_config("", "HYDROGEN_LIFECYCLETEST_");
    assert_eq!(plane.status(), PlaneStatus::Stopped);

    plane.start().await.unwrap();
    assert_eq!(plane.status(), PlaneStatus::Running);
    assert!(plane.is_healthy());

    plane.restart().await.unwrap();
    assert_eq!(plane.status(), PlaneStatus::Running);

    plane.stop().await.unwrap();
    assert_eq!(plane.status(), PlaneStatus::Stopped);
}

#[tokio::test]
async fn max_clients_rejects_past_the_cap() {
    let plane = plane_with_config("[server]\nmax_clients = 1\n", "HYDROGEN_CAPTEST_");
    plane.start().await.unwrap();

    let (tx1, _rx1) = mpsc::unbounded_channel();
    plane.accept_client("c1".into(), ClientTransport::Tcp, None, tx1).await.unwrap();

    let (tx2, _rx2) = mpsc::unbounded_channel();
    let result = plane.accept_client("c2".into(), ClientTransport::Tcp, None, tx2).await;
    assert!(matches!(result, Err(ServerError::MaxClientsReached)));

    plane.stop().await.unwrap();
}

#[tokio::test]
async fn disallowed_command_is_rejected_at_accept() {
    let plane = plane_with_config(
        "[server]\nallowed_commands = [\"status\"]\n",
        "HYDROGEN_ALLOWTEST_",
    );
    plane.start().await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = plane.accept_client("c1".into(), ClientTransport::Tcp, Some("move"), tx).await;
    assert!(matches!(result, Err(ServerError::CommandNotAllowed(_))));

    plane.stop().await.unwrap();
}

#[tokio::test]
async fn unpermitted_client_cannot_command_a_device() {
    let plane = plane_with_config("", "HYDROGEN_PERMTEST_");
    let device = DeviceCommunicator::new("cam1");
    plane.register_device("cam1", device, ProtocolKind::Tcp).await;
    plane.start().await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    plane.accept_client("c1".into(), ClientTransport::Tcp, None, tx).await.unwrap();

    let cmd = Message::Command(CommandMessage {
        envelope: Envelope::new("cam1", MessageType::Command),
        command: "expose".into(),
        parameters: Default::default(),
        properties: Default::default(),
        extra: Default::default(),
    });
    let result = plane.handle_client_message("c1", cmd).await;
    assert!(matches!(result, Err(ServerError::NotPermitted(_, _))));

    let error_reply = rx.recv().await.unwrap();
    assert!(matches!(error_reply, Message::Error(_)));

    plane.stop().await.unwrap();
}
