//! Spec §8 scenario: a COMMAND that never gets a reply yields
//! `CorrelatorError::Timeout` rather than blocking forever, and its pending
//! slot is removed so it can't leak.

use std::sync::Arc;
use std::time::Duration;

use hydrogen_correlator::{Correlator, CorrelatorConfig, CorrelatorError};
use hydrogen_message::{CommandMessage, Envelope, Message, MessageType};
use hydrogen_test_utils::MockWsServer;
use hydrogen_transport::{Communicator, WebSocketCommunicator};

#[tokio::test]
async fn unanswered_command_times_out() {
    // A server that never replies.
    let server = MockWsServer::start(Arc::new(|_msg: Message| vec![])).await.unwrap();

    let ws = Arc::new(WebSocketCommunicator::new(server.url()));
    ws.connect().await.unwrap();
    let correlator = Correlator::new(ws, CorrelatorConfig::default());

    let cmd = Message::Command(CommandMessage {
        envelope: Envelope::new("cam1", MessageType::Command),
        command: "get_status".into(),
        parameters: Default::default(),
        properties: Default::default(),
        extra: Default::default(),
    });

    let result = correlator.send(&cmd, Duration::from_millis(200)).await;
    assert!(matches!(result, Err(CorrelatorError::Timeout)));
}
