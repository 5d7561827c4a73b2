//! Spec §8 scenario: a COMMAND sent over WebSocket gets its RESPONSE routed
//! back to the originating `Correlator::send` call via `originalMessageId`.

use std::sync::Arc;
use std::time::Duration;

use hydrogen_correlator::{Correlator, CorrelatorConfig};
use hydrogen_message::{CommandMessage, Envelope, Message, MessageType, ResponseStatus};
use hydrogen_test_utils::MockWsServer;
use hydrogen_transport::{Communicator, WebSocketCommunicator};

#[tokio::test]
async fn command_gets_its_correlated_response() {
    let server = MockWsServer::start(Arc::new(|msg: Message| {
        let Message::Command(cmd) = &msg else { return vec![] };
        vec![Message::Response(Message::new_response(cmd, ResponseStatus::Success, None))]
    }))
    .await
    .unwrap();

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

    let response = correlator.send(&cmd, Duration::from_secs(2)).await.unwrap();
    let Message::Response(resp) = response else { panic!("expected response") };
    assert_eq!(resp.status, ResponseStatus::Success);
    assert_eq!(resp.envelope.original_message_id.as_deref(), Some(cmd.envelope().message_id.as_str()));
}
