//! Shared mock transports for integration tests: a mock WebSocket
//! server/client pair, a mock newline-framed TCP peer, and a throwaway
//! named pipe for FIFO tests.

mod fifo_pair;
mod mock_tcp_peer;
mod mock_ws_client;
mod mock_ws_server;

pub use fifo_pair::TempFifo;
pub use mock_tcp_peer::{MockTcpPeer, TcpResponder};
pub use mock_ws_client::MockWsClient;
pub use mock_ws_server::{MockWsServer, Responder};

#[cfg(test)]
mod tests {
    use super::*;
    use hydrogen_message::{Envelope, Message, MessageType, SystemMessage};

    fn heartbeat(device_id: &str) -> Message {
        Message::System(SystemMessage {
            envelope: Envelope::new(device_id, MessageType::Heartbeat),
            details: Default::default(),
            extra: Default::default(),
        })
    }

    #[tokio::test]
    async fn ws_server_echoes_to_client() {
        let server = MockWsServer::start_echo().await.unwrap();
        let mut client = MockWsClient::connect(&server.url()).await.unwrap();

        client.send_message(&heartbeat("dev-1")).await.unwrap();
        let echoed = client.recv_message().await.unwrap();
        assert_eq!(echoed.message_type(), MessageType::Heartbeat);
    }

    #[test]
    fn temp_fifo_creates_a_real_pipe() {
        let fifo = TempFifo::create().unwrap();
        assert!(fifo.path().exists());
    }
}
