//! A mock WebSocket server for exercising `WebSocketCommunicator`, grounded
//! on the teacher's `rt_test_utils::MockWsServer` (random-port bind, one
//! spawned task per connection, configurable per-message responder).

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use hydrogen_message::Message;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::Message as WsMsg;

/// Called once per inbound message; returns the (possibly empty) set of
/// messages to send back.
pub type Responder = Arc<dyn Fn(Message) -> Vec<Message> + Send + Sync>;

pub struct MockWsServer {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl MockWsServer {
    pub async fn start(responder: Responder) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
            Self::accept_loop(listener, responder).await;
        });

        Ok(MockWsServer { addr, _task: task })
    }

    /// Convenience constructor that echoes every message back unchanged.
    pub async fn start_echo() -> std::io::Result<Self> {
        Self::start(Arc::new(|msg| vec![msg])).await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    async fn accept_loop(listener: TcpListener, responder: Responder) {
        loop {
            match listener.accept().await {
                Ok((stream, _peer)) => {
                    let responder = responder.clone();
                    tokio::spawn(async move {
                        let _ = Self::handle_connection(stream, responder).await;
                    });
                }
                Err(_) => break,
            }
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        responder: Responder,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_async(stream).await?;
        let (mut write, mut read) = ws_stream.split();

        while let Some(frame) = read.next().await {
            let frame = frame?;
            let text = match frame {
                WsMsg::Text(t) => t,
                WsMsg::Close(_) => break,
                WsMsg::Ping(data) => {
                    write.send(WsMsg::Pong(data)).await?;
                    continue;
                }
                _ => continue,
            };

            let Ok(message) = serde_json::from_str::<Message>(&text) else {
                continue;
            };
            for reply in responder(message) {
                let json = serde_json::to_string(&reply)?;
                write.send(WsMsg::Text(json.into())).await?;
            }
        }

        Ok(())
    }
}
