//! Minimal WebSocket client for asserting against `MockWsServer`, grounded
//! on the teacher's `rt_test_utils::MockWsClient`.

use futures_util::{SinkExt, StreamExt};
use hydrogen_message::Message;
use tokio_tungstenite::tungstenite::protocol::Message as WsMsg;
use tokio_tungstenite::MaybeTlsStream;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct MockWsClient {
    write: futures_util::stream::SplitSink<WsStream, WsMsg>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl MockWsClient {
    pub async fn connect(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok(MockWsClient { write, read })
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(message)?;
        self.write.send(WsMsg::Text(json.into())).await?;
        Ok(())
    }

    pub async fn recv_message(&mut self) -> Result<Message, Box<dyn std::error::Error>> {
        loop {
            match self.read.next().await {
                Some(Ok(WsMsg::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(WsMsg::Ping(_))) | Some(Ok(WsMsg::Pong(_))) => continue,
                Some(Ok(WsMsg::Close(_))) => return Err("connection closed by server".into()),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection stream ended".into()),
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.write.send(WsMsg::Close(None)).await?;
        Ok(())
    }
}
