//! A mock newline-framed TCP peer for exercising the raw TCP transport,
//! generalized from `MockWsServer`'s accept-loop-plus-responder shape onto
//! plain sockets.

use std::net::SocketAddr;
use std::sync::Arc;

use hydrogen_message::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

pub type TcpResponder = Arc<dyn Fn(Message) -> Vec<Message> + Send + Sync>;

pub struct MockTcpPeer {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl MockTcpPeer {
    pub async fn start(responder: TcpResponder) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(async move {
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
        });

        Ok(MockTcpPeer { addr, _task: task })
    }

    pub async fn start_echo() -> std::io::Result<Self> {
        Self::start(Arc::new(|msg| vec![msg])).await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    async fn handle_connection(stream: tokio::net::TcpStream, responder: TcpResponder) -> std::io::Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break;
            }
            let Ok(message) = serde_json::from_str::<Message>(line.trim_end_matches(['\n', '\r'])) else {
                continue;
            };
            for reply in responder(message) {
                let json = serde_json::to_string(&reply)?;
                write_half.write_all(json.as_bytes()).await?;
                write_half.write_all(b"\n").await?;
            }
        }

        Ok(())
    }
}
