//! Concrete TCP accept listener for the connection plane. Newline-JSON
//! framed, grounded on `hydrogen_test_utils::MockTcpPeer`'s accept-loop
//! shape — generalized to track each connection as a named session with
//! its own outbound channel instead of echoing through a fixed responder.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hydrogen_message::Message;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::plane::ConnectionPlane;
use crate::session::ClientTransport;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_client_id() -> String {
    format!("tcp-{}", NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Binds `addr` and spawns the accept loop. Returns immediately; the loop
/// itself runs for the lifetime of the returned task handle.
pub async fn serve_tcp(plane: Arc<ConnectionPlane>, addr: &str) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    debug!(addr, "tcp listener bound");

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let plane = plane.clone();
                    tokio::spawn(async move {
                        let client_id = next_client_id();
                        debug!(client_id, %peer, "accepted tcp client");
                        if let Err(e) = handle_connection(plane.clone(), client_id.clone(), stream).await {
                            warn!(client_id, error = %e, "tcp session ended with error");
                        }
                        plane.disconnect_client(&client_id).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "tcp accept failed");
                    break;
                }
            }
        }
    });

    Ok(handle)
}

async fn handle_connection(
    plane: Arc<ConnectionPlane>,
    client_id: String,
    stream: TcpStream,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    if plane
        .accept_client(client_id.clone(), ClientTransport::Tcp, None, outbound_tx)
        .await
        .is_err()
    {
        return Ok(());
    }

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(json) = message.to_json() else { continue };
            if write_half.write_all(json.as_bytes()).await.is_err() {
                break;
            }
            if write_half.write_all(b"\n").await.is_err() {
                break;
            }
        }
    });

    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        match Message::from_json(line.trim_end_matches(['\n', '\r'])) {
            Ok(message) => {
                let _ = plane.handle_client_message(&client_id, message).await;
            }
            Err(e) => {
                warn!(client_id, error = %e, "dropping malformed client message");
            }
        }
    }

    writer_task.abort();
    Ok(())
}
