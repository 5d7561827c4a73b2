//! Spec §8 scenario: after `disconnect`/`reconnect`, a `FifoSession` resumes
//! framed reads cleanly — no partial frame left over from before the
//! reconnect bleeds into the first message read afterwards.

use std::time::Duration;

use hydrogen_fifo::{ConnectionState, FifoConfig, FifoSession, FramingMode};
use hydrogen_message::{CommandMessage, Envelope, Message, MessageType};
use hydrogen_test_utils::TempFifo;
use tokio::io::AsyncWriteExt;

fn sample_command(n: u32) -> Message {
    Message::Command(CommandMessage {
        envelope: Envelope::new(format!("dev-{n}"), MessageType::Command),
        command: format!("cmd{n}"),
        parameters: Default::default(),
        properties: Default::default(),
        extra: Default::default(),
    })
}

#[tokio::test]
async fn session_resumes_framed_reads_after_reconnect() {
    let pipe = TempFifo::create().unwrap();

    let writer = FifoSession::new(pipe.config());
    let reader = FifoSession::new(pipe.config());
    writer.connect().await.unwrap();
    reader.connect().await.unwrap();

    let first = sample_command(1);
    writer.send_message(&first).await.unwrap();
    let received = tokio::time::timeout(std::time::Duration::from_secs(2), reader.read_message())
        .await
        .unwrap();
    assert_eq!(received.envelope().message_id, first.envelope().message_id);

    reader.disconnect().await.unwrap();
    reader.reconnect().await.unwrap();

    let second = sample_command(2);
    writer.send_message(&second).await.unwrap();
    let received = tokio::time::timeout(std::time::Duration::from_secs(2), reader.read_message())
        .await
        .unwrap();
    assert_eq!(received.envelope().message_id, second.envelope().message_id);
}

async fn wait_for_state(session: &FifoSession, want: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if session.connection_state().await == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("session never reached {want:?}"));
}

/// Spec §8 scenario: an oversized length-prefixed frame is a framing error at
/// the session level, not just at the raw decoder (see
/// `hydrogen_fifo::framing`'s own unit coverage of that primitive). The
/// session must drop into `Reconnecting`, re-open the pipe on its own, land
/// back in `Connected`, and correctly read the next valid frame afterward.
#[tokio::test]
async fn session_recovers_from_oversized_length_prefixed_frame() {
    let pipe = TempFifo::create().unwrap();
    let config = FifoConfig {
        framing_mode: FramingMode::LengthPrefixed,
        max_message_size: 64,
        reconnect_delay: Duration::from_millis(20),
        ..pipe.config()
    };

    let writer = FifoSession::new(config.clone());
    let reader = FifoSession::new(config);
    writer.connect().await.unwrap();
    reader.connect().await.unwrap();

    let first = sample_command(1);
    writer.send_message(&first).await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), reader.read_message())
        .await
        .unwrap();
    assert_eq!(received.envelope().message_id, first.envelope().message_id);

    // A length prefix larger than max_message_size, written straight onto the
    // pipe so it reaches the reader's FrameReader uninterpreted as a Message.
    let mut corrupt_writer = tokio::fs::OpenOptions::new()
        .write(true)
        .open(pipe.path())
        .await
        .unwrap();
    let mut bad_frame = 1000u32.to_be_bytes().to_vec();
    bad_frame.extend_from_slice(b"junk");
    corrupt_writer.write_all(&bad_frame).await.unwrap();
    corrupt_writer.flush().await.unwrap();
    drop(corrupt_writer);

    wait_for_state(&reader, ConnectionState::Reconnecting).await;
    wait_for_state(&reader, ConnectionState::Connected).await;
    assert!(reader.statistics().errors >= 1);

    let second = sample_command(2);
    writer.send_message(&second).await.unwrap();
    let received = tokio::time::timeout(Duration::from_secs(2), reader.read_message())
        .await
        .unwrap();
    assert_eq!(received.envelope().message_id, second.envelope().message_id);
}
