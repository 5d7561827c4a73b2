//! C3 cross-format transformer — maps the internal [`Message`] onto the wire
//! shape each transport in `hydrogen-transport` expects, and back.
//!
//! Lossless for envelope fields and required kind-specific fields; best
//! effort for protocol-specific framing extras, which round-trip through the
//! `extra`/`details` bags already carried on [`Message`].

use serde_json::{Map, Value};

use crate::envelope::{Envelope, MessageType};
use crate::error::MessageError;
use crate::message::{CommandMessage, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Http,
    Mqtt,
    WebSocket,
    Grpc,
    Zmq,
    Stdio,
    Fifo,
}

/// The protocol-native encoding of a message, ready to hand to the matching
/// `hydrogen-transport` communicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolPayload {
    /// Plain JSON bytes — used by HTTP, WebSocket, gRPC (as message body),
    /// STDIO and FIFO framing.
    Json(Vec<u8>),
    /// MQTT publishes need an explicit topic alongside the payload.
    Mqtt { topic: String, payload: Vec<u8> },
    /// ZeroMQ multipart frames: `[command, json]` per spec §4.4 encoding.
    ZmqMultipart(Vec<Vec<u8>>),
}

/// Derive the MQTT topic for a message: `<prefix>/<command>` (spec §4.5,
/// §6.2). Device addressing is the caller's concern — a device's own
/// `topicPrefix` config already scopes it, this function never inserts one.
fn mqtt_topic(message: &Message, prefix: &str) -> String {
    let leaf = match message {
        Message::Command(c) => c.command.clone(),
        Message::Event(e) => e.event.clone(),
        other => format!("{:?}", other.message_type()).to_lowercase(),
    };
    format!("{prefix}/{leaf}")
}

/// The `details`/`parameters` body carried as the MQTT payload (spec §4.5):
/// everything except the envelope and command/event name, which the topic
/// and subscriber context already carry.
fn mqtt_payload_body(message: &Message) -> &Map<String, Value> {
    match message {
        Message::Command(c) => &c.parameters,
        Message::Response(r) => &r.details,
        Message::Event(e) => &e.details,
        Message::Error(e) => &e.details,
        Message::System(s) => &s.details,
    }
}

/// Encode `message` for transmission over `format`.
pub fn to_protocol(message: &Message, format: Format, mqtt_prefix: &str) -> Result<ProtocolPayload, MessageError> {
    let json = message.to_json().map_err(|e| MessageError::Serialization(e.to_string()))?;
    match format {
        Format::Http | Format::WebSocket | Format::Grpc | Format::Stdio | Format::Fifo => {
            Ok(ProtocolPayload::Json(json.into_bytes()))
        }
        Format::Mqtt => {
            let payload = serde_json::to_vec(mqtt_payload_body(message))
                .map_err(|e| MessageError::Serialization(e.to_string()))?;
            Ok(ProtocolPayload::Mqtt {
                topic: mqtt_topic(message, mqtt_prefix),
                payload,
            })
        }
        Format::Zmq => {
            let command = match message {
                Message::Command(c) => c.command.clone(),
                Message::Event(e) => e.event.clone(),
                other => format!("{:?}", other.message_type()).to_lowercase(),
            };
            Ok(ProtocolPayload::ZmqMultipart(vec![
                command.into_bytes(),
                json.into_bytes(),
            ]))
        }
    }
}

/// Decode a received payload for `format` back into a [`Message`].
pub fn to_internal(payload: &ProtocolPayload, format: Format) -> Result<Message, MessageError> {
    if let (ProtocolPayload::Mqtt { topic, payload }, Format::Mqtt) = (payload, format) {
        return mqtt_to_internal(topic, payload);
    }
    let json_bytes: &[u8] = match (payload, format) {
        (ProtocolPayload::Json(bytes), _) => bytes,
        (ProtocolPayload::ZmqMultipart(frames), Format::Zmq) => frames
            .last()
            .ok_or_else(|| MessageError::Validation("empty ZMQ multipart frame".to_owned()))?,
        _ => {
            return Err(MessageError::UnsupportedFormat(format!(
                "{format:?} payload does not match its own encoding"
            )))
        }
    };
    let text = std::str::from_utf8(json_bytes)
        .map_err(|e| MessageError::Validation(format!("payload is not valid UTF-8: {e}")))?;
    Message::from_json(text)
}

/// Reconstruct a COMMAND from an MQTT publish: the topic's trailing segment
/// is the command name (spec §4.5 "topic derives from the command"), and the
/// payload is the `parameters` body. The envelope fields the wire shape no
/// longer carries (`messageId`, `deviceId`, `timestamp`) are stamped fresh —
/// the subscribing `DeviceCommunicator` already knows its own device id.
fn mqtt_to_internal(topic: &str, payload: &[u8]) -> Result<Message, MessageError> {
    let command = topic.rsplit('/').next().unwrap_or(topic).to_owned();
    let parameters: Map<String, Value> = if payload.is_empty() {
        Map::new()
    } else {
        serde_json::from_slice(payload)
            .map_err(|e| MessageError::Validation(format!("invalid mqtt payload: {e}")))?
    };
    Ok(Message::Command(CommandMessage {
        envelope: Envelope::new(String::new(), MessageType::Command),
        command,
        parameters,
        properties: Map::new(),
        extra: Map::new(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        let mut parameters = Map::new();
        parameters.insert("angleDegrees".to_owned(), Value::from(180));
        Message::Command(CommandMessage {
            envelope: Envelope::new("cam1", MessageType::Command),
            command: "set_focus".to_owned(),
            parameters,
            properties: Map::new(),
            extra: Map::new(),
        })
    }

    #[test]
    fn mqtt_topic_has_no_device_segment() {
        let msg = sample();
        let encoded = to_protocol(&msg, Format::Mqtt, "hydrogen").unwrap();
        let ProtocolPayload::Mqtt { topic, .. } = &encoded else {
            panic!("expected mqtt payload");
        };
        assert_eq!(topic, "hydrogen/set_focus");
    }

    #[test]
    fn mqtt_payload_carries_only_parameters() {
        let msg = sample();
        let encoded = to_protocol(&msg, Format::Mqtt, "hydrogen").unwrap();
        let ProtocolPayload::Mqtt { payload, .. } = &encoded else {
            panic!("expected mqtt payload");
        };
        let body: Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(body, serde_json::json!({"angleDegrees": 180}));

        let decoded = to_internal(&encoded, Format::Mqtt).unwrap();
        let Message::Command(decoded) = &decoded else {
            panic!("expected command")
        };
        assert_eq!(decoded.command, "set_focus");
        let Message::Command(original) = &msg else {
            unreachable!()
        };
        assert_eq!(decoded.parameters, original.parameters);
    }

    #[test]
    fn zmq_round_trip_preserves_message() {
        let msg = sample();
        let encoded = to_protocol(&msg, Format::Zmq, "hydrogen").unwrap();
        if let ProtocolPayload::ZmqMultipart(frames) = &encoded {
            assert_eq!(frames.len(), 2);
            assert_eq!(frames[0], b"set_focus");
        } else {
            panic!("expected zmq multipart");
        }
        let decoded = to_internal(&encoded, Format::Zmq).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn websocket_round_trip_preserves_message() {
        let msg = sample();
        let encoded = to_protocol(&msg, Format::WebSocket, "hydrogen").unwrap();
        let decoded = to_internal(&encoded, Format::WebSocket).unwrap();
        assert_eq!(decoded, msg);
    }
}
