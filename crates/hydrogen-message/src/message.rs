//! The typed message envelope and its per-kind extensions (spec §3, C1).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::envelope::{Envelope, ErrorCode, MessageType, Priority, QosLevel, ResponseStatus};
use crate::error::MessageError;

// ---------------------------------------------------------------------------
// Wire shape — exactly what spec §6.1 puts on the wire: a flat JSON object.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "messageId")]
    message_id: String,
    #[serde(rename = "deviceId", default)]
    device_id: String,
    timestamp: String,
    #[serde(rename = "messageType")]
    message_type: MessageType,
    #[serde(default)]
    priority: Priority,
    #[serde(rename = "qosLevel", default)]
    qos_level: QosLevel,
    #[serde(rename = "originalMessageId", default, skip_serializing_if = "Option::is_none")]
    original_message_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<ResponseStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,

    #[serde(rename = "errorCode", default, skip_serializing_if = "Option::is_none")]
    error_code: Option<ErrorCode>,
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Map<String, Value>>,

    /// Unrecognized fields, preserved verbatim for lossless round-tripping
    /// (spec C3: "unknown fields round-trip through a details bag").
    #[serde(flatten)]
    extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Typed per-kind messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    pub envelope: Envelope,
    pub command: String,
    pub parameters: Map<String, Value>,
    pub properties: Map<String, Value>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMessage {
    pub envelope: Envelope,
    pub status: ResponseStatus,
    pub details: Map<String, Value>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub envelope: Envelope,
    pub event: String,
    pub properties: Map<String, Value>,
    pub details: Map<String, Value>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessageBody {
    pub envelope: Envelope,
    pub error_code: ErrorCode,
    pub error_message: String,
    pub details: Map<String, Value>,
    pub extra: Map<String, Value>,
}

/// DISCOVERY_REQUEST / DISCOVERY_RESPONSE / REGISTRATION / AUTHENTICATION /
/// HEARTBEAT — spec §3 defines no kind-specific fields for these beyond the
/// envelope; callers use `details` for payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemMessage {
    pub envelope: Envelope,
    pub details: Map<String, Value>,
    pub extra: Map<String, Value>,
}

/// A discriminated Hydrogen message (spec §3 "Message (envelope)").
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Command(CommandMessage),
    Response(ResponseMessage),
    Event(EventMessage),
    Error(ErrorMessageBody),
    System(SystemMessage),
}

impl Message {
    pub fn envelope(&self) -> &Envelope {
        match self {
            Message::Command(m) => &m.envelope,
            Message::Response(m) => &m.envelope,
            Message::Event(m) => &m.envelope,
            Message::Error(m) => &m.envelope,
            Message::System(m) => &m.envelope,
        }
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        match self {
            Message::Command(m) => &mut m.envelope,
            Message::Response(m) => &mut m.envelope,
            Message::Event(m) => &mut m.envelope,
            Message::Error(m) => &mut m.envelope,
            Message::System(m) => &mut m.envelope,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.envelope().message_type
    }

    /// Build a RESPONSE preserving `originalMessageId`, `deviceId`, and the
    /// command's `priority` unless `priority` is overridden (spec C1
    /// `newResponse`).
    pub fn new_response(
        cmd: &CommandMessage,
        status: ResponseStatus,
        priority: Option<Priority>,
    ) -> ResponseMessage {
        let mut envelope = Envelope::new(cmd.envelope.device_id.clone(), MessageType::Response);
        envelope.original_message_id = Some(cmd.envelope.message_id.clone());
        envelope.priority = priority.unwrap_or(cmd.envelope.priority);
        envelope.qos_level = cmd.envelope.qos_level;
        ResponseMessage {
            envelope,
            status,
            details: Map::new(),
            extra: Map::new(),
        }
    }

    /// Build an ERROR preserving `originalMessageId`, `deviceId`, and the
    /// command's `priority` unless overridden (spec C1 `newError`).
    pub fn new_error(
        cmd: &CommandMessage,
        code: impl Into<ErrorCode>,
        text: impl Into<String>,
        priority: Option<Priority>,
    ) -> ErrorMessageBody {
        let mut envelope = Envelope::new(cmd.envelope.device_id.clone(), MessageType::Error);
        envelope.original_message_id = Some(cmd.envelope.message_id.clone());
        envelope.priority = priority.unwrap_or(cmd.envelope.priority);
        envelope.qos_level = cmd.envelope.qos_level;
        ErrorMessageBody {
            envelope,
            error_code: code.into(),
            error_message: text.into(),
            details: Map::new(),
            extra: Map::new(),
        }
    }

    /// Serialize to the spec §6.1 wire JSON.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Serialization(e.to_string()))
    }

    /// Deserialize from the spec §6.1 wire JSON.
    ///
    /// Rejects missing required envelope fields (`messageId`, `timestamp`,
    /// `messageType`); tolerates unknown keys.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        serde_json::from_str(json).map_err(|e| MessageError::Validation(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Message <-> WireMessage conversions
// ---------------------------------------------------------------------------

impl From<WireMessage> for Message {
    fn from(w: WireMessage) -> Self {
        let envelope = Envelope {
            message_id: w.message_id,
            device_id: w.device_id,
            timestamp: w.timestamp,
            message_type: w.message_type,
            priority: w.priority,
            qos_level: w.qos_level,
            original_message_id: w.original_message_id,
        };
        match w.message_type {
            MessageType::Command => Message::Command(CommandMessage {
                envelope,
                command: w.command.unwrap_or_default(),
                parameters: w.parameters.unwrap_or_default(),
                properties: w.properties.unwrap_or_default(),
                extra: w.extra,
            }),
            MessageType::Response => Message::Response(ResponseMessage {
                envelope,
                status: w.status.unwrap_or(ResponseStatus::Pending),
                details: w.details.unwrap_or_default(),
                extra: w.extra,
            }),
            MessageType::Event => Message::Event(EventMessage {
                envelope,
                event: w.event.unwrap_or_default(),
                properties: w.properties.unwrap_or_default(),
                details: w.details.unwrap_or_default(),
                extra: w.extra,
            }),
            MessageType::Error => Message::Error(ErrorMessageBody {
                envelope,
                error_code: w.error_code.unwrap_or_else(|| ErrorCode::Text(String::new())),
                error_message: w.error_message.unwrap_or_default(),
                details: w.details.unwrap_or_default(),
                extra: w.extra,
            }),
            MessageType::DiscoveryRequest
            | MessageType::DiscoveryResponse
            | MessageType::Registration
            | MessageType::Authentication
            | MessageType::Heartbeat => Message::System(SystemMessage {
                envelope,
                details: w.details.unwrap_or_default(),
                extra: w.extra,
            }),
        }
    }
}

impl From<&Message> for WireMessage {
    fn from(m: &Message) -> Self {
        let envelope = m.envelope().clone();
        let mut w = WireMessage {
            message_id: envelope.message_id,
            device_id: envelope.device_id,
            timestamp: envelope.timestamp,
            message_type: envelope.message_type,
            priority: envelope.priority,
            qos_level: envelope.qos_level,
            original_message_id: envelope.original_message_id,
            command: None,
            parameters: None,
            properties: None,
            status: None,
            event: None,
            error_code: None,
            error_message: None,
            details: None,
            extra: Map::new(),
        };
        match m {
            Message::Command(c) => {
                w.command = Some(c.command.clone());
                w.parameters = Some(c.parameters.clone());
                w.properties = Some(c.properties.clone());
                w.extra = c.extra.clone();
            }
            Message::Response(r) => {
                w.status = Some(r.status);
                w.details = Some(r.details.clone());
                w.extra = r.extra.clone();
            }
            Message::Event(e) => {
                w.event = Some(e.event.clone());
                w.properties = Some(e.properties.clone());
                w.details = Some(e.details.clone());
                w.extra = e.extra.clone();
            }
            Message::Error(e) => {
                w.error_code = Some(e.error_code.clone());
                w.error_message = Some(e.error_message.clone());
                w.details = Some(e.details.clone());
                w.extra = e.extra.clone();
            }
            Message::System(s) => {
                w.details = Some(s.details.clone());
                w.extra = s.extra.clone();
            }
        }
        w
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireMessage::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireMessage::deserialize(deserializer).map(Message::from)
    }
}

// ---------------------------------------------------------------------------
// Legacy ASCII guider protocol parser (spec §6.4)
// ---------------------------------------------------------------------------

/// Commands accepted by the legacy ASCII guider protocol.
const LEGACY_GUIDER_COMMANDS: &[&str] = &[
    "status",
    "correction",
    "star",
    "calibration",
    "calibration_state",
    "calibration_completed",
    "calibration_failed",
    "star_lost",
    "settle_begin",
    "settle_done",
];

/// Parse one LF-terminated legacy guider line (`<command>:<csv values>`) into
/// an EVENT message, per spec §6.4 and §8 scenario 6.
///
/// `device_id` is attached to the resulting envelope since the legacy
/// protocol carries no device identity of its own.
pub fn parse_legacy_guider_line(line: &str, device_id: &str) -> Result<Message, MessageError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (command, rest) = line
        .split_once(':')
        .ok_or_else(|| MessageError::Validation(format!("malformed guider line: '{line}'")))?;

    if !LEGACY_GUIDER_COMMANDS.contains(&command) {
        return Err(MessageError::Validation(format!(
            "unknown guider command: '{command}'"
        )));
    }

    let values: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').collect()
    };

    let details = legacy_guider_details(command, &values);

    let envelope = Envelope::new(device_id, MessageType::Event);
    Ok(Message::Event(EventMessage {
        envelope,
        event: command.to_owned(),
        properties: Map::new(),
        details,
        extra: Map::new(),
    }))
}

/// Map the CSV positions of each legacy command onto named `details` keys,
/// per the scenario in spec §8.6 (`status:guiding,1,0.35,0.90` ->
/// `{state, calibrated, rms, peak}`).
fn legacy_guider_details(command: &str, values: &[&str]) -> Map<String, Value> {
    let mut details = Map::new();
    match command {
        "status" => {
            put_str(&mut details, "state", values.first());
            put_bool(&mut details, "calibrated", values.get(1));
            put_f64(&mut details, "rms", values.get(2));
            put_f64(&mut details, "peak", values.get(3));
        }
        "correction" => {
            put_f64(&mut details, "ra", values.first());
            put_f64(&mut details, "dec", values.get(1));
        }
        "star" => {
            put_f64(&mut details, "x", values.first());
            put_f64(&mut details, "y", values.get(1));
            put_f64(&mut details, "flux", values.get(2));
        }
        _ => {
            for (i, v) in values.iter().enumerate() {
                details.insert(format!("value{i}"), Value::String((*v).to_owned()));
            }
        }
    }
    details
}

fn put_str(map: &mut Map<String, Value>, key: &str, v: Option<&&str>) {
    if let Some(v) = v {
        map.insert(key.to_owned(), Value::String((*v).to_owned()));
    }
}

fn put_bool(map: &mut Map<String, Value>, key: &str, v: Option<&&str>) {
    if let Some(v) = v {
        map.insert(key.to_owned(), Value::Bool(*v == "1" || *v == "true"));
    }
}

fn put_f64(map: &mut Map<String, Value>, key: &str, v: Option<&&str>) {
    if let Some(v) = v {
        if let Ok(n) = v.parse::<f64>() {
            if let Some(num) = serde_json::Number::from_f64(n) {
                map.insert(key.to_owned(), Value::Number(num));
            }
        }
    }
}
