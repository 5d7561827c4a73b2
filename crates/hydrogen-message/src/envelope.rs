//! The common header fields present on every Hydrogen message (spec §3).

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates the per-kind extension fields carried by a [`crate::Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Command,
    Response,
    Event,
    Error,
    DiscoveryRequest,
    DiscoveryResponse,
    Registration,
    Authentication,
    Heartbeat,
}

/// `{LOW, NORMAL, HIGH, CRITICAL}`; default `NORMAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// `{AT_MOST_ONCE, AT_LEAST_ONCE, EXACTLY_ONCE}`; default `AT_LEAST_ONCE`.
///
/// Exactly-once is best-effort equal to at-least-once everywhere except on
/// transports with native support (MQTT QoS 2) — see [`SPEC_FULL.md`] Open
/// Question 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QosLevel {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

/// `status` values on a RESPONSE message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    Pending,
    Timeout,
    Cancelled,
    Partial,
}

/// The `errorCode` field accepts either a numeric or short-string code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Numeric(i64),
    Text(String),
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Numeric(n) => write!(f, "{n}"),
            ErrorCode::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        ErrorCode::Text(s.to_owned())
    }
}

impl From<i64> for ErrorCode {
    fn from(n: i64) -> Self {
        ErrorCode::Numeric(n)
    }
}

/// The envelope fields shared by every message kind (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: String,
    #[serde(default)]
    pub device_id: String,
    pub timestamp: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub qos_level: QosLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_message_id: Option<String>,
}

impl Envelope {
    /// Build a fresh envelope with a UUID-form `messageId` and the current
    /// UTC time at millisecond precision, matching spec §3's preferred form.
    pub fn new(device_id: impl Into<String>, message_type: MessageType) -> Self {
        Envelope {
            message_id: Uuid::new_v4().to_string(),
            device_id: device_id.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message_type,
            priority: Priority::default(),
            qos_level: QosLevel::default(),
            original_message_id: None,
        }
    }

    /// `msg_<n>` form accepted by spec §3 as an alternative to UUID-form ids.
    pub fn new_with_counter_id(
        counter: u64,
        device_id: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Envelope {
            message_id: format!("msg_{counter}"),
            ..Envelope::new(device_id, message_type)
        }
    }

    pub fn is_valid_message_id(id: &str) -> bool {
        !id.is_empty()
    }
}
