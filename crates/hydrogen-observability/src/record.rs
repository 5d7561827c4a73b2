//! Structured log record shape (spec §4.11).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogSeverity,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipe_path: Option<String>,
    pub message: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: LogSeverity, category: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: crate::now_rfc3339(),
            level,
            category: category.into(),
            client_id: None,
            pipe_path: None,
            message: message.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_pipe_path(mut self, pipe_path: impl Into<String>) -> Self {
        self.pipe_path = Some(pipe_path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn to_text_line(&self) -> String {
        format!("{} [{:?}] {}: {}", self.timestamp, self.level, self.category, self.message)
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_text_line())
    }
}
