//! C2 validator — structural and security checks, paired with the sanitizer.

use serde_json::{Map, Value};

use crate::limits::MessageLimits;
use crate::message::Message;
use crate::sanitizer::{sanitize, SanitizerConfig};
use crate::security::{scan_blocked_substrings, scan_path_traversal, scan_sql_injection, scan_xss};

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub limits: MessageLimits,
    pub sanitizer: SanitizerConfig,
    /// When `Some`, COMMAND messages must name one of these commands.
    pub allowed_commands: Option<Vec<String>>,
    /// When `Some`, EVENT messages must name one of these event types.
    pub allowed_events: Option<Vec<String>>,
    /// Hard-blocked substrings (case-insensitive); any hit is a validation error.
    pub blocked_substrings: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            limits: MessageLimits::default(),
            sanitizer: SanitizerConfig::default(),
            allowed_commands: None,
            allowed_events: None,
            blocked_substrings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Sanitized copy of the message, produced regardless of `valid`.
    pub sanitized: Message,
}

pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Validator { config }
    }

    pub fn validate(&self, message: &Message) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.validate_structure(message, &mut errors);
        self.validate_kind(message, &mut errors);
        self.scan_security(message, &mut errors, &mut warnings);

        let sanitized = sanitize(message, &self.config.limits, &self.config.sanitizer);

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
            sanitized,
        }
    }

    fn validate_structure(&self, message: &Message, errors: &mut Vec<String>) {
        let envelope = message.envelope();

        if envelope.message_id.is_empty() {
            errors.push("messageId must not be empty".to_owned());
        }
        if chrono::DateTime::parse_from_rfc3339(&envelope.timestamp).is_err() {
            errors.push(format!("timestamp is not valid ISO-8601: '{}'", envelope.timestamp));
        }

        if let Ok(encoded) = serde_json::to_vec(message) {
            if self.config.limits.exceeds_size(encoded.len()) {
                errors.push(format!(
                    "message size {} exceeds max {}",
                    encoded.len(),
                    self.config.limits.max_message_size
                ));
            }
        }

        for (label, map) in self.field_maps(message) {
            if self.config.limits.exceeds_depth(&Value::Object(map.clone())) {
                errors.push(format!("{label} exceeds max object depth"));
            }
            for (key, value) in map {
                if let Value::Array(items) = &value {
                    if self.config.limits.exceeds_array_size(items.len()) {
                        errors.push(format!("{label}.{key} exceeds max array size"));
                    }
                }
            }
        }
    }

    fn validate_kind(&self, message: &Message, errors: &mut Vec<String>) {
        match message {
            Message::Command(c) => {
                if c.command.is_empty() {
                    errors.push("command must not be empty".to_owned());
                } else if c.command.len() > 100 {
                    errors.push("command must not exceed 100 characters".to_owned());
                }
                if let Some(allowed) = &self.config.allowed_commands {
                    if !allowed.iter().any(|a| a == &c.command) {
                        errors.push(format!("command '{}' is not in the allow-list", c.command));
                    }
                }
            }
            Message::Response(_) => {
                // `status` is a closed enum already enforced by deserialization.
            }
            Message::Event(e) => {
                if e.event.is_empty() {
                    errors.push("event must not be empty".to_owned());
                }
                if let Some(allowed) = &self.config.allowed_events {
                    if !allowed.iter().any(|a| a == &e.event) {
                        errors.push(format!("event '{}' is not in the allow-list", e.event));
                    }
                }
            }
            Message::Error(e) => {
                if e.error_message.is_empty() {
                    errors.push("errorMessage must not be empty".to_owned());
                }
                if let crate::envelope::ErrorCode::Text(s) = &e.error_code {
                    if s.len() > 64 {
                        errors.push("errorCode text form must not exceed 64 characters".to_owned());
                    }
                }
            }
            Message::System(_) => {}
        }
    }

    fn scan_security(&self, message: &Message, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        let mut strings = Vec::new();
        self.collect_strings(message, &mut strings);

        for s in &strings {
            for hit in scan_sql_injection(s) {
                warnings.push(format!("possible SQL injection pattern: '{}'", hit.pattern));
            }
            for hit in scan_xss(s) {
                warnings.push(format!("possible XSS pattern: '{}'", hit.pattern));
            }
            for hit in scan_path_traversal(s) {
                warnings.push(format!("possible path traversal pattern: '{}'", hit.pattern));
            }
            for hit in scan_blocked_substrings(s, &self.config.blocked_substrings) {
                errors.push(format!("blocked substring present: '{}'", hit.pattern));
            }
        }
    }

    fn field_maps<'a>(&self, message: &'a Message) -> Vec<(&'static str, &'a Map<String, Value>)> {
        match message {
            Message::Command(c) => vec![
                ("parameters", &c.parameters),
                ("properties", &c.properties),
                ("extra", &c.extra),
            ],
            Message::Response(r) => vec![("details", &r.details), ("extra", &r.extra)],
            Message::Event(e) => vec![
                ("properties", &e.properties),
                ("details", &e.details),
                ("extra", &e.extra),
            ],
            Message::Error(e) => vec![("details", &e.details), ("extra", &e.extra)],
            Message::System(s) => vec![("details", &s.details), ("extra", &s.extra)],
        }
    }

    fn collect_strings(&self, message: &Message, out: &mut Vec<String>) {
        match message {
            Message::Command(c) => out.push(c.command.clone()),
            Message::Event(e) => out.push(e.event.clone()),
            Message::Error(e) => out.push(e.error_message.clone()),
            Message::Response(_) | Message::System(_) => {}
        }
        for (_, map) in self.field_maps(message) {
            collect_value_strings(&Value::Object(map.clone()), out);
        }
    }
}

fn collect_value_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_value_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_value_strings(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Envelope, MessageType};
    use crate::message::CommandMessage;
    use serde_json::json;

    fn command(cmd: &str) -> Message {
        Message::Command(CommandMessage {
            envelope: Envelope::new("cam1", MessageType::Command),
            command: cmd.to_owned(),
            parameters: Map::new(),
            properties: Map::new(),
            extra: Map::new(),
        })
    }

    #[test]
    fn rejects_empty_command() {
        let report = Validator::new(ValidatorConfig::default()).validate(&command(""));
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("command")));
    }

    #[test]
    fn accepts_allow_listed_command() {
        let cfg = ValidatorConfig {
            allowed_commands: Some(vec!["set_focus".to_owned()]),
            ..ValidatorConfig::default()
        };
        let report = Validator::new(cfg).validate(&command("set_focus"));
        assert!(report.valid);
    }

    #[test]
    fn rejects_command_outside_allow_list() {
        let cfg = ValidatorConfig {
            allowed_commands: Some(vec!["set_focus".to_owned()]),
            ..ValidatorConfig::default()
        };
        let report = Validator::new(cfg).validate(&command("reboot_mount"));
        assert!(!report.valid);
    }

    #[test]
    fn warns_on_xss_pattern_in_parameters() {
        let mut msg = command("set_focus");
        if let Message::Command(c) = &mut msg {
            c.parameters.insert("note".to_owned(), json!("<script>evil()</script>"));
        }
        let report = Validator::new(ValidatorConfig::default()).validate(&msg);
        assert!(report.warnings.iter().any(|w| w.contains("XSS")));
    }

    #[test]
    fn blocked_substring_is_an_error() {
        let mut msg = command("set_focus");
        if let Message::Command(c) = &mut msg {
            c.parameters.insert("note".to_owned(), json!("shutdown_now"));
        }
        let cfg = ValidatorConfig {
            blocked_substrings: vec!["shutdown_now".to_owned()],
            ..ValidatorConfig::default()
        };
        let report = Validator::new(cfg).validate(&msg);
        assert!(!report.valid);
    }

    #[test]
    fn sanitized_copy_revalidates_clean() {
        let mut msg = command("set_focus");
        if let Message::Command(c) = &mut msg {
            c.parameters.insert("note".to_owned(), json!("<b>it's fine</b>"));
        }
        let validator = Validator::new(ValidatorConfig::default());
        let first = validator.validate(&msg);
        let second = validator.validate(&first.sanitized);
        assert!(second.errors.is_empty());
    }
}
