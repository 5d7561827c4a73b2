//! C2 sanitization pass — bounds and cleans string/object/array fields.
//!
//! Sanitization is idempotent: re-sanitizing (and re-validating) an already
//! sanitized message produces no further changes and no validation errors
//! (spec §8 invariant).

use serde_json::{Map, Value};

use crate::limits::MessageLimits;
use crate::message::{CommandMessage, ErrorMessageBody, EventMessage, Message, ResponseMessage, SystemMessage};

#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    /// Strip `<...>` tag markup from string values entirely.
    pub strip_html: bool,
    /// Double up single quotes (`'` -> `''`) to defang naive SQL concatenation.
    pub escape_single_quotes: bool,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        SanitizerConfig {
            strip_html: true,
            escape_single_quotes: true,
        }
    }
}

fn sanitize_string(s: &str, limits: &MessageLimits, cfg: &SanitizerConfig) -> String {
    let mut out = s.to_owned();
    if cfg.strip_html {
        out = strip_tags(&out);
    }
    if cfg.escape_single_quotes {
        out = escape_single_quotes(&out);
    }
    if limits.exceeds_string_length(&out) {
        out = out.chars().take(limits.max_string_length).collect();
    }
    out
}

/// Double each `'` to `''`, treating an already-doubled pair as one unit so
/// re-running this on its own output is a no-op. A naive `replace("'",
/// "''")` doubles every quote on every pass, including quotes it produced
/// itself, which breaks the sanitizer's idempotence invariant.
fn escape_single_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'\'') {
            out.push('\'');
            out.push(chars.next().unwrap());
        } else {
            out.push_str("''");
        }
    }
    out
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Recursively sanitize a JSON value, bounding array length and object depth
/// according to `limits`, starting from `depth` (1 at the field's own root).
fn sanitize_value(value: Value, limits: &MessageLimits, cfg: &SanitizerConfig, depth: usize) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_string(&s, limits, cfg)),
        Value::Array(items) => {
            if depth >= limits.max_object_depth {
                return Value::Array(Vec::new());
            }
            let truncated = items.into_iter().take(limits.max_array_size);
            Value::Array(
                truncated
                    .map(|v| sanitize_value(v, limits, cfg, depth + 1))
                    .collect(),
            )
        }
        Value::Object(map) => {
            if depth >= limits.max_object_depth {
                return Value::Object(Map::new());
            }
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k, sanitize_value(v, limits, cfg, depth + 1));
            }
            Value::Object(out)
        }
        other => other,
    }
}

fn sanitize_map(map: Map<String, Value>, limits: &MessageLimits, cfg: &SanitizerConfig) -> Map<String, Value> {
    match sanitize_value(Value::Object(map), limits, cfg, 1) {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

/// Produce a sanitized copy of `message` per `limits`/`cfg`.
pub fn sanitize(message: &Message, limits: &MessageLimits, cfg: &SanitizerConfig) -> Message {
    match message {
        Message::Command(c) => Message::Command(CommandMessage {
            envelope: c.envelope.clone(),
            command: sanitize_string(&c.command, limits, cfg),
            parameters: sanitize_map(c.parameters.clone(), limits, cfg),
            properties: sanitize_map(c.properties.clone(), limits, cfg),
            extra: sanitize_map(c.extra.clone(), limits, cfg),
        }),
        Message::Response(r) => Message::Response(ResponseMessage {
            envelope: r.envelope.clone(),
            status: r.status,
            details: sanitize_map(r.details.clone(), limits, cfg),
            extra: sanitize_map(r.extra.clone(), limits, cfg),
        }),
        Message::Event(e) => Message::Event(EventMessage {
            envelope: e.envelope.clone(),
            event: sanitize_string(&e.event, limits, cfg),
            properties: sanitize_map(e.properties.clone(), limits, cfg),
            details: sanitize_map(e.details.clone(), limits, cfg),
            extra: sanitize_map(e.extra.clone(), limits, cfg),
        }),
        Message::Error(e) => Message::Error(ErrorMessageBody {
            envelope: e.envelope.clone(),
            error_code: e.error_code.clone(),
            error_message: sanitize_string(&e.error_message, limits, cfg),
            details: sanitize_map(e.details.clone(), limits, cfg),
            extra: sanitize_map(e.extra.clone(), limits, cfg),
        }),
        Message::System(s) => Message::System(SystemMessage {
            envelope: s.envelope.clone(),
            details: sanitize_map(s.details.clone(), limits, cfg),
            extra: sanitize_map(s.extra.clone(), limits, cfg),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Envelope, MessageType};
    use serde_json::json;

    fn cmd_with_params(params: Map<String, Value>) -> Message {
        Message::Command(CommandMessage {
            envelope: Envelope::new("cam1", MessageType::Command),
            command: "set_focus".to_owned(),
            parameters: params,
            properties: Map::new(),
            extra: Map::new(),
        })
    }

    #[test]
    fn strips_html_tags() {
        let mut params = Map::new();
        params.insert("note".to_owned(), json!("<b>bold</b> text"));
        let msg = cmd_with_params(params);
        let sanitized = sanitize(&msg, &MessageLimits::default(), &SanitizerConfig::default());
        let Message::Command(c) = sanitized else { panic!() };
        assert_eq!(c.parameters.get("note").unwrap(), &json!("bold text"));
    }

    #[test]
    fn truncates_long_strings() {
        let limits = MessageLimits {
            max_string_length: 5,
            ..MessageLimits::default()
        };
        let mut params = Map::new();
        params.insert("note".to_owned(), json!("abcdefghij"));
        let msg = cmd_with_params(params);
        let sanitized = sanitize(&msg, &limits, &SanitizerConfig::default());
        let Message::Command(c) = sanitized else { panic!() };
        assert_eq!(c.parameters.get("note").unwrap(), &json!("abcde"));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let limits = MessageLimits::default();
        let cfg = SanitizerConfig::default();
        let mut params = Map::new();
        params.insert("note".to_owned(), json!("it's <i>ok</i>"));
        let msg = cmd_with_params(params);
        let once = sanitize(&msg, &limits, &cfg);
        let twice = sanitize(&once, &limits, &cfg);
        assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_is_idempotent_on_multi_quote_strings() {
        let limits = MessageLimits::default();
        let cfg = SanitizerConfig::default();
        let mut params = Map::new();
        params.insert("note".to_owned(), json!("it's the pilots' logs, can't skip 'em"));
        let msg = cmd_with_params(params);
        let once = sanitize(&msg, &limits, &cfg);
        let twice = sanitize(&once, &limits, &cfg);
        assert_eq!(once, twice);
    }

    #[test]
    fn escape_single_quotes_does_not_redouble_existing_pairs() {
        assert_eq!(escape_single_quotes("it's ok"), "it''s ok");
        assert_eq!(escape_single_quotes("it''s ok"), "it''s ok");
        assert_eq!(escape_single_quotes("''''"), "''''");
    }

    #[test]
    fn bounds_array_size() {
        let limits = MessageLimits {
            max_array_size: 2,
            ..MessageLimits::default()
        };
        let mut params = Map::new();
        params.insert("values".to_owned(), json!([1, 2, 3, 4, 5]));
        let msg = cmd_with_params(params);
        let sanitized = sanitize(&msg, &limits, &SanitizerConfig::default());
        let Message::Command(c) = sanitized else { panic!() };
        assert_eq!(c.parameters.get("values").unwrap(), &json!([1, 2]));
    }
}
