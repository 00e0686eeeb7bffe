//! DataFrame - the unit written to a push channel
//!
//! A frame is a named event plus a text payload. Object payloads are
//! serialized to JSON text before they are wrapped.

use std::fmt;
use std::sync::LazyLock;

use bytes::Bytes;
use serde::Serialize;
use serde_json::json;

use crate::ContractError;

/// Millisecond timestamp stamped on every static terminal frame.
///
/// Captured by [`init_end_timestamp`] at startup, or on first use if nothing
/// initialized it earlier.
static END_TIMESTAMP_MS: LazyLock<i64> = LazyLock::new(now_millis);

/// Capture the process-wide end timestamp now. Later calls return the
/// already captured value.
pub fn init_end_timestamp() -> i64 {
    *END_TIMESTAMP_MS
}

/// Current wall clock in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// SSE event name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    Data,
    Error,
    Complete,
    /// Reserved terminal event; always the last frame of a dispatched stream.
    End,
    Custom(String),
}

impl EventName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Data => "data",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::End => "end",
            Self::Custom(name) => name,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "data" => Self::Data,
            "error" => Self::Error,
            "complete" => Self::Complete,
            "end" => Self::End,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frame payload before it is rendered to text.
///
/// Text goes out verbatim, JSON values are serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// Serialize any value into a JSON payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ContractError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Json(value) => value.is_null(),
        }
    }

    /// Render to the text carried on the wire.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// One event written to a channel.
///
/// Immutable once built; the call that constructs it owns it until it is
/// handed to a channel handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    event: EventName,
    data: String,
}

impl DataFrame {
    pub fn new(event: impl Into<EventName>, payload: impl Into<Payload>) -> Self {
        Self {
            event: event.into(),
            data: payload.into().into_text(),
        }
    }

    /// A `data` event
    pub fn data(payload: impl Into<Payload>) -> Self {
        Self::new(EventName::Data, payload)
    }

    /// An `error` event: `{"error":true,"message":..,"timestamp":..}`
    pub fn error(message: Option<&str>) -> Self {
        let body = json!({
            "error": true,
            "message": message.unwrap_or("Unknown error"),
            "timestamp": now_millis(),
        });
        Self::new(EventName::Error, body)
    }

    /// A `complete` event wrapping optional caller data (`{}` when absent).
    pub fn complete(data: Option<serde_json::Value>) -> Self {
        let body = json!({
            "complete": true,
            "timestamp": now_millis(),
            "data": data.unwrap_or_else(|| json!({})),
        });
        Self::new(EventName::Complete, body)
    }

    /// The terminal `end` event with the process-wide captured timestamp.
    pub fn end() -> Self {
        Self::end_at(init_end_timestamp())
    }

    /// The terminal `end` event stamped with an explicit time.
    pub fn end_at(timestamp_ms: i64) -> Self {
        Self {
            event: EventName::End,
            data: format!("{{\"end\":true,\"timestamp\":{timestamp_ms}}}"),
        }
    }

    pub fn event(&self) -> &EventName {
        &self.event
    }

    pub fn data_str(&self) -> &str {
        &self.data
    }

    pub fn is_terminal(&self) -> bool {
        self.event.is_terminal()
    }

    /// Encode as an SSE event block.
    ///
    /// Multi-line payloads get one `data:` field per line so the client
    /// reassembles them with `\n`.
    pub fn to_sse(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 32);
        out.push_str("event: ");
        out.push_str(self.event.as_str());
        out.push('\n');
        if self.data.is_empty() {
            out.push_str("data: \n");
        } else {
            for line in self.data.split('\n') {
                out.push_str("data: ");
                out.push_str(line.strip_suffix('\r').unwrap_or(line));
                out.push('\n');
            }
        }
        out.push('\n');
        out
    }

    pub fn to_sse_bytes(&self) -> Bytes {
        Bytes::from(self.to_sse())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_timestamp_fixed_at_init() {
        let captured = init_end_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(init_end_timestamp(), captured);
        let body: serde_json::Value = serde_json::from_str(DataFrame::end().data_str()).unwrap();
        assert_eq!(body["timestamp"].as_i64(), Some(captured));
    }

    #[test]
    fn test_text_payload_is_verbatim() {
        let frame = DataFrame::data("hello");
        assert_eq!(frame.event(), &EventName::Data);
        assert_eq!(frame.data_str(), "hello");
    }

    #[test]
    fn test_json_payload_is_serialized() {
        let payload = Payload::json(&serde_json::json!({"key": "value"})).unwrap();
        let frame = DataFrame::data(payload);
        assert_eq!(frame.data_str(), r#"{"key":"value"}"#);
    }

    #[test]
    fn test_sse_encoding_splits_lines() {
        let frame = DataFrame::new("token", "a\nb");
        assert_eq!(frame.to_sse(), "event: token\ndata: a\ndata: b\n\n");
    }

    #[test]
    fn test_end_frame_timestamp_is_static() {
        let first = DataFrame::end();
        let second = DataFrame::end();
        assert!(first.is_terminal());
        assert_eq!(first, second);

        let body: serde_json::Value = serde_json::from_str(first.data_str()).unwrap();
        assert_eq!(body["end"], true);
        assert!(body["timestamp"].is_i64());
    }

    #[test]
    fn test_error_frame_defaults_message() {
        let frame = DataFrame::error(None);
        let body: serde_json::Value = serde_json::from_str(frame.data_str()).unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Unknown error");
    }

    #[test]
    fn test_complete_frame_wraps_data() {
        let frame = DataFrame::complete(Some(serde_json::json!({"status": "success"})));
        let body: serde_json::Value = serde_json::from_str(frame.data_str()).unwrap();
        assert_eq!(body["complete"], true);
        assert_eq!(body["data"]["status"], "success");

        let empty = DataFrame::complete(None);
        let body: serde_json::Value = serde_json::from_str(empty.data_str()).unwrap();
        assert_eq!(body["data"], serde_json::json!({}));
    }

    #[test]
    fn test_event_name_round_trip() {
        assert_eq!(EventName::from("end"), EventName::End);
        assert_eq!(EventName::from("delta").as_str(), "delta");
    }

    #[test]
    fn test_empty_payloads() {
        assert!(Payload::from("").is_empty());
        assert!(Payload::Json(serde_json::Value::Null).is_empty());
        assert!(!Payload::from("x").is_empty());
    }
}
