//! Inbound notification payloads.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

/// A notification pushed by the device, decoded from its HTTP body.
///
/// Events are transient: each one is handed to exactly one dispatch and
/// never queued or replayed.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    /// The callback path the device posted to
    pub path: String,
    /// The decoded JSON payload
    pub body: Value,
    /// When the receiver accepted the request (observability only)
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            body,
            received_at: Utc::now(),
        }
    }

    /// Decode a raw request body posted to `path`.
    pub fn decode(path: impl Into<String>, raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }
        let text = std::str::from_utf8(raw).map_err(|e| DecodeError::Utf8(e.to_string()))?;
        let body = serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
        Ok(Self::new(path, body))
    }
}

/// Why an inbound payload could not be turned into an [`InboundEvent`].
///
/// These are logged and dropped; they never reach the device as an error.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Empty payload")]
    Empty,

    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(String),

    #[error("Payload is not valid JSON: {0}")]
    Json(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_payload() {
        let raw = br#"{"AlarmInfo":{"AlarmType":"Motion"}}"#;
        let event = InboundEvent::decode("/System/Event/Notification/Alarm", raw).unwrap();

        assert_eq!(event.path, "/System/Event/Notification/Alarm");
        assert_eq!(event.body["AlarmInfo"]["AlarmType"], "Motion");
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(InboundEvent::decode("/x", b""), Err(DecodeError::Empty));
        assert_eq!(
            InboundEvent::decode("/x", b"  \r\n"),
            Err(DecodeError::Empty)
        );
        assert!(matches!(
            InboundEvent::decode("/x", &[0xff, 0xfe, 0x7b]),
            Err(DecodeError::Utf8(_))
        ));
        assert!(matches!(
            InboundEvent::decode("/x", b"OK"),
            Err(DecodeError::Json(_))
        ));
    }
}
