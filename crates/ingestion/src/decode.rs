//! JSON line → Event

use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;

use contracts::{Event, EventId};

use crate::error::{IngestionError, Result};

/// Decode one line of input
///
/// The line must be a JSON object. Its `id` field (string or number) becomes
/// the event id; without one a random id is generated. The payload is the
/// line itself, untouched. Blank lines yield `Ok(None)`.
pub fn decode_line(source_name: &str, line: &str) -> Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|e| IngestionError::decode(source_name, e.to_string()))?;

    let Value::Object(object) = &value else {
        return Err(IngestionError::decode(
            source_name,
            "event must be a JSON object",
        ));
    };

    let id = match object.get("id") {
        Some(Value::String(s)) if !s.is_empty() => EventId::new(s),
        Some(Value::Number(n)) => EventId::from(n.to_string()),
        _ => EventId::from(uuid::Uuid::new_v4().to_string()),
    };

    Ok(Some(Event::with_received_at(
        id,
        Bytes::copy_from_slice(line.as_bytes()),
        Utc::now(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_string_id() {
        let event = decode_line("test", r#"{"id":"evt-1","event_type":"x"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.id(), "evt-1");
        assert_eq!(event.attempts(), 0);
        assert_eq!(&event.payload()[..], br#"{"id":"evt-1","event_type":"x"}"#);
    }

    #[test]
    fn test_decode_with_numeric_id() {
        let event = decode_line("test", r#"{"id":42}"#).unwrap().unwrap();
        assert_eq!(event.id(), "42");
    }

    #[test]
    fn test_decode_generates_id() {
        let a = decode_line("test", "{}").unwrap().unwrap();
        let b = decode_line("test", "{}").unwrap().unwrap();
        assert_eq!(a.id().len(), 36);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(decode_line("test", "   ").unwrap().is_none());
    }

    #[test]
    fn test_invalid_lines() {
        assert!(matches!(
            decode_line("test", "not json"),
            Err(IngestionError::Decode { .. })
        ));
        assert!(decode_line("test", "[1,2]").is_err());
    }
}
