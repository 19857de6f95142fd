use crate::cursor::Cursor;
use crate::fields::{Fields, MESSAGE, PRIORITY};
use crate::priority::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A decoded journal entry.
///
/// Built only by a complete whole-entry read; owned by the caller afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub fields: Fields,
    pub cursor: Cursor,
    pub timestamp: DateTime<Utc>,
    /// Monotonic time since boot when the entry was written
    #[serde(with = "duration_usec")]
    pub elapsed: Duration,
}

impl Entry {
    pub fn new(fields: Fields, cursor: Cursor, realtime_usec: u64, monotonic_usec: u64) -> Self {
        Self {
            fields,
            cursor,
            timestamp: timestamp_from_usec(realtime_usec),
            elapsed: Duration::from_micros(monotonic_usec),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    pub fn message(&self) -> Option<&str> {
        self.fields.get(MESSAGE)
    }

    pub fn priority(&self) -> Option<Priority> {
        self.fields.get(PRIORITY).and_then(|p| p.parse().ok())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => Ok(()),
        }
    }
}

/// Convert a realtime stamp in microseconds since the epoch.
pub fn timestamp_from_usec(usec: u64) -> DateTime<Utc> {
    let secs = (usec / 1_000_000) as i64;
    let nanos = ((usec % 1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_default()
}

mod duration_usec {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_micros(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entry {
        let fields = Fields::from([("MESSAGE", "hello"), ("PRIORITY", "4")]);
        Entry::new(fields, Cursor::from("s=abc;i=10"), 1_700_000_000_123_456, 5_000_000)
    }

    #[test]
    fn test_accessors() {
        let entry = sample();
        assert_eq!(entry.message(), Some("hello"));
        assert_eq!(entry.priority(), Some(Priority::Warning));
        assert_eq!(entry.field("MISSING"), None);
        assert_eq!(entry.elapsed, Duration::from_secs(5));
        assert_eq!(entry.timestamp.timestamp_micros(), 1_700_000_000_123_456);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["fields"]["MESSAGE"], "hello");
        assert_eq!(json["cursor"], "s=abc;i=10");
        assert_eq!(json["elapsed"], 5_000_000);
        assert!(json["timestamp"]
            .as_str()
            .unwrap()
            .starts_with("2023-11-14T22:13:20.123456"));
    }

    #[test]
    fn test_display_is_pretty_json() {
        let text = sample().to_string();
        assert!(text.contains("\n"));
        let back: Entry = serde_json::from_str(&text).unwrap();
        assert_eq!(back, sample());
    }
}
