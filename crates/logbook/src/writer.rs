//! JSON-line writer adapter
//!
//! [`JournalWriter`] lets a structured logger write straight into a store.
//! Each write carries one or more JSON objects, such as the output of
//! `tracing-subscriber`'s JSON formatter; every object becomes one record.
//!
//! Key translation:
//! - `message`, `msg`, `@m` (also under a nested `fields` object) become `MESSAGE`
//! - `level`, `@l` become `PRIORITY`; unknown levels map to info
//! - `timestamp`, `time`, `@t` and other `@` keys are dropped, the store
//!   stamps records itself
//! - everything else is upper-cased into a valid field name, nested
//!   objects flattened with `_`

use crate::submit::submit_with_fields;
use logbook_core::{Fields, JournalStore, LogbookError, Priority, Result};
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;

/// An [`io::Write`] sink translating JSON log records into store records
#[derive(Clone)]
pub struct JournalWriter {
    store: Arc<dyn JournalStore>,
}

impl JournalWriter {
    pub fn new(store: Arc<dyn JournalStore>) -> Self {
        Self { store }
    }

    /// Translate and submit every JSON object in `buf`
    pub fn write_record(&self, buf: &[u8]) -> Result<usize> {
        let mut written = 0;
        for object in serde_json::Deserializer::from_slice(buf).into_iter::<Map<String, Value>>() {
            let object = object?;
            if object.is_empty() {
                return Err(LogbookError::Validation(
                    "structured log record has no keys".into(),
                ));
            }

            let record = Translated::from_object(object);
            submit_with_fields(
                &*self.store,
                record.priority,
                &record.message,
                &record.fields,
            )?;
            written += 1;
        }

        if written == 0 {
            return Err(LogbookError::Validation(
                "no structured log record in write".into(),
            ));
        }
        Ok(written)
    }
}

impl io::Write for JournalWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_record(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Translated {
    message: String,
    priority: Priority,
    fields: Fields,
}

impl Translated {
    fn from_object(object: Map<String, Value>) -> Self {
        let mut record = Self::default();
        for (key, value) in object {
            record.visit(&key, None, value);
        }
        record
    }

    fn visit(&mut self, key: &str, parent: Option<&str>, value: Value) {
        if key.is_empty() {
            return;
        }

        match (parent, key) {
            (None | Some("fields"), "message" | "msg" | "@m") => {
                self.message = render(&value);
                return;
            }
            (None, "level" | "@l") => {
                self.priority = render(&value).parse().unwrap_or_default();
                return;
            }
            (None, "timestamp" | "time" | "@t") => return,
            _ => {}
        }
        if key.starts_with('@') {
            return;
        }

        let path = match parent {
            Some(parent) => format!("{}_{}", parent, key),
            None => key.to_string(),
        };

        match value {
            Value::Object(children) => {
                for (child, value) in children {
                    self.visit(&child, Some(&path), value);
                }
            }
            other => {
                if let Some(name) = field_name(&path) {
                    self.fields.insert(name, render(&other));
                }
            }
        }
    }
}

/// Map an arbitrary key onto `[A-Z0-9_]+` without a leading `_`
fn field_name(key: &str) -> Option<String> {
    let name: String = key
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            c @ ('A'..='Z' | '0'..='9') => c,
            _ => '_',
        })
        .collect();
    let name = name.trim_start_matches('_');
    (!name.is_empty()).then(|| name.to_string())
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn translate(value: Value) -> Translated {
        match value {
            Value::Object(object) => Translated::from_object(object),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_well_known_keys() {
        let record = translate(json!({
            "timestamp": "2024-01-01T00:00:00Z",
            "level": "WARN",
            "message": "low disk",
            "@x": "dropped",
            "target": "app::disk",
        }));
        assert_eq!(record.message, "low disk");
        assert_eq!(record.priority, Priority::Warning);
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields.get("TARGET"), Some("app::disk"));
    }

    #[test]
    fn test_nested_fields_flatten() {
        let record = translate(json!({
            "fields": { "message": "hello", "user.id": 42 },
            "span": { "name": "req" },
        }));
        assert_eq!(record.message, "hello");
        assert_eq!(record.fields.get("FIELDS_USER_ID"), Some("42"));
        assert_eq!(record.fields.get("SPAN_NAME"), Some("req"));
    }

    #[test]
    fn test_unknown_level_is_info() {
        let record = translate(json!({ "@l": "Verbose", "@m": "x" }));
        assert_eq!(record.priority, Priority::Info);
        assert_eq!(record.message, "x");
    }

    #[test]
    fn test_field_name_mapping() {
        assert_eq!(field_name("request-id").as_deref(), Some("REQUEST_ID"));
        assert_eq!(field_name("_private").as_deref(), Some("PRIVATE"));
        assert_eq!(field_name("___"), None);
    }
}
