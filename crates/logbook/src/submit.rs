//! Writing records
//!
//! Submitting is stateless and needs no connection: the store's append
//! path accepts concurrent writers.

use logbook_core::fields::{MESSAGE, PRIORITY};
use logbook_core::{to_payload, validate_field_name, Fields, JournalStore, Priority, Result};

/// Write one record holding just a priority and a message
pub fn submit<S>(store: &S, priority: Priority, message: &str) -> Result<()>
where
    S: JournalStore + ?Sized,
{
    submit_with_fields(store, priority, message, &Fields::new())
}

/// Write one record with extra fields.
///
/// Every field name is validated before anything is written; a single bad
/// name rejects the record. `PRIORITY` and `MESSAGE` in `fields` take
/// precedence over the `priority` and `message` arguments.
pub fn submit_with_fields<S>(
    store: &S,
    priority: Priority,
    message: &str,
    fields: &Fields,
) -> Result<()>
where
    S: JournalStore + ?Sized,
{
    for name in fields.names() {
        validate_field_name(name)?;
    }

    let mut payloads = Vec::with_capacity(fields.len() + 2);
    if !fields.contains(PRIORITY) {
        payloads.push(to_payload(PRIORITY, priority.to_string().as_bytes()));
    }
    if !fields.contains(MESSAGE) {
        payloads.push(to_payload(MESSAGE, message.as_bytes()));
    }
    payloads.extend(fields.iter().map(|(name, value)| to_payload(name, value)));

    store.append(&payloads)
}
