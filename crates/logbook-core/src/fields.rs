//! Field catalog and the schema-free field map carried by entries.

use crate::error::{LogbookError, Result};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MESSAGE: &str = "MESSAGE";
pub const MESSAGE_ID: &str = "MESSAGE_ID";
pub const PRIORITY: &str = "PRIORITY";
pub const CODE_FILE: &str = "CODE_FILE";
pub const CODE_LINE: &str = "CODE_LINE";
pub const CODE_FUNC: &str = "CODE_FUNC";
pub const ERRNO: &str = "ERRNO";
pub const INVOCATION_ID: &str = "INVOCATION_ID";
pub const USER_INVOCATION_ID: &str = "USER_INVOCATION_ID";
pub const SYSLOG_FACILITY: &str = "SYSLOG_FACILITY";
pub const SYSLOG_IDENTIFIER: &str = "SYSLOG_IDENTIFIER";
pub const SYSLOG_PID: &str = "SYSLOG_PID";
pub const SYSLOG_TIMESTAMP: &str = "SYSLOG_TIMESTAMP";
pub const SYSLOG_RAW: &str = "SYSLOG_RAW";
pub const DOCUMENTATION: &str = "DOCUMENTATION";
pub const PID: &str = "_PID";
pub const UID: &str = "_UID";
pub const GID: &str = "_GID";
pub const COMM: &str = "_COMM";
pub const EXE: &str = "_EXE";
pub const CMDLINE: &str = "_CMDLINE";
pub const CAP_EFFECTIVE: &str = "_CAP_EFFECTIVE";
pub const AUDIT_SESSION: &str = "_AUDIT_SESSION";
pub const AUDIT_LOGINUID: &str = "_AUDIT_LOGINUID";
pub const SYSTEMD_CGROUP: &str = "_SYSTEMD_CGROUP";
pub const SYSTEMD_SESSION: &str = "_SYSTEMD_SESSION";
pub const SYSTEMD_UNIT: &str = "_SYSTEMD_UNIT";
pub const SYSTEMD_USER_UNIT: &str = "_SYSTEMD_USER_UNIT";
pub const SYSTEMD_OWNER_UID: &str = "_SYSTEMD_OWNER_UID";
pub const SYSTEMD_SLICE: &str = "_SYSTEMD_SLICE";
pub const SELINUX_CONTEXT: &str = "_SELINUX_CONTEXT";
pub const SOURCE_REALTIME_TIMESTAMP: &str = "_SOURCE_REALTIME_TIMESTAMP";
pub const BOOT_ID: &str = "_BOOT_ID";
pub const MACHINE_ID: &str = "_MACHINE_ID";
pub const HOSTNAME: &str = "_HOSTNAME";
pub const TRANSPORT: &str = "_TRANSPORT";
pub const CURSOR: &str = "__CURSOR";
pub const REALTIME_TIMESTAMP: &str = "__REALTIME_TIMESTAMP";
pub const MONOTONIC_TIMESTAMP: &str = "__MONOTONIC_TIMESTAMP";

/// Every well-known field name, user fields first, then trusted (`_`) and
/// address (`__`) fields.
pub const WELL_KNOWN: &[&str] = &[
    MESSAGE,
    MESSAGE_ID,
    PRIORITY,
    CODE_FILE,
    CODE_LINE,
    CODE_FUNC,
    ERRNO,
    INVOCATION_ID,
    USER_INVOCATION_ID,
    SYSLOG_FACILITY,
    SYSLOG_IDENTIFIER,
    SYSLOG_PID,
    SYSLOG_TIMESTAMP,
    SYSLOG_RAW,
    DOCUMENTATION,
    PID,
    UID,
    GID,
    COMM,
    EXE,
    CMDLINE,
    CAP_EFFECTIVE,
    AUDIT_SESSION,
    AUDIT_LOGINUID,
    SYSTEMD_CGROUP,
    SYSTEMD_SESSION,
    SYSTEMD_UNIT,
    SYSTEMD_USER_UNIT,
    SYSTEMD_OWNER_UID,
    SYSTEMD_SLICE,
    SELINUX_CONTEXT,
    SOURCE_REALTIME_TIMESTAMP,
    BOOT_ID,
    MACHINE_ID,
    HOSTNAME,
    TRANSPORT,
    CURSOR,
    REALTIME_TIMESTAMP,
    MONOTONIC_TIMESTAMP,
];

/// Field map of one entry.
///
/// Keys are unique field names exactly as stored. Values are kept as raw
/// bytes so binary data survives unchanged; [`Fields::get`] offers the
/// UTF-8 view most callers want.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, Vec<u8>>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, returning the previous value if the name was present
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.0.insert(name.into(), value.into())
    }

    /// Value of a field as text. `None` when absent or not valid UTF-8.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Fields
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

// Text values serialize as strings; anything else as an array of byte
// values, the way journal JSON exports render binary data.
impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            match std::str::from_utf8(value) {
                Ok(text) => map.serialize_entry(name, text)?,
                Err(_) => map.serialize_entry(name, value.as_slice())?,
            }
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<String, RawValue>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(name, value)| match value {
                RawValue::Text(text) => (name, text.into_bytes()),
                RawValue::Bytes(bytes) => (name, bytes),
            })
            .collect())
    }
}

/// Check a caller-supplied field name before it is written.
///
/// Names must be non-empty, must not start with `_` (reserved for fields
/// the store itself adds), must be upper-case and must not contain `=`.
/// Names are never rewritten here; a failing name rejects the whole record.
pub fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LogbookError::Validation(
            "field name must not be empty".into(),
        ));
    }
    if name.starts_with('_') {
        return Err(LogbookError::Validation(format!(
            "field name '{}' must not begin with '_'",
            name
        )));
    }
    if name.to_uppercase() != name {
        return Err(LogbookError::Validation(format!(
            "field name '{}' must be upper-case",
            name
        )));
    }
    if name.contains('=') {
        return Err(LogbookError::Validation(format!(
            "field name '{}' must not contain '='",
            name
        )));
    }
    Ok(())
}

/// Build the raw `NAME=value` payload the store protocol exchanges.
pub fn to_payload(name: &str, value: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(name.len() + 1 + value.len());
    payload.extend_from_slice(name.as_bytes());
    payload.push(b'=');
    payload.extend_from_slice(value);
    payload
}

/// Split a raw payload on its first `=`.
///
/// Everything before the separator is the name, everything after it
/// (including further `=` bytes) is the value, byte for byte.
pub fn split_payload(payload: &[u8]) -> Result<(String, Vec<u8>)> {
    let eq = payload
        .iter()
        .position(|b| *b == b'=')
        .ok_or_else(|| LogbookError::Read("field payload has no '=' separator".into()))?;

    let name = std::str::from_utf8(&payload[..eq])
        .map_err(|e| LogbookError::Read(format!("field name is not valid UTF-8: {}", e)))?;
    if name.is_empty() {
        return Err(LogbookError::Read("field payload has an empty name".into()));
    }

    Ok((name.to_string(), payload[eq + 1..].to_vec()))
}
