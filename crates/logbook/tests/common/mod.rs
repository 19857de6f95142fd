#![allow(dead_code)]

use logbook::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

pub fn store() -> (Arc<FileJournal>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileJournal::open_path(temp_dir.path()).unwrap());
    (store, temp_dir)
}

pub fn store_with(messages: &[&str]) -> (Arc<FileJournal>, TempDir) {
    let (store, temp_dir) = store();
    for message in messages {
        submit(&*store, Priority::Info, message).unwrap();
    }
    (store, temp_dir)
}

/// Read every entry from the current position onwards
pub fn drain(conn: &Connection) -> Vec<Entry> {
    let mut entries = Vec::new();
    while conn.next().unwrap() > 0 {
        entries.push(conn.read_entry().unwrap());
    }
    entries
}

pub fn messages(entries: &[Entry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.message().unwrap_or_default().to_string())
        .collect()
}
