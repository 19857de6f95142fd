//! Store protocol traits
//!
//! The journal itself is an external service. These traits describe the
//! narrow handle-based protocol the rest of logbook consumes, so the same
//! connection and follow logic runs against the system journal or a local
//! file-backed store.

use crate::config::OpenOptions;
use crate::error::{LogbookError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a bounded wait on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WakeupEvent {
    /// Timeout elapsed with no change
    NoOperation,
    /// New entries were appended
    Append,
    /// Entries were added, removed or changed (rotation, vacuuming)
    Invalidate,
}

/// A store endpoint: opens sessions and accepts appended records.
///
/// Appends are natively safe for concurrent writers; implementations must
/// not require callers to coordinate.
pub trait JournalStore: Send + Sync {
    /// Human readable name for logs
    fn name(&self) -> &str;

    /// Open a new, independent session against the store
    fn open_session(&self, options: &OpenOptions) -> Result<Box<dyn Session>>;

    /// Append one record. Each payload is a raw `NAME=value` field.
    fn append(&self, payloads: &[Vec<u8>]) -> Result<()>;
}

/// One open native session.
///
/// A session is driven by one thread at a time (`Send`, not `Sync`).
/// Dropping it releases the native handle.
///
/// Positioning follows the journal convention: after any seek the session
/// does not address an entry until `next`/`previous` (or a skip) moves
/// onto one. Moves return the number of entries moved; `0` means a
/// boundary was reached and is not an error.
pub trait Session: Send {
    fn seek_head(&mut self) -> Result<()>;

    fn seek_tail(&mut self) -> Result<()>;

    fn seek_realtime_usec(&mut self, usec: u64) -> Result<()>;

    fn seek_cursor(&mut self, cursor: &str) -> Result<()>;

    fn next(&mut self) -> Result<u64>;

    fn previous(&mut self) -> Result<u64>;

    fn next_skip(&mut self, n: u64) -> Result<u64>;

    fn previous_skip(&mut self, n: u64) -> Result<u64>;

    /// Cursor of the current entry; `NoCurrentEntry` when there is none
    fn cursor(&mut self) -> Result<String>;

    fn test_cursor(&mut self, cursor: &str) -> Result<bool>;

    /// Raw `NAME=value` payload of one field of the current entry
    fn get_data(&mut self, field: &str) -> Result<Vec<u8>>;

    fn restart_data(&mut self);

    /// Next raw payload of the current entry, `None` once exhausted
    fn enumerate_data(&mut self) -> Result<Option<Vec<u8>>>;

    fn realtime_usec(&mut self) -> Result<u64>;

    fn monotonic_usec(&mut self) -> Result<u64>;

    /// Block until the store changes or the timeout elapses. `None` waits
    /// without a deadline.
    fn wait(&mut self, timeout: Option<Duration>) -> Result<WakeupEvent>;

    fn add_match(&mut self, term: &[u8]) -> Result<()>;

    fn add_conjunction(&mut self) -> Result<()>;

    fn add_disjunction(&mut self) -> Result<()>;

    fn flush_matches(&mut self);

    /// Start a distinct-value query for a field, ignoring filters
    fn query_unique(&mut self, field: &str) -> Result<()>;

    fn restart_unique(&mut self);

    /// Next raw `NAME=value` payload of the unique query, `None` once exhausted
    fn enumerate_unique(&mut self) -> Result<Option<Vec<u8>>>;

    /// Disk space used by the store, in bytes
    fn usage(&mut self) -> Result<u64>;

    /// Largest field payload returned by reads; `0` disables the limit
    fn set_data_threshold(&mut self, threshold: usize) -> Result<()>;

    /// Message catalog text for the current entry
    fn catalog(&mut self) -> Result<String> {
        Err(LogbookError::Unsupported(
            "message catalog is not available for this store".into(),
        ))
    }
}
