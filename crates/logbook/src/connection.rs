//! Connections: one owned session against a journal store
//!
//! A [`Connection`] owns exactly one native session. Every operation runs
//! under the connection's guard, so accidental concurrent calls are
//! serialized instead of corrupting the session; ordering between callers
//! is whatever order they acquire the guard in.

use chrono::{DateTime, Utc};
use logbook_core::{
    split_payload, Cursor, Entry, Fields, JournalStore, LogbookError, Match, OpenOptions, Result,
    Session, WakeupEvent,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

struct Inner {
    /// `None` once closed
    session: Option<Box<dyn Session>>,
    /// Matches applied since the last flush, in order
    matches: Vec<Match>,
    /// Last threshold set through [`Connection::set_data_threshold`]
    data_threshold: Option<usize>,
}

/// An open session with a journal store
///
/// # Example
///
/// ```no_run
/// use logbook::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<()> {
/// let store = Arc::new(FileJournal::open_path("./journal")?);
/// let conn = Connection::open(store)?;
///
/// conn.add_match(&Match::new().field("SYSLOG_IDENTIFIER", ["sshd"]))?;
/// conn.seek_head()?;
/// while conn.next()? > 0 {
///     let entry = conn.read_entry()?;
///     println!("{}", entry.message().unwrap_or_default());
/// }
/// conn.close();
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    store: Arc<dyn JournalStore>,
    options: OpenOptions,
    inner: Mutex<Inner>,
}

impl Connection {
    /// Open a session with default options
    pub fn open(store: Arc<dyn JournalStore>) -> Result<Self> {
        Self::open_with_options(store, OpenOptions::default())
    }

    pub fn open_with_options(store: Arc<dyn JournalStore>, options: OpenOptions) -> Result<Self> {
        let session = store.open_session(&options).map_err(|e| match e {
            LogbookError::Open(_) => e,
            other => LogbookError::Open(other.to_string()),
        })?;

        tracing::debug!("Opened connection to {}", store.name());

        Ok(Self {
            store,
            options,
            inner: Mutex::new(Inner {
                session: Some(session),
                matches: Vec::new(),
                data_threshold: None,
            }),
        })
    }

    /// Release the native session.
    ///
    /// The session is released exactly once; later calls are no-ops and
    /// every other operation fails with [`LogbookError::ClosedHandle`].
    pub fn close(&self) {
        let session = self.inner.lock().session.take();
        if let Some(session) = session {
            drop(session);
            tracing::debug!("Closed connection to {}", self.store.name());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().session.is_none()
    }

    /// The store this connection reads from
    pub fn store(&self) -> &Arc<dyn JournalStore> {
        &self.store
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    fn with_inner<T>(
        &self,
        op: impl FnOnce(&mut dyn Session, &mut Vec<Match>, &mut Option<usize>) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.inner.lock();
        let Inner {
            session,
            matches,
            data_threshold,
        } = &mut *guard;
        match session.as_deref_mut() {
            Some(session) => op(session, matches, data_threshold),
            None => Err(LogbookError::ClosedHandle),
        }
    }

    fn with_session<T>(&self, op: impl FnOnce(&mut dyn Session) -> Result<T>) -> Result<T> {
        self.with_inner(|session, _, _| op(session))
    }

    // ---- Navigation ----
    //
    // After any seek the connection does not address an entry until a
    // move lands on one.

    pub fn seek_head(&self) -> Result<()> {
        self.with_session(|s| s.seek_head()).map_err(navigation)
    }

    pub fn seek_tail(&self) -> Result<()> {
        self.with_session(|s| s.seek_tail()).map_err(navigation)
    }

    /// Seek to the entry nearest the given wall-clock time
    pub fn seek_timestamp(&self, timestamp: DateTime<Utc>) -> Result<()> {
        let usec = u64::try_from(timestamp.timestamp_micros()).map_err(|_| {
            LogbookError::Navigation(format!("timestamp {} is before the epoch", timestamp))
        })?;
        self.with_session(|s| s.seek_realtime_usec(usec))
            .map_err(navigation)
    }

    /// Seek to a cursor previously returned by [`Connection::cursor`]
    pub fn seek_cursor(&self, cursor: impl AsRef<str>) -> Result<()> {
        let cursor = cursor.as_ref();
        self.with_session(|s| s.seek_cursor(cursor))
            .map_err(navigation)
    }

    /// Move to the next entry. Returns 0 at the end of the journal.
    pub fn next(&self) -> Result<u64> {
        self.with_session(|s| s.next()).map_err(navigation)
    }

    /// Move to the previous entry. Returns 0 at the head of the journal.
    pub fn previous(&self) -> Result<u64> {
        self.with_session(|s| s.previous()).map_err(navigation)
    }

    /// Move `|n|` entries forward (positive) or backward (negative).
    ///
    /// Returns how many entries were actually passed, fewer than `|n|`
    /// when a boundary was hit.
    pub fn skip(&self, n: i64) -> Result<u64> {
        let count = n.unsigned_abs();
        let moved = match n {
            0 => Ok(0),
            n if n > 0 => self.with_session(|s| s.next_skip(count)),
            _ => self.with_session(|s| s.previous_skip(count)),
        };
        moved.map_err(navigation)
    }

    // ---- Reading ----

    /// Cursor of the current entry
    pub fn cursor(&self) -> Result<Cursor> {
        self.with_session(|s| s.cursor()).map(Cursor::new)
    }

    /// Check whether the current entry is the one `cursor` addresses
    pub fn test_cursor(&self, cursor: impl AsRef<str>) -> Result<bool> {
        let cursor = cursor.as_ref();
        self.with_session(|s| s.test_cursor(cursor))
    }

    /// Value of one field of the current entry, lossily decoded as UTF-8
    pub fn field(&self, name: &str) -> Result<String> {
        self.field_bytes(name)
            .map(|value| String::from_utf8_lossy(&value).into_owned())
    }

    /// Raw value of one field of the current entry
    pub fn field_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let payload = self.with_session(|s| s.get_data(name))?;
        let (_, value) = split_payload(&payload)?;
        Ok(value)
    }

    /// Read the whole current entry.
    ///
    /// All fields are read under one hold of the guard; any failure fails
    /// the whole read. A field appearing twice keeps its first value, the
    /// same one [`Connection::field`] returns.
    pub fn read_entry(&self) -> Result<Entry> {
        self.with_session(|session| {
            let realtime = session.realtime_usec()?;
            let monotonic = session.monotonic_usec()?;
            let cursor = session.cursor()?;

            let mut fields = Fields::new();
            session.restart_data();
            while let Some(payload) = session.enumerate_data()? {
                let (name, value) = split_payload(&payload)?;
                if !fields.contains(&name) {
                    fields.insert(name, value);
                }
            }

            Ok(Entry::new(fields, Cursor::new(cursor), realtime, monotonic))
        })
    }

    /// Message catalog text for the current entry
    pub fn catalog(&self) -> Result<String> {
        self.with_session(|s| s.catalog())
    }

    /// Cap the size of field values returned by reads; 0 removes the cap
    pub fn set_data_threshold(&self, threshold: usize) -> Result<()> {
        self.with_inner(|session, _, data_threshold| {
            session.set_data_threshold(threshold)?;
            *data_threshold = Some(threshold);
            Ok(())
        })
    }

    /// Threshold set on this connection, `None` while the store default applies
    pub fn data_threshold(&self) -> Option<usize> {
        self.inner.lock().data_threshold
    }

    // ---- Waiting ----

    /// Block until the store changes or `timeout` elapses.
    ///
    /// `None` waits without a deadline. The connection stays locked for
    /// the duration of the wait.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WakeupEvent> {
        self.with_session(|s| s.wait(timeout)).map_err(|e| match e {
            LogbookError::Io(err) => LogbookError::Wait(err.to_string()),
            other => other,
        })
    }

    // ---- Matching ----

    /// Apply a match expression to this connection's filter.
    ///
    /// Successive matches are ANDed with each other by the store. The match
    /// is retained so followers can rebuild the same filter. When the store
    /// rejects a term part way through, the filter is rebuilt from the
    /// matches retained so far.
    pub fn add_match(&self, expr: &Match) -> Result<()> {
        self.with_inner(|session, matches, _| {
            expr.validate()?;
            if let Err(e) = expr.apply(session) {
                tracing::warn!("Failed to apply match '{}', restoring filter: {}", expr, e);
                session.flush_matches();
                for kept in matches.iter() {
                    kept.apply(session)?;
                }
                return Err(e);
            }
            matches.push(expr.clone());
            Ok(())
        })
    }

    /// Remove every applied match
    pub fn flush_matches(&self) -> Result<()> {
        self.with_inner(|session, matches, _| {
            session.flush_matches();
            matches.clear();
            Ok(())
        })
    }

    /// Matches applied since the last flush, in order
    pub fn matches(&self) -> Vec<Match> {
        self.inner.lock().matches.clone()
    }

    // ---- Store queries ----

    /// Every distinct value stored for `field`, ignoring applied matches.
    ///
    /// The query runs to completion under one hold of the guard; the
    /// returned sequence owns its values and leaves the connection free.
    /// Each call starts a new query.
    pub fn unique_values(&self, field: &str) -> Result<UniqueValues> {
        let prefix_len = field.len() + 1;
        self.with_session(|session| {
            session.query_unique(field)?;
            session.restart_unique();

            let mut values = Vec::new();
            while let Some(payload) = session.enumerate_unique()? {
                let value = payload.get(prefix_len..).unwrap_or_default();
                values.push(String::from_utf8_lossy(value).into_owned());
            }
            Ok(UniqueValues {
                values: values.into_iter(),
            })
        })
    }

    /// Disk space used by the store, in bytes
    pub fn usage(&self) -> Result<u64> {
        self.with_session(|s| s.usage())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("store", &self.store.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn navigation(err: LogbookError) -> LogbookError {
    match err {
        LogbookError::Io(e) => LogbookError::Navigation(e.to_string()),
        other => other,
    }
}

/// Distinct values of one field, in the order the store reported them
#[derive(Debug, Clone)]
pub struct UniqueValues {
    values: std::vec::IntoIter<String>,
}

impl Iterator for UniqueValues {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.values.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl ExactSizeIterator for UniqueValues {}
