//! Logbook: a client for append-only, field-structured system log stores
//!
//! Logbook provides:
//! - **Connections**: positional navigation (seek, step, skip), field and
//!   whole-entry reads, bounded waits and boolean field matching
//! - **Follow/tail**: a worker thread that streams new entries to a
//!   callback or an async stream until stopped
//! - **Submit**: stateless, validated writes of one record at a time
//! - **Writer adapter**: an `io::Write` sink for JSON-formatted log output
//! - **Backends**: a local file store and, with the `systemd` feature, the
//!   host's system journal
//!
//! # Quick Start
//!
//! ```no_run
//! use logbook::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let store = Arc::new(FileJournal::open_path("./journal")?);
//! submit(&*store, Priority::Info, "service started")?;
//!
//! let conn = Connection::open(store)?;
//! let handle = conn.tail(|item| match item {
//!     Ok(entry) => println!("{}", entry.message().unwrap_or_default()),
//!     Err(e) if e.is_terminated() => {}
//!     Err(e) => eprintln!("follow failed: {}", e),
//! })?;
//!
//! // ...
//! handle.stop();
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod follow;
pub mod prelude;
pub mod submit;
pub mod writer;

#[cfg(all(feature = "systemd", target_os = "linux"))]
pub mod systemd;

// Re-export core types
pub use logbook_core::{
    config::{FollowConfig, OpenOptions},
    cursor::Cursor,
    entry::Entry,
    error::{LogbookError, Result},
    fields::{self, Fields},
    matching::{Match, MatchTerm},
    priority::Priority,
    store::{JournalStore, Session, WakeupEvent},
};

// Re-export backends
pub use logbook_file::{FileJournal, FileJournalConfig};

pub use connection::{Connection, UniqueValues};
pub use follow::{FollowHandle, FollowSeed, FollowStart};
pub use submit::{submit, submit_with_fields};
pub use writer::JournalWriter;

#[cfg(all(feature = "systemd", target_os = "linux"))]
pub use systemd::SystemJournal;
