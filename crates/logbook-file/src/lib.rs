//! File-backed journal store
//!
//! Implements the logbook store protocol on top of a single append-only
//! file, for local stores, tests and hosts without a system journal.
//!
//! Features:
//! - Length-prefixed records appended with one write each
//! - Byte offsets as sequence numbers, rendered into stable cursors
//! - Native two-level match stack (AND of ORs of per-field conjunctions)
//! - Polling waits that report appends and invalidation (truncation)
//! - Multiple independent reader sessions, concurrent writers

mod cursor;
mod filter;
mod format;
mod session;
mod store;

pub use filter::FilterStack;
pub use format::Record;
pub use session::FileSession;
pub use store::{FileJournal, FileJournalConfig};
