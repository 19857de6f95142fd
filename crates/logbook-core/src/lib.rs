//! Logbook Core: types, match expressions and store protocol traits
//!
//! This crate defines the abstractions shared by every logbook backend:
//! - Store protocol: a [`JournalStore`] endpoint that opens [`Session`]s,
//!   the narrow handle-based interface to an append-only field log
//! - Match expressions: a small boolean algebra over `FIELD=value` terms
//!   compiled into the store's two-level filter stack
//! - Entries: decoded records with their field map, cursor and timestamps
//! - The error taxonomy shared by connections, follow workers and writers

pub mod config;
pub mod cursor;
pub mod entry;
pub mod error;
pub mod fields;
pub mod matching;
pub mod priority;
pub mod store;

pub use config::{FollowConfig, OpenOptions};
pub use cursor::Cursor;
pub use entry::Entry;
pub use error::{LogbookError, Result};
pub use fields::{split_payload, to_payload, validate_field_name, Fields};
pub use matching::{FilterOp, Match, MatchTerm};
pub use priority::Priority;
pub use store::{JournalStore, Session, WakeupEvent};
