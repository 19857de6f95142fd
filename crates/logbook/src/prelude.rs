//! Logbook Prelude
//!
//! ```
//! use logbook::prelude::*;
//! ```

pub use crate::{
    Connection, Cursor, Entry, Fields, FollowConfig, FollowHandle, LogbookError, Match,
    OpenOptions, Priority, Result, WakeupEvent,
};

pub use crate::{submit, submit_with_fields, JournalWriter};

// Stores
pub use crate::{FileJournal, FileJournalConfig, JournalStore};

#[cfg(all(feature = "systemd", target_os = "linux"))]
pub use crate::SystemJournal;
