use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LogbookError {
    #[error("Failed to open journal: {0}")]
    Open(String),

    #[error("Journal connection is closed")]
    ClosedHandle,

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Cursor does not address an entry")]
    NoCurrentEntry,

    #[error("Field not present: {0}")]
    FieldNotPresent(String),

    #[error("No match expression to add")]
    EmptyMatch,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Wait error: {0}")]
    Wait(String),

    /// Completion signal sent to a follow handler after the caller stopped
    /// following. Not a failure.
    #[error("Follow stopped")]
    StreamTerminated,

    #[error("Read error: {0}")]
    Read(String),

    #[error("Filter error: {0}")]
    Filter(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Write error: {0}")]
    Write(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl LogbookError {
    /// True for the sentinel delivered when following was stopped on request.
    pub fn is_terminated(&self) -> bool {
        matches!(self, LogbookError::StreamTerminated)
    }
}

impl From<serde_json::Error> for LogbookError {
    fn from(err: serde_json::Error) -> Self {
        LogbookError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LogbookError>;
