use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque position token for one entry.
///
/// Cursors are produced by the store, stay valid across sessions and are
/// ordered only by the store itself; comparing their text is meaningless.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Cursor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Cursor(token)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Cursor(token.to_string())
    }
}
