use serde::{Deserialize, Serialize};

/// Options used when opening a session
///
/// The flags select which journal files a system journal session reads;
/// backends without such a distinction ignore them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Only read files generated on the local machine (default: true)
    #[serde(default = "default_true")]
    pub local_only: bool,

    /// Only read volatile runtime files (default: false)
    #[serde(default)]
    pub runtime_only: bool,

    /// Only read system service and kernel files (default: false)
    #[serde(default)]
    pub system: bool,

    /// Only read the current user's files (default: false)
    #[serde(default)]
    pub current_user: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            local_only: default_true(),
            runtime_only: false,
            system: false,
            current_user: false,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local_only(mut self, enabled: bool) -> Self {
        self.local_only = enabled;
        self
    }

    pub fn with_runtime_only(mut self, enabled: bool) -> Self {
        self.runtime_only = enabled;
        self
    }

    pub fn with_system(mut self, enabled: bool) -> Self {
        self.system = enabled;
        self
    }

    pub fn with_current_user(mut self, enabled: bool) -> Self {
        self.current_user = enabled;
        self
    }
}
