use crate::error::LogbookError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Syslog priority of an entry, stored as its numeric value in `PRIORITY`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Priority {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    #[default]
    Info = 6,
    Debug = 7,
}

impl Priority {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Priority::Emergency),
            1 => Some(Priority::Alert),
            2 => Some(Priority::Critical),
            3 => Some(Priority::Error),
            4 => Some(Priority::Warning),
            5 => Some(Priority::Notice),
            6 => Some(Priority::Info),
            7 => Some(Priority::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Accepts the numeric value or a level name in any case, including the
/// names common logging front-ends use (`trace`, `warn`, `fatal`, ...).
impl FromStr for Priority {
    type Err = LogbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(value) = trimmed.parse::<u8>() {
            return Priority::from_u8(value).ok_or_else(|| {
                LogbookError::Validation(format!("priority {} is out of range 0-7", value))
            });
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "emerg" | "emergency" | "panic" => Ok(Priority::Emergency),
            "alert" => Ok(Priority::Alert),
            "crit" | "critical" | "fatal" => Ok(Priority::Critical),
            "err" | "error" => Ok(Priority::Error),
            "warn" | "warning" => Ok(Priority::Warning),
            "notice" => Ok(Priority::Notice),
            "info" | "informational" => Ok(Priority::Info),
            "debug" | "trace" => Ok(Priority::Debug),
            other => Err(LogbookError::Validation(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}
