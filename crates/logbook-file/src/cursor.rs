use logbook_core::{LogbookError, Result};

/// Parsed form of a file journal cursor: `s=<store id>;i=<offset>;t=<realtime>`
/// with offset and realtime in lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileCursor {
    pub store_id: String,
    pub offset: u64,
    pub realtime_usec: u64,
}

impl FileCursor {
    pub fn render(&self) -> String {
        format!(
            "s={};i={:x};t={:x}",
            self.store_id, self.offset, self.realtime_usec
        )
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut store_id = None;
        let mut offset = None;
        let mut realtime_usec = None;

        for part in text.split(';') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(text))?;
            match key {
                "s" => store_id = Some(value.to_string()),
                "i" => offset = Some(u64::from_str_radix(value, 16).map_err(|_| invalid(text))?),
                "t" => {
                    realtime_usec =
                        Some(u64::from_str_radix(value, 16).map_err(|_| invalid(text))?)
                }
                _ => return Err(invalid(text)),
            }
        }

        match (store_id, offset, realtime_usec) {
            (Some(store_id), Some(offset), Some(realtime_usec)) if !store_id.is_empty() => {
                Ok(Self {
                    store_id,
                    offset,
                    realtime_usec,
                })
            }
            _ => Err(invalid(text)),
        }
    }
}

fn invalid(text: &str) -> LogbookError {
    LogbookError::Navigation(format!("invalid cursor '{}'", text))
}
