use crate::format::Record;
use crate::session::FileSession;
use chrono::{DateTime, Utc};
use logbook_core::{JournalStore, LogbookError, OpenOptions, Result, Session};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions as FsOpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub(crate) const LOG_FILE: &str = "journal.log";
const META_FILE: &str = "meta.json";
const FORMAT_VERSION: u32 = 1;

/// Configuration for a file-backed journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileJournalConfig {
    /// Directory holding `meta.json` and `journal.log`
    pub path: PathBuf,

    /// Interval at which waiting sessions poll the log file (default: 10ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether to `fsync` after each append (default: false)
    ///
    /// Appends always reach the OS page cache before returning; syncing
    /// additionally survives power loss at a large latency cost.
    #[serde(default)]
    pub sync_on_append: bool,

    /// Maximum encoded size of one record in bytes (default: 64MB)
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,

    /// Maximum number of fields in one record (default: 1024)
    #[serde(default = "default_max_fields")]
    pub max_fields: usize,
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_max_record_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_max_fields() -> usize {
    1024
}

impl FileJournalConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval_ms: default_poll_interval_ms(),
            sync_on_append: false,
            max_record_bytes: default_max_record_bytes(),
            max_fields: default_max_fields(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }

    pub fn with_sync_on_append(mut self, enabled: bool) -> Self {
        self.sync_on_append = enabled;
        self
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }

    pub fn with_max_fields(mut self, max: usize) -> Self {
        self.max_fields = max;
        self
    }
}

/// Metadata stored in meta.json
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreMeta {
    store_id: String,
    created_at: DateTime<Utc>,
    format_version: u32,
}

/// File-backed journal store
///
/// Every session opened from it reads the same log file independently;
/// appends from any thread are serialized by the writer lock.
pub struct FileJournal {
    config: FileJournalConfig,
    meta: StoreMeta,
    name: String,
    writer: Mutex<File>,
    boot_offset: Duration,
    opened_at: Instant,
}

impl FileJournal {
    /// Open or create a journal in the configured directory
    pub fn open(config: FileJournalConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.path)?;

        let meta_path = config.path.join(META_FILE);
        let meta = if meta_path.exists() {
            let data = std::fs::read_to_string(&meta_path)?;
            let meta: StoreMeta = serde_json::from_str(&data).map_err(|e| {
                LogbookError::Serialization(format!("Failed to parse meta.json: {}", e))
            })?;
            if meta.format_version != FORMAT_VERSION {
                return Err(LogbookError::Config(format!(
                    "unsupported journal format version {} (expected {})",
                    meta.format_version, FORMAT_VERSION
                )));
            }
            meta
        } else {
            let meta = StoreMeta {
                store_id: uuid::Uuid::new_v4().simple().to_string(),
                created_at: Utc::now(),
                format_version: FORMAT_VERSION,
            };
            std::fs::write(&meta_path, serde_json::to_string(&meta)?)?;
            tracing::info!(
                "Created file journal {} at {}",
                meta.store_id,
                config.path.display()
            );
            meta
        };

        let file = FsOpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::log_file_path(&config.path))?;

        Ok(Self {
            name: format!("file:{}", config.path.display()),
            config,
            meta,
            writer: Mutex::new(file),
            boot_offset: uptime(),
            opened_at: Instant::now(),
        })
    }

    /// Open or create a journal with default settings
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(FileJournalConfig::new(path))
    }

    fn log_file_path(dir: &Path) -> PathBuf {
        dir.join(LOG_FILE)
    }

    pub fn store_id(&self) -> &str {
        &self.meta.store_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at
    }

    pub fn config(&self) -> &FileJournalConfig {
        &self.config
    }

    /// Open a concrete session, bypassing the trait object
    pub fn session(&self) -> Result<FileSession> {
        FileSession::open(
            self.config.path.clone(),
            self.meta.store_id.clone(),
            Duration::from_millis(self.config.poll_interval_ms),
        )
    }

    /// Flush appended data to disk
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().sync_all()?;
        Ok(())
    }

    fn monotonic_usec(&self) -> u64 {
        (self.boot_offset + self.opened_at.elapsed()).as_micros() as u64
    }

    fn check_payloads(&self, payloads: &[Vec<u8>]) -> Result<()> {
        if payloads.is_empty() {
            return Err(LogbookError::Write("cannot append an empty record".into()));
        }
        if payloads.len() > self.config.max_fields {
            return Err(LogbookError::Write(format!(
                "record has {} fields, limit is {}",
                payloads.len(),
                self.config.max_fields
            )));
        }
        for payload in payloads {
            match payload.iter().position(|b| *b == b'=') {
                Some(eq) if eq > 0 => {}
                _ => {
                    return Err(LogbookError::Write(format!(
                        "malformed field payload '{}'",
                        String::from_utf8_lossy(payload)
                    )))
                }
            }
        }
        Ok(())
    }
}

impl JournalStore for FileJournal {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(&self, _options: &OpenOptions) -> Result<Box<dyn Session>> {
        let session = self
            .session()
            .map_err(|e| LogbookError::Open(format!("{}: {}", self.name, e)))?;
        Ok(Box::new(session))
    }

    fn append(&self, payloads: &[Vec<u8>]) -> Result<()> {
        self.check_payloads(payloads)?;

        let realtime_usec = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
        let record = Record {
            realtime_usec,
            monotonic_usec: self.monotonic_usec(),
            payloads: payloads.to_vec(),
        };
        let bytes = record.encode()?;

        if bytes.len() > self.config.max_record_bytes {
            return Err(LogbookError::Write(format!(
                "record size {} exceeds max_record_bytes {}",
                bytes.len(),
                self.config.max_record_bytes
            )));
        }

        // One write per record keeps concurrent appends from interleaving
        let mut writer = self.writer.lock();
        writer.write_all(&bytes)?;
        if self.config.sync_on_append {
            writer.sync_data()?;
        }

        Ok(())
    }
}

/// Time since boot, used as the monotonic base of appended records.
/// Zero where the host does not expose it.
fn uptime() -> Duration {
    std::fs::read_to_string("/proc/uptime")
        .ok()
        .and_then(|text| text.split_whitespace().next()?.parse::<f64>().ok())
        .map(Duration::from_secs_f64)
        .unwrap_or_default()
}
