//! Follow/tail engine
//!
//! Following captures where a connection stands and which matches it has
//! applied into a [`FollowSeed`], then rebuilds that state on a fresh
//! connection owned by a dedicated worker thread. The worker streams every
//! later entry to a handler until it is stopped or an operation fails.
//!
//! The handler sees entries as `Ok(entry)` and exactly one terminal
//! `Err(..)`: [`LogbookError::StreamTerminated`] after a stop request,
//! otherwise the error that ended the worker.
//!
//! Stopping is cooperative. The worker checks the stop flag right after a
//! move finds a new entry and before every wait cycle, so one entry may
//! still be delivered after [`FollowHandle::stop`] returns.

use crate::connection::Connection;
use futures::stream::BoxStream;
use futures::StreamExt;
use logbook_core::{
    Cursor, Entry, FollowConfig, JournalStore, LogbookError, Match, OpenOptions, Result,
    WakeupEvent,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Where a follow worker starts reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", content = "cursor", rename_all = "snake_case")]
pub enum FollowStart {
    /// From the first entry; used when the store holds no entries yet
    Head,
    /// From the entry at this cursor, inclusive
    Cursor(Cursor),
    /// From the first entry after this cursor
    After(Cursor),
}

/// Replayable state needed to rebuild a connection on the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowSeed {
    pub start: FollowStart,
    /// Applied in order on the worker's connection
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub options: OpenOptions,
    /// Data threshold set on the parent connection, if any
    #[serde(default)]
    pub data_threshold: Option<usize>,
}

impl FollowSeed {
    pub fn new(start: FollowStart) -> Self {
        Self {
            start,
            matches: Vec::new(),
            options: OpenOptions::default(),
            data_threshold: None,
        }
    }

    pub fn with_match(mut self, expr: Match) -> Self {
        self.matches.push(expr);
        self
    }

    pub fn with_options(mut self, options: OpenOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_data_threshold(mut self, threshold: usize) -> Self {
        self.data_threshold = Some(threshold);
        self
    }
}

/// Stop handle for a running follow worker
///
/// Dropping the handle does not stop the worker.
#[derive(Debug)]
pub struct FollowHandle {
    shutdown: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FollowHandle {
    /// Ask the worker to stop. Safe to call any number of times.
    pub fn stop(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            tracing::debug!("Follow stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map_or(true, |worker| worker.is_finished())
    }

    /// Wait for the worker thread to exit. Does not request a stop.
    pub fn join(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("Follow worker panicked");
            }
        }
    }
}

/// Start a follow worker from an explicit seed.
pub fn spawn<F>(
    store: Arc<dyn JournalStore>,
    seed: FollowSeed,
    config: FollowConfig,
    handler: F,
) -> Result<FollowHandle>
where
    F: FnMut(Result<Entry>) + Send + 'static,
{
    spawn_with_flag(store, seed, config, Arc::new(AtomicBool::new(false)), handler)
}

fn spawn_with_flag<F>(
    store: Arc<dyn JournalStore>,
    seed: FollowSeed,
    config: FollowConfig,
    shutdown: Arc<AtomicBool>,
    mut handler: F,
) -> Result<FollowHandle>
where
    F: FnMut(Result<Entry>) + Send + 'static,
{
    let flag = Arc::clone(&shutdown);
    let worker = thread::Builder::new()
        .name(config.thread_name.clone())
        .spawn(move || {
            tracing::debug!("Follow worker started on {} from {:?}", store.name(), seed.start);

            let terminal = match stream(store, &seed, &config, &flag, &mut handler) {
                Ok(()) => {
                    tracing::debug!("Follow worker stopped");
                    LogbookError::StreamTerminated
                }
                Err(e) => {
                    tracing::warn!("Follow worker failed: {}", e);
                    e
                }
            };
            handler(Err(terminal));
        })?;

    Ok(FollowHandle {
        shutdown,
        worker: Mutex::new(Some(worker)),
    })
}

/// Worker loop. Returns `Ok(())` only when a stop was requested.
fn stream<F>(
    store: Arc<dyn JournalStore>,
    seed: &FollowSeed,
    config: &FollowConfig,
    shutdown: &AtomicBool,
    handler: &mut F,
) -> Result<()>
where
    F: FnMut(Result<Entry>),
{
    let conn = Connection::open_with_options(store, seed.options.clone())?;
    for expr in &seed.matches {
        conn.add_match(expr)?;
    }
    if let Some(threshold) = seed.data_threshold {
        conn.set_data_threshold(threshold)?;
    }

    match &seed.start {
        FollowStart::Head => conn.seek_head()?,
        FollowStart::Cursor(cursor) => conn.seek_cursor(cursor)?,
        FollowStart::After(cursor) => {
            conn.seek_cursor(cursor)?;
            conn.next()?;
        }
    }

    let stopped = || shutdown.load(Ordering::SeqCst);
    let timeout = Some(config.wait_timeout());

    loop {
        if conn.next()? > 0 {
            if stopped() {
                return Ok(());
            }
            handler(Ok(conn.read_entry()?));
            continue;
        }

        loop {
            if stopped() {
                return Ok(());
            }
            match conn.wait(timeout)? {
                WakeupEvent::NoOperation => continue,
                WakeupEvent::Append | WakeupEvent::Invalidate => break,
            }
        }
    }
}

impl Connection {
    /// Capture the state a follow worker needs to continue from here.
    ///
    /// When the connection addresses no entry it is treated as being at the
    /// tail: it is moved to the last entry and the seed starts after it.
    /// This repositions the connection.
    pub fn follow_seed(&self) -> Result<FollowSeed> {
        let start = match self.cursor() {
            Ok(cursor) => FollowStart::Cursor(cursor),
            Err(LogbookError::NoCurrentEntry) => {
                self.seek_tail()?;
                self.previous()?;
                match self.cursor() {
                    Ok(cursor) => FollowStart::After(cursor),
                    Err(LogbookError::NoCurrentEntry) => FollowStart::Head,
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        Ok(FollowSeed {
            start,
            matches: self.matches(),
            options: self.options().clone(),
            data_threshold: self.data_threshold(),
        })
    }

    /// Follow from the current position with default settings
    pub fn follow<F>(&self, handler: F) -> Result<FollowHandle>
    where
        F: FnMut(Result<Entry>) + Send + 'static,
    {
        self.follow_with(FollowConfig::default(), handler)
    }

    /// Follow from the current position.
    ///
    /// Failing to read the starting cursor is returned here and no worker
    /// is started; every later error reaches `handler`.
    pub fn follow_with<F>(&self, config: FollowConfig, handler: F) -> Result<FollowHandle>
    where
        F: FnMut(Result<Entry>) + Send + 'static,
    {
        let seed = self.follow_seed()?;
        spawn(Arc::clone(self.store()), seed, config, handler)
    }

    /// Follow only entries appended after this call
    pub fn tail<F>(&self, handler: F) -> Result<FollowHandle>
    where
        F: FnMut(Result<Entry>) + Send + 'static,
    {
        self.tail_with(FollowConfig::default(), handler)
    }

    pub fn tail_with<F>(&self, config: FollowConfig, handler: F) -> Result<FollowHandle>
    where
        F: FnMut(Result<Entry>) + Send + 'static,
    {
        self.seek_tail()?;
        self.follow_with(config, handler)
    }

    /// Follow from the current position as an async stream.
    ///
    /// The stream ends after a stop request or after yielding the error
    /// that ended the worker. Dropping the stream stops the worker once it
    /// next delivers.
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let (mut entries, handle) = conn.follow_stream(FollowConfig::default())?;
    /// while let Some(entry) = entries.next().await {
    ///     println!("{}", entry?);
    /// }
    /// ```
    pub fn follow_stream(
        &self,
        config: FollowConfig,
    ) -> Result<(BoxStream<'static, Result<Entry>>, FollowHandle)> {
        let seed = self.follow_seed()?;
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = spawn_with_flag(
            Arc::clone(self.store()),
            seed,
            config,
            shutdown,
            move |item: Result<Entry>| {
                if tx.send(item).is_err() {
                    flag.store(true, Ordering::SeqCst);
                }
            },
        )?;

        let entries = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Some(Err(e)) if e.is_terminated() => None,
                Some(item) => Some((item, rx)),
                None => None,
            }
        })
        .boxed();

        Ok((entries, handle))
    }
}
