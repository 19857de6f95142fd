//! System journal backend
//!
//! [`SystemJournal`] drives the host's systemd journal through libsystemd.
//! Each session owns one `sd_journal` handle, which is closed when the
//! session is dropped.

mod ffi;

use logbook_core::{JournalStore, LogbookError, OpenOptions, Result, Session, WakeupEvent};
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::io;
use std::ptr::{self, NonNull};
use std::time::Duration;

/// The host's system journal
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemJournal;

impl SystemJournal {
    pub fn new() -> Self {
        Self
    }
}

impl JournalStore for SystemJournal {
    fn name(&self) -> &str {
        "systemd-journal"
    }

    fn open_session(&self, options: &OpenOptions) -> Result<Box<dyn Session>> {
        Ok(Box::new(SdSession::open(options)?))
    }

    fn append(&self, payloads: &[Vec<u8>]) -> Result<()> {
        let iov: Vec<ffi::iovec> = payloads
            .iter()
            .map(|payload| ffi::iovec {
                iov_base: payload.as_ptr().cast(),
                iov_len: payload.len(),
            })
            .collect();
        let count = c_int::try_from(iov.len())
            .map_err(|_| LogbookError::Write("too many fields in one record".into()))?;

        // SAFETY: every iovec points into `payloads`, which outlives the call
        let ret = unsafe { ffi::sd_journal_sendv(iov.as_ptr(), count) };
        check(ret).map_err(|e| LogbookError::Write(format!("failed to send entry: {}", e)))?;
        Ok(())
    }
}

fn check(ret: c_int) -> io::Result<c_int> {
    if ret < 0 {
        Err(io::Error::from_raw_os_error(-ret))
    } else {
        Ok(ret)
    }
}

fn open_flags(options: &OpenOptions) -> c_int {
    let mut flags = 0;
    if options.local_only {
        flags |= ffi::SD_JOURNAL_LOCAL_ONLY;
    }
    if options.runtime_only {
        flags |= ffi::SD_JOURNAL_RUNTIME_ONLY;
    }
    if options.system {
        flags |= ffi::SD_JOURNAL_SYSTEM;
    }
    if options.current_user {
        flags |= ffi::SD_JOURNAL_CURRENT_USER;
    }
    flags
}

/// "No entry at the current position" is reported as EADDRNOTAVAIL
fn position_error(err: io::Error, what: &str) -> LogbookError {
    match err.kind() {
        io::ErrorKind::AddrNotAvailable => LogbookError::NoCurrentEntry,
        _ => LogbookError::Read(format!("failed to read {}: {}", what, err)),
    }
}

fn navigation_error(err: io::Error, what: &str) -> LogbookError {
    LogbookError::Navigation(format!("failed to {}: {}", what, err))
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| LogbookError::Validation(format!("'{}' contains a NUL byte", value)))
}

/// Copy a libsystemd-allocated string and free the original
///
/// SAFETY: `raw` must be a NUL-terminated string allocated with malloc
unsafe fn take_c_string(raw: *mut c_char) -> String {
    let text = CStr::from_ptr(raw).to_string_lossy().into_owned();
    ffi::free(raw.cast());
    text
}

struct SdSession {
    journal: NonNull<ffi::sd_journal>,
}

// SAFETY: an sd_journal handle may move between threads as long as it is
// never used by two at once; `Session` methods take `&mut self`.
unsafe impl Send for SdSession {}

impl SdSession {
    fn open(options: &OpenOptions) -> Result<Self> {
        let mut raw = ptr::null_mut();
        // SAFETY: out-pointer to a local
        let ret = unsafe { ffi::sd_journal_open(&mut raw, open_flags(options)) };
        check(ret).map_err(|e| LogbookError::Open(format!("sd_journal_open: {}", e)))?;

        let journal = NonNull::new(raw)
            .ok_or_else(|| LogbookError::Open("sd_journal_open returned no handle".into()))?;
        tracing::debug!("Opened system journal (flags {:#x})", open_flags(options));
        Ok(Self { journal })
    }

    fn raw(&mut self) -> *mut ffi::sd_journal {
        self.journal.as_ptr()
    }

    /// Run an enumeration call and copy out the payload it points at
    fn enumerate(
        &mut self,
        call: unsafe extern "C" fn(*mut ffi::sd_journal, *mut *const c_void, *mut usize) -> c_int,
        what: &str,
    ) -> Result<Option<Vec<u8>>> {
        let mut data: *const c_void = ptr::null();
        let mut length = 0usize;
        // SAFETY: out-pointers to locals; the data stays valid until the
        // next call on this handle and is copied before that
        let ret = unsafe { call(self.raw(), &mut data, &mut length) };
        match check(ret).map_err(|e| position_error(e, what))? {
            0 => Ok(None),
            _ => Ok(Some(unsafe {
                std::slice::from_raw_parts(data.cast::<u8>(), length).to_vec()
            })),
        }
    }
}

impl Drop for SdSession {
    fn drop(&mut self) {
        // SAFETY: the handle is owned by this session and closed only here
        unsafe { ffi::sd_journal_close(self.journal.as_ptr()) };
    }
}

impl Session for SdSession {
    fn seek_head(&mut self) -> Result<()> {
        check(unsafe { ffi::sd_journal_seek_head(self.raw()) })
            .map_err(|e| navigation_error(e, "seek to head"))?;
        Ok(())
    }

    fn seek_tail(&mut self) -> Result<()> {
        check(unsafe { ffi::sd_journal_seek_tail(self.raw()) })
            .map_err(|e| navigation_error(e, "seek to tail"))?;
        Ok(())
    }

    fn seek_realtime_usec(&mut self, usec: u64) -> Result<()> {
        check(unsafe { ffi::sd_journal_seek_realtime_usec(self.raw(), usec) })
            .map_err(|e| navigation_error(e, "seek to timestamp"))?;
        Ok(())
    }

    fn seek_cursor(&mut self, cursor: &str) -> Result<()> {
        let cursor = c_string(cursor)?;
        check(unsafe { ffi::sd_journal_seek_cursor(self.raw(), cursor.as_ptr()) })
            .map_err(|e| navigation_error(e, "seek to cursor"))?;
        Ok(())
    }

    fn next(&mut self) -> Result<u64> {
        let moved = check(unsafe { ffi::sd_journal_next(self.raw()) })
            .map_err(|e| navigation_error(e, "move to next entry"))?;
        Ok(moved as u64)
    }

    fn previous(&mut self) -> Result<u64> {
        let moved = check(unsafe { ffi::sd_journal_previous(self.raw()) })
            .map_err(|e| navigation_error(e, "move to previous entry"))?;
        Ok(moved as u64)
    }

    fn next_skip(&mut self, n: u64) -> Result<u64> {
        let moved = check(unsafe { ffi::sd_journal_next_skip(self.raw(), n) })
            .map_err(|e| navigation_error(e, "skip forward"))?;
        Ok(moved as u64)
    }

    fn previous_skip(&mut self, n: u64) -> Result<u64> {
        let moved = check(unsafe { ffi::sd_journal_previous_skip(self.raw(), n) })
            .map_err(|e| navigation_error(e, "skip backward"))?;
        Ok(moved as u64)
    }

    fn cursor(&mut self) -> Result<String> {
        let mut raw: *mut c_char = ptr::null_mut();
        check(unsafe { ffi::sd_journal_get_cursor(self.raw(), &mut raw) })
            .map_err(|e| position_error(e, "cursor"))?;
        // SAFETY: on success libsystemd hands over a malloc'd string
        Ok(unsafe { take_c_string(raw) })
    }

    fn test_cursor(&mut self, cursor: &str) -> Result<bool> {
        let cursor = c_string(cursor)?;
        let ret = check(unsafe { ffi::sd_journal_test_cursor(self.raw(), cursor.as_ptr()) })
            .map_err(|e| position_error(e, "cursor"))?;
        Ok(ret > 0)
    }

    fn get_data(&mut self, field: &str) -> Result<Vec<u8>> {
        let name = c_string(field)?;
        let mut data: *const c_void = ptr::null();
        let mut length = 0usize;
        let ret = unsafe {
            ffi::sd_journal_get_data(self.raw(), name.as_ptr(), &mut data, &mut length)
        };
        check(ret).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LogbookError::FieldNotPresent(field.to_string()),
            _ => position_error(e, field),
        })?;
        // SAFETY: valid until the next call on this handle
        Ok(unsafe { std::slice::from_raw_parts(data.cast::<u8>(), length).to_vec() })
    }

    fn restart_data(&mut self) {
        unsafe { ffi::sd_journal_restart_data(self.raw()) }
    }

    fn enumerate_data(&mut self) -> Result<Option<Vec<u8>>> {
        self.enumerate(ffi::sd_journal_enumerate_data, "entry data")
    }

    fn realtime_usec(&mut self) -> Result<u64> {
        let mut usec = 0u64;
        check(unsafe { ffi::sd_journal_get_realtime_usec(self.raw(), &mut usec) })
            .map_err(|e| position_error(e, "realtime timestamp"))?;
        Ok(usec)
    }

    fn monotonic_usec(&mut self) -> Result<u64> {
        let mut usec = 0u64;
        let mut boot_id = ffi::sd_id128_t::default();
        check(unsafe { ffi::sd_journal_get_monotonic_usec(self.raw(), &mut usec, &mut boot_id) })
            .map_err(|e| position_error(e, "monotonic timestamp"))?;
        Ok(usec)
    }

    fn wait(&mut self, timeout: Option<Duration>) -> Result<WakeupEvent> {
        let timeout_usec = timeout.map_or(u64::MAX, |t| t.as_micros().min(u64::MAX as u128 - 1) as u64);
        let ret = check(unsafe { ffi::sd_journal_wait(self.raw(), timeout_usec) })
            .map_err(|e| LogbookError::Wait(e.to_string()))?;
        match ret {
            ffi::SD_JOURNAL_NOP => Ok(WakeupEvent::NoOperation),
            ffi::SD_JOURNAL_APPEND => Ok(WakeupEvent::Append),
            ffi::SD_JOURNAL_INVALIDATE => Ok(WakeupEvent::Invalidate),
            other => Err(LogbookError::Wait(format!("unknown wakeup event {}", other))),
        }
    }

    fn add_match(&mut self, term: &[u8]) -> Result<()> {
        check(unsafe { ffi::sd_journal_add_match(self.raw(), term.as_ptr().cast(), term.len()) })
            .map_err(|e| {
                LogbookError::Filter(format!(
                    "failed to add match '{}': {}",
                    String::from_utf8_lossy(term),
                    e
                ))
            })?;
        Ok(())
    }

    fn add_conjunction(&mut self) -> Result<()> {
        check(unsafe { ffi::sd_journal_add_conjunction(self.raw()) })
            .map_err(|e| LogbookError::Filter(format!("failed to add conjunction: {}", e)))?;
        Ok(())
    }

    fn add_disjunction(&mut self) -> Result<()> {
        check(unsafe { ffi::sd_journal_add_disjunction(self.raw()) })
            .map_err(|e| LogbookError::Filter(format!("failed to add disjunction: {}", e)))?;
        Ok(())
    }

    fn flush_matches(&mut self) {
        unsafe { ffi::sd_journal_flush_matches(self.raw()) }
    }

    fn query_unique(&mut self, field: &str) -> Result<()> {
        let name = c_string(field)?;
        check(unsafe { ffi::sd_journal_query_unique(self.raw(), name.as_ptr()) })
            .map_err(|e| LogbookError::Query(format!("failed to query '{}': {}", field, e)))?;
        Ok(())
    }

    fn restart_unique(&mut self) {
        unsafe { ffi::sd_journal_restart_unique(self.raw()) }
    }

    fn enumerate_unique(&mut self) -> Result<Option<Vec<u8>>> {
        self.enumerate(ffi::sd_journal_enumerate_unique, "unique values")
            .map_err(|e| LogbookError::Query(e.to_string()))
    }

    fn usage(&mut self) -> Result<u64> {
        let mut bytes = 0u64;
        check(unsafe { ffi::sd_journal_get_usage(self.raw(), &mut bytes) })
            .map_err(|e| LogbookError::Query(format!("failed to get usage: {}", e)))?;
        Ok(bytes)
    }

    fn set_data_threshold(&mut self, threshold: usize) -> Result<()> {
        check(unsafe { ffi::sd_journal_set_data_threshold(self.raw(), threshold) })
            .map_err(|e| LogbookError::Config(format!("failed to set data threshold: {}", e)))?;
        Ok(())
    }

    fn catalog(&mut self) -> Result<String> {
        let mut raw: *mut c_char = ptr::null_mut();
        check(unsafe { ffi::sd_journal_get_catalog(self.raw(), &mut raw) })
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    LogbookError::Unsupported("no catalog entry for this message".into())
                }
                _ => position_error(e, "catalog"),
            })?;
        Ok(unsafe { take_c_string(raw) })
    }
}
