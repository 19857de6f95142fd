use crate::cursor::FileCursor;
use crate::filter::FilterStack;
use crate::format::{be_u64, decode_header, Record, HEADER_LEN};
use crate::store::LOG_FILE;
use logbook_core::{LogbookError, Result, Session, WakeupEvent};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const DEFAULT_DATA_THRESHOLD: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u64,
    body_len: u64,
    realtime_usec: u64,
}

/// Where the session points between entries, or the entry it addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    Head,
    /// Past the last entry that existed at seek time
    Tail { end: u64 },
    /// At the entry with this offset, inclusive in both directions
    Offset(u64),
    /// Just past the entry at this offset
    After(u64),
    Realtime(u64),
    Entry(usize),
}

/// Reader session over a file journal
///
/// The session keeps its own index of record offsets, extended lazily as
/// the file grows. Reads never block writers.
pub struct FileSession {
    dir: PathBuf,
    store_id: String,
    file: File,
    index: Vec<IndexEntry>,
    scanned_to: u64,
    watched_len: u64,
    location: Location,
    filter: FilterStack,
    current: Option<(usize, Record)>,
    data_pos: usize,
    data_threshold: usize,
    unique: Vec<Vec<u8>>,
    unique_pos: usize,
    poll_interval: Duration,
}

impl FileSession {
    pub(crate) fn open(dir: PathBuf, store_id: String, poll_interval: Duration) -> Result<Self> {
        let file = File::open(dir.join(LOG_FILE))?;
        let watched_len = file.metadata()?.len();

        tracing::debug!("Opened file session on {}", dir.display());

        Ok(Self {
            dir,
            store_id,
            file,
            index: Vec::new(),
            scanned_to: 0,
            watched_len,
            location: Location::Head,
            filter: FilterStack::new(),
            current: None,
            data_pos: 0,
            data_threshold: DEFAULT_DATA_THRESHOLD,
            unique: Vec::new(),
            unique_pos: 0,
            poll_interval,
        })
    }

    /// Number of complete records indexed so far
    pub fn indexed(&self) -> usize {
        self.index.len()
    }

    fn file_len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Extend the index over records appended since the last scan.
    ///
    /// A file that shrank or whose last indexed record changed was rewritten
    /// underneath the session. Offsets no longer identify the same entries,
    /// so the index is rebuilt and positions tied to offsets restart from
    /// the head.
    fn refresh(&mut self) -> Result<()> {
        let len = self.file_len()?;

        if len < self.scanned_to || !self.last_record_intact()? {
            tracing::warn!(
                "Journal file in {} was rewritten ({} bytes indexed, {} on disk), rebuilding index",
                self.dir.display(),
                self.scanned_to,
                len
            );
            if !matches!(self.location, Location::Realtime(_)) {
                self.location = Location::Head;
            }
            self.index.clear();
            self.scanned_to = 0;
            self.current = None;
            self.data_pos = 0;
        }

        let mut header = [0u8; HEADER_LEN];
        let mut realtime = [0u8; 8];
        while self.scanned_to + HEADER_LEN as u64 <= len {
            let offset = self.scanned_to;
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut header)?;
            let body_len = decode_header(&header)?;

            // Partially written record; picked up on a later refresh
            if offset + HEADER_LEN as u64 + body_len > len {
                break;
            }

            self.file.read_exact(&mut realtime)?;
            self.index.push(IndexEntry {
                offset,
                body_len,
                realtime_usec: be_u64(&realtime)?,
            });
            self.scanned_to = offset + HEADER_LEN as u64 + body_len;
        }

        Ok(())
    }

    /// Whether the last indexed record still has the header and timestamp
    /// it was indexed with
    fn last_record_intact(&mut self) -> Result<bool> {
        let Some(last) = self.index.last().copied() else {
            return Ok(true);
        };

        let mut head = [0u8; HEADER_LEN + 8];
        self.file.seek(SeekFrom::Start(last.offset))?;
        match self.file.read_exact(&mut head) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        let same_len = matches!(decode_header(&head[..HEADER_LEN]), Ok(n) if n == last.body_len);
        let same_time = matches!(be_u64(&head[HEADER_LEN..]), Ok(t) if t == last.realtime_usec);
        Ok(same_len && same_time)
    }

    /// Index position of the entry a cursor addresses, if it still exists
    fn locate(&mut self, cursor: &FileCursor) -> Result<Option<usize>> {
        if cursor.store_id != self.store_id {
            return Ok(None);
        }
        self.refresh()?;
        let found = self
            .index
            .binary_search_by_key(&cursor.offset, |e| e.offset)
            .ok()
            .filter(|&i| self.index[i].realtime_usec == cursor.realtime_usec);
        Ok(found)
    }

    fn read_record(&mut self, i: usize) -> Result<Record> {
        let entry = self.index[i];
        let mut body = vec![0u8; entry.body_len as usize];
        self.file
            .seek(SeekFrom::Start(entry.offset + HEADER_LEN as u64))?;
        self.file.read_exact(&mut body)?;
        Record::decode_body(&body)
    }

    fn load(&mut self, i: usize) -> Result<()> {
        if matches!(self.current, Some((cached, _)) if cached == i) {
            return Ok(());
        }
        let record = self.read_record(i)?;
        self.current = Some((i, record));
        Ok(())
    }

    fn entry_matches(&mut self, i: usize) -> Result<bool> {
        if self.filter.is_empty() {
            return Ok(true);
        }
        self.load(i)?;
        Ok(self
            .current
            .as_ref()
            .is_some_and(|(_, record)| self.filter.matches(&record.payloads)))
    }

    fn current_index(&self) -> Result<usize> {
        match self.location {
            Location::Entry(i) => Ok(i),
            _ => Err(LogbookError::NoCurrentEntry),
        }
    }

    fn current_record(&mut self) -> Result<&Record> {
        let i = self.current_index()?;
        self.load(i)?;
        match &self.current {
            Some((_, record)) => Ok(record),
            None => Err(LogbookError::NoCurrentEntry),
        }
    }

    fn move_to(&mut self, i: usize) -> u64 {
        self.location = Location::Entry(i);
        self.data_pos = 0;
        1
    }

    fn step_forward(&mut self) -> Result<u64> {
        self.refresh()?;

        let start = match self.location {
            Location::Head => 0,
            Location::Tail { end } => self.index.partition_point(|e| e.offset < end),
            Location::Offset(o) => self.index.partition_point(|e| e.offset < o),
            Location::After(o) => self.index.partition_point(|e| e.offset <= o),
            Location::Realtime(t) => self
                .index
                .iter()
                .position(|e| e.realtime_usec >= t)
                .unwrap_or(self.index.len()),
            Location::Entry(i) => i + 1,
        };

        for i in start..self.index.len() {
            if self.entry_matches(i)? {
                return Ok(self.move_to(i));
            }
        }
        Ok(0)
    }

    fn step_backward(&mut self) -> Result<u64> {
        self.refresh()?;

        let end = match self.location {
            Location::Head => return Ok(0),
            Location::Tail { .. } => self.index.len(),
            Location::Offset(o) => self.index.partition_point(|e| e.offset <= o),
            Location::After(o) => self.index.partition_point(|e| e.offset <= o),
            Location::Realtime(t) => self
                .index
                .iter()
                .rposition(|e| e.realtime_usec <= t)
                .map_or(0, |p| p + 1),
            Location::Entry(i) => i,
        };

        for i in (0..end).rev() {
            if self.entry_matches(i)? {
                return Ok(self.move_to(i));
            }
        }
        Ok(0)
    }

    fn seek(&mut self, location: Location) {
        self.location = location;
        self.data_pos = 0;
    }
}

/// Cap a payload at the data threshold, never cutting into the field name
fn apply_threshold(payload: &[u8], threshold: usize) -> Vec<u8> {
    if threshold == 0 {
        return payload.to_vec();
    }
    let name_len = payload.iter().position(|b| *b == b'=').unwrap_or(0);
    let limit = threshold.max(name_len + 1);
    payload[..payload.len().min(limit)].to_vec()
}

impl Session for FileSession {
    fn seek_head(&mut self) -> Result<()> {
        self.seek(Location::Head);
        Ok(())
    }

    fn seek_tail(&mut self) -> Result<()> {
        self.refresh()?;
        self.seek(Location::Tail {
            end: self.scanned_to,
        });
        Ok(())
    }

    fn seek_realtime_usec(&mut self, usec: u64) -> Result<()> {
        self.seek(Location::Realtime(usec));
        Ok(())
    }

    fn seek_cursor(&mut self, cursor: &str) -> Result<()> {
        let parsed = FileCursor::parse(cursor)?;
        if parsed.store_id != self.store_id {
            return Err(LogbookError::Navigation(format!(
                "cursor '{}' belongs to another store",
                cursor
            )));
        }
        if self.locate(&parsed)?.is_none() {
            return Err(LogbookError::Navigation(format!(
                "cursor '{}' addresses an entry that no longer exists",
                cursor
            )));
        }
        self.seek(Location::Offset(parsed.offset));
        Ok(())
    }

    fn next(&mut self) -> Result<u64> {
        self.step_forward()
    }

    fn previous(&mut self) -> Result<u64> {
        self.step_backward()
    }

    fn next_skip(&mut self, n: u64) -> Result<u64> {
        let mut moved = 0;
        while moved < n && self.step_forward()? == 1 {
            moved += 1;
        }
        Ok(moved)
    }

    fn previous_skip(&mut self, n: u64) -> Result<u64> {
        let mut moved = 0;
        while moved < n && self.step_backward()? == 1 {
            moved += 1;
        }
        Ok(moved)
    }

    fn cursor(&mut self) -> Result<String> {
        let entry = self.index[self.current_index()?];
        Ok(FileCursor {
            store_id: self.store_id.clone(),
            offset: entry.offset,
            realtime_usec: entry.realtime_usec,
        }
        .render())
    }

    fn test_cursor(&mut self, cursor: &str) -> Result<bool> {
        let parsed = FileCursor::parse(cursor)?;
        let entry = self.index[self.current_index()?];
        Ok(parsed.store_id == self.store_id
            && parsed.offset == entry.offset
            && parsed.realtime_usec == entry.realtime_usec)
    }

    fn get_data(&mut self, field: &str) -> Result<Vec<u8>> {
        let threshold = self.data_threshold;
        let record = self.current_record()?;
        record
            .field(field)
            .map(|payload| apply_threshold(payload, threshold))
            .ok_or_else(|| LogbookError::FieldNotPresent(field.to_string()))
    }

    fn restart_data(&mut self) {
        self.data_pos = 0;
    }

    fn enumerate_data(&mut self) -> Result<Option<Vec<u8>>> {
        let pos = self.data_pos;
        let threshold = self.data_threshold;
        let payload = self
            .current_record()?
            .payloads
            .get(pos)
            .map(|p| apply_threshold(p, threshold));
        if payload.is_some() {
            self.data_pos += 1;
        }
        Ok(payload)
    }

    fn realtime_usec(&mut self) -> Result<u64> {
        Ok(self.index[self.current_index()?].realtime_usec)
    }

    fn monotonic_usec(&mut self) -> Result<u64> {
        Ok(self.current_record()?.monotonic_usec)
    }

    fn wait(&mut self, timeout: Option<Duration>) -> Result<WakeupEvent> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let len = self
                .file_len()
                .map_err(|e| LogbookError::Wait(e.to_string()))?;

            if len > self.watched_len {
                self.watched_len = len;
                return Ok(WakeupEvent::Append);
            }
            if len < self.watched_len {
                self.watched_len = len;
                return Ok(WakeupEvent::Invalidate);
            }

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(WakeupEvent::NoOperation);
                    }
                    (deadline - now).min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            std::thread::sleep(pause);
        }
    }

    fn add_match(&mut self, term: &[u8]) -> Result<()> {
        self.filter.add_match(term)
    }

    fn add_conjunction(&mut self) -> Result<()> {
        self.filter.add_conjunction();
        Ok(())
    }

    fn add_disjunction(&mut self) -> Result<()> {
        self.filter.add_disjunction();
        Ok(())
    }

    fn flush_matches(&mut self) {
        self.filter.flush();
    }

    fn query_unique(&mut self, field: &str) -> Result<()> {
        if field.is_empty() || field.contains('=') {
            return Err(LogbookError::Query(format!(
                "invalid field name '{}'",
                field
            )));
        }

        self.refresh()?;
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for i in 0..self.index.len() {
            let record = self.read_record(i)?;
            if let Some(payload) = record.field(field) {
                if seen.insert(payload.to_vec()) {
                    values.push(payload.to_vec());
                }
            }
        }

        self.unique = values;
        self.unique_pos = 0;
        Ok(())
    }

    fn restart_unique(&mut self) {
        self.unique_pos = 0;
    }

    fn enumerate_unique(&mut self) -> Result<Option<Vec<u8>>> {
        let value = self.unique.get(self.unique_pos).cloned();
        if value.is_some() {
            self.unique_pos += 1;
        }
        Ok(value)
    }

    fn usage(&mut self) -> Result<u64> {
        let mut total = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let metadata = entry?.metadata()?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }

    fn set_data_threshold(&mut self, threshold: usize) -> Result<()> {
        self.data_threshold = threshold;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileJournal;
    use logbook_core::JournalStore;
    use tempfile::TempDir;

    fn setup(messages: &[&str]) -> (FileJournal, FileSession, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let journal = FileJournal::open_path(temp_dir.path()).unwrap();
        for message in messages {
            journal
                .append(&[format!("MESSAGE={}", message).into_bytes()])
                .unwrap();
        }
        let session = journal.session().unwrap();
        (journal, session, temp_dir)
    }

    fn message(session: &mut FileSession) -> String {
        String::from_utf8(session.get_data("MESSAGE").unwrap()).unwrap()
    }

    #[test]
    fn test_walk_forward_and_back() {
        let (_journal, mut session, _temp) = setup(&["a", "b", "c"]);

        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=a");
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=c");

        // Boundary leaves the position alone
        assert_eq!(session.next().unwrap(), 0);
        assert_eq!(message(&mut session), "MESSAGE=c");

        assert_eq!(session.previous().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=b");
    }

    #[test]
    fn test_seek_drops_current_entry() {
        let (_journal, mut session, _temp) = setup(&["a"]);
        assert!(matches!(
            session.cursor(),
            Err(LogbookError::NoCurrentEntry)
        ));

        session.next().unwrap();
        assert!(session.cursor().is_ok());

        session.seek_head().unwrap();
        assert!(matches!(
            session.get_data("MESSAGE"),
            Err(LogbookError::NoCurrentEntry)
        ));
    }

    #[test]
    fn test_seek_tail() {
        let (journal, mut session, _temp) = setup(&["a", "b"]);
        session.seek_tail().unwrap();
        assert_eq!(session.next().unwrap(), 0);

        session.seek_tail().unwrap();
        assert_eq!(session.previous().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=b");

        session.seek_tail().unwrap();
        journal.append(&[b"MESSAGE=c".to_vec()]).unwrap();
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=c");
    }

    #[test]
    fn test_cursor_round_trip() {
        let (_journal, mut session, _temp) = setup(&["a", "b", "c"]);
        session.next_skip(2).unwrap();
        let cursor = session.cursor().unwrap();
        assert!(session.test_cursor(&cursor).unwrap());

        session.seek_head().unwrap();
        session.seek_cursor(&cursor).unwrap();
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=b");

        session.seek_cursor(&cursor).unwrap();
        assert_eq!(session.previous().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=b");
    }

    #[test]
    fn test_foreign_cursor_rejected() {
        let (_journal, mut session, _temp) = setup(&["a"]);
        let result = session.seek_cursor("s=deadbeef;i=0;t=0");
        assert!(matches!(result, Err(LogbookError::Navigation(_))));
    }

    #[test]
    fn test_skip_stops_at_boundary() {
        let (_journal, mut session, _temp) = setup(&["a", "b", "c"]);
        assert_eq!(session.next_skip(u64::MAX).unwrap(), 3);
        assert_eq!(session.previous_skip(10).unwrap(), 2);
        assert_eq!(message(&mut session), "MESSAGE=a");
    }

    #[test]
    fn test_filtering() {
        let temp = TempDir::new().unwrap();
        let journal = FileJournal::open_path(temp.path()).unwrap();
        for (unit, message) in [("a", "1"), ("b", "2"), ("a", "3")] {
            journal
                .append(&[
                    format!("MESSAGE={}", message).into_bytes(),
                    format!("UNIT={}", unit).into_bytes(),
                ])
                .unwrap();
        }

        let mut session = journal.session().unwrap();
        session.add_match(b"UNIT=a").unwrap();
        let mut seen = Vec::new();
        while session.next().unwrap() == 1 {
            seen.push(message(&mut session));
        }
        assert_eq!(seen, vec!["MESSAGE=1", "MESSAGE=3"]);

        session.flush_matches();
        session.seek_head().unwrap();
        assert_eq!(session.next_skip(10).unwrap(), 3);
    }

    #[test]
    fn test_missing_field() {
        let (_journal, mut session, _temp) = setup(&["a"]);
        session.next().unwrap();
        assert!(matches!(
            session.get_data("NOPE"),
            Err(LogbookError::FieldNotPresent(name)) if name == "NOPE"
        ));
    }

    #[test]
    fn test_enumerate_data() {
        let temp = TempDir::new().unwrap();
        let journal = FileJournal::open_path(temp.path()).unwrap();
        journal
            .append(&[b"MESSAGE=hi".to_vec(), b"PRIORITY=6".to_vec()])
            .unwrap();

        let mut session = journal.session().unwrap();
        session.next().unwrap();
        assert_eq!(session.enumerate_data().unwrap(), Some(b"MESSAGE=hi".to_vec()));
        assert_eq!(session.enumerate_data().unwrap(), Some(b"PRIORITY=6".to_vec()));
        assert_eq!(session.enumerate_data().unwrap(), None);

        session.restart_data();
        assert_eq!(session.enumerate_data().unwrap(), Some(b"MESSAGE=hi".to_vec()));
    }

    #[test]
    fn test_data_threshold() {
        let (_journal, mut session, _temp) = setup(&["abcdefghij"]);
        session.next().unwrap();

        session.set_data_threshold(10).unwrap();
        assert_eq!(session.get_data("MESSAGE").unwrap(), b"MESSAGE=ab".to_vec());

        // Never truncates into the name
        session.set_data_threshold(2).unwrap();
        assert_eq!(session.get_data("MESSAGE").unwrap(), b"MESSAGE=".to_vec());

        session.set_data_threshold(0).unwrap();
        assert_eq!(message(&mut session), "MESSAGE=abcdefghij");
    }

    #[test]
    fn test_wait_times_out() {
        let (_journal, mut session, _temp) = setup(&[]);
        let started = Instant::now();
        let event = session.wait(Some(Duration::from_millis(30))).unwrap();
        assert_eq!(event, WakeupEvent::NoOperation);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_reports_append() {
        let (journal, mut session, _temp) = setup(&[]);
        journal.append(&[b"MESSAGE=x".to_vec()]).unwrap();
        let event = session.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(event, WakeupEvent::Append);
        assert_eq!(session.next().unwrap(), 1);
    }

    fn truncate(temp: &TempDir) {
        let log = std::fs::OpenOptions::new()
            .write(true)
            .open(temp.path().join(LOG_FILE))
            .unwrap();
        log.set_len(0).unwrap();
    }

    #[test]
    fn test_truncation_invalidates() {
        let (journal, mut session, temp) = setup(&["a", "b"]);
        session.next_skip(2).unwrap();

        truncate(&temp);

        let event = session.wait(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(event, WakeupEvent::Invalidate);
        assert_eq!(session.next().unwrap(), 0);
        assert_eq!(session.indexed(), 0);

        // Entries written at reused offsets are new entries
        journal.append(&[b"MESSAGE=x".to_vec()]).unwrap();
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=x");
    }

    #[test]
    fn test_rewrite_without_wait_restarts_from_head() {
        let (journal, mut session, temp) = setup(&["a", "b", "c"]);
        session.next_skip(3).unwrap();

        truncate(&temp);
        journal.append(&[b"MESSAGE=x".to_vec()]).unwrap();
        journal.append(&[b"MESSAGE=y".to_vec()]).unwrap();

        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=x");
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=y");
    }

    #[test]
    fn test_stale_cursor_rejected() {
        let (journal, mut session, temp) = setup(&["a"]);
        session.next().unwrap();
        let old = session.cursor().unwrap();

        truncate(&temp);
        // Same offset, later timestamp
        std::thread::sleep(Duration::from_millis(2));
        journal.append(&[b"MESSAGE=x".to_vec()]).unwrap();

        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=x");
        assert!(!session.test_cursor(&old).unwrap());
        assert!(matches!(
            session.seek_cursor(&old),
            Err(LogbookError::Navigation(_))
        ));

        let fresh = session.cursor().unwrap();
        assert!(session.test_cursor(&fresh).unwrap());
        session.seek_cursor(&fresh).unwrap();
        assert_eq!(session.next().unwrap(), 1);
        assert_eq!(message(&mut session), "MESSAGE=x");
    }

    #[test]
    fn test_unique_values() {
        let (_journal, mut session, _temp) = setup(&["a", "b", "a"]);
        session.add_match(b"MESSAGE=b").unwrap();
        session.query_unique("MESSAGE").unwrap();

        let mut values = Vec::new();
        while let Some(value) = session.enumerate_unique().unwrap() {
            values.push(value);
        }
        assert_eq!(values, vec![b"MESSAGE=a".to_vec(), b"MESSAGE=b".to_vec()]);

        session.restart_unique();
        assert!(session.enumerate_unique().unwrap().is_some());

        assert!(matches!(
            session.query_unique(""),
            Err(LogbookError::Query(_))
        ));
    }

    #[test]
    fn test_usage_counts_files() {
        let (_journal, mut session, _temp) = setup(&["a"]);
        assert!(session.usage().unwrap() > 0);
    }
}
