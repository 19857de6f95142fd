//! Concurrent writers and independent reader sessions over one file journal.

use logbook_core::{JournalStore, OpenOptions, Result, Session};
use logbook_file::{FileJournal, FileJournalConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

#[test]
fn test_concurrent_appends_are_not_interleaved() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let journal = Arc::new(FileJournal::open(FileJournalConfig::new(temp_dir.path()))?);

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let journal = Arc::clone(&journal);
            thread::spawn(move || {
                for i in 0..50 {
                    journal
                        .append(&[
                            format!("MESSAGE=writer {} entry {}", w, i).into_bytes(),
                            format!("WRITER={}", w).into_bytes(),
                        ])
                        .unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let mut session = journal.open_session(&OpenOptions::default())?;
    let mut messages = HashSet::new();
    while session.next()? == 1 {
        let payload = session.get_data("MESSAGE")?;
        assert!(session.get_data("WRITER").is_ok());
        messages.insert(payload);
    }
    assert_eq!(messages.len(), 200);

    Ok(())
}

#[test]
fn test_sessions_have_independent_positions() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let journal = FileJournal::open_path(temp_dir.path())?;
    for message in ["a", "b", "c"] {
        journal.append(&[format!("MESSAGE={}", message).into_bytes()])?;
    }

    let mut first = journal.open_session(&OpenOptions::default())?;
    let mut second = journal.open_session(&OpenOptions::default())?;

    first.next_skip(3)?;
    second.next()?;

    assert_eq!(first.get_data("MESSAGE")?, b"MESSAGE=c".to_vec());
    assert_eq!(second.get_data("MESSAGE")?, b"MESSAGE=a".to_vec());

    Ok(())
}

#[test]
fn test_cursors_survive_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let cursor = {
        let journal = FileJournal::open_path(temp_dir.path())?;
        journal.append(&[b"MESSAGE=a".to_vec()])?;
        journal.append(&[b"MESSAGE=b".to_vec()])?;
        let mut session = journal.session()?;
        session.next_skip(2)?;
        session.cursor()?
    };

    let journal = FileJournal::open_path(temp_dir.path())?;
    let mut session = journal.session()?;
    session.seek_cursor(&cursor)?;
    assert_eq!(session.next()?, 1);
    assert_eq!(session.get_data("MESSAGE")?, b"MESSAGE=b".to_vec());
    assert!(session.test_cursor(&cursor)?);

    Ok(())
}

#[test]
fn test_realtime_seek() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let journal = FileJournal::open_path(temp_dir.path())?;
    journal.append(&[b"MESSAGE=a".to_vec()])?;

    let mut session = journal.session()?;
    session.next()?;
    let stamp = session.realtime_usec()?;

    session.seek_realtime_usec(stamp + 1)?;
    assert_eq!(session.next()?, 0);
    session.seek_realtime_usec(stamp + 1)?;
    assert_eq!(session.previous()?, 1);
    session.seek_realtime_usec(0)?;
    assert_eq!(session.next()?, 1);
    assert!(session.monotonic_usec()? > 0);

    Ok(())
}
