//! Follow/tail workers against a file store.

mod common;

use common::{store, store_with};
use logbook::prelude::*;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn fast() -> FollowConfig {
    FollowConfig::new().with_wait_timeout(Duration::from_millis(20))
}

fn collect_into() -> (
    impl FnMut(Result<Entry>) + Send + 'static,
    Receiver<Result<Entry>>,
) {
    let (tx, rx) = mpsc::channel();
    let handler = move |item: Result<Entry>| {
        let _ = tx.send(item);
    };
    (handler, rx)
}

#[test]
fn test_tail_delivers_only_new_entry() -> Result<()> {
    let (store, _temp) = store_with(&["old-1", "old-2"]);
    let conn = Connection::open(store.clone())?;
    conn.seek_tail()?;

    let (handler, rx) = collect_into();
    let handle = conn.follow_with(fast(), handler)?;

    let writer = {
        let store = store.clone();
        thread::spawn(move || submit(&*store, Priority::Info, "x"))
    };
    writer.join().unwrap()?;

    let entry = rx.recv_timeout(RECV_TIMEOUT).unwrap()?;
    assert_eq!(entry.message(), Some("x"));

    // Nothing else arrives before the stop
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    handle.stop();
    let terminal = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(matches!(terminal, Err(e) if e.is_terminated()));
    handle.join();
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
fn test_follow_survives_truncation() -> Result<()> {
    let (store, temp) = store_with(&["a", "b", "c"]);
    let conn = Connection::open(store.clone())?;

    let (handler, rx) = collect_into();
    let handle = conn.tail_with(fast(), handler)?;

    // Once "ready" arrives the worker is positioned past "c"
    submit(&*store, Priority::Info, "ready")?;
    let entry = rx.recv_timeout(RECV_TIMEOUT).unwrap()?;
    assert_eq!(entry.message(), Some("ready"));

    let log = std::fs::OpenOptions::new()
        .write(true)
        .open(temp.path().join("journal.log"))?;
    log.set_len(0)?;
    submit(&*store, Priority::Info, "x")?;

    let entry = rx.recv_timeout(RECV_TIMEOUT).unwrap()?;
    assert_eq!(entry.message(), Some("x"));

    handle.stop();
    handle.join();
    Ok(())
}

#[test]
fn test_stop_before_any_entry() -> Result<()> {
    let (store, _temp) = store_with(&["old"]);
    let conn = Connection::open(store)?;

    let (handler, rx) = collect_into();
    let handle = conn.tail_with(fast(), handler)?;
    handle.stop();
    handle.join();

    let delivered: Vec<_> = rx.try_iter().collect();
    assert_eq!(delivered.len(), 1);
    assert!(matches!(&delivered[0], Err(LogbookError::StreamTerminated)));
    Ok(())
}

#[test]
fn test_double_stop_is_safe() -> Result<()> {
    let (store, _temp) = store_with(&["old"]);
    let conn = Connection::open(store)?;

    let (handler, rx) = collect_into();
    let handle = conn.tail_with(fast(), handler)?;
    handle.stop();
    handle.stop();
    assert!(handle.is_stopped());
    handle.join();
    handle.join();
    handle.stop();

    let terminals = rx
        .try_iter()
        .filter(|item| matches!(item, Err(LogbookError::StreamTerminated)))
        .count();
    assert_eq!(terminals, 1);
    Ok(())
}

#[test]
fn test_follow_on_empty_store_gets_first_entry() -> Result<()> {
    let (store, _temp) = store();
    let conn = Connection::open(store.clone())?;

    let (handler, rx) = collect_into();
    let handle = conn.follow_with(fast(), handler)?;
    submit(&*store, Priority::Info, "first")?;
    submit(&*store, Priority::Info, "second")?;

    let first = rx.recv_timeout(RECV_TIMEOUT).unwrap()?;
    let second = rx.recv_timeout(RECV_TIMEOUT).unwrap()?;
    assert_eq!(first.message(), Some("first"));
    assert_eq!(second.message(), Some("second"));

    handle.stop();
    handle.join();
    Ok(())
}

#[test]
fn test_follow_keeps_matches() -> Result<()> {
    let (store, _temp) = store();
    let conn = Connection::open(store.clone())?;
    conn.add_match(&Match::new().field("UNIT", ["wanted"]))?;

    let (handler, rx) = collect_into();
    let handle = conn.tail_with(fast(), handler)?;

    for unit in ["other", "wanted", "other", "wanted"] {
        let fields = Fields::from([("UNIT", unit)]);
        submit_with_fields(&*store, Priority::Info, unit, &fields)?;
    }

    for _ in 0..2 {
        let entry = rx.recv_timeout(RECV_TIMEOUT).unwrap()?;
        assert_eq!(entry.field("UNIT"), Some("wanted"));
    }
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    handle.stop();
    handle.join();
    Ok(())
}

#[test]
fn test_follow_from_current_entry_has_no_gaps() -> Result<()> {
    let (store, _temp) = store_with(&["a", "b", "c"]);
    let conn = Connection::open(store.clone())?;
    conn.next()?;

    let (handler, rx) = collect_into();
    let handle = conn.follow_with(fast(), handler)?;
    submit(&*store, Priority::Info, "d")?;

    let mut seen = Vec::new();
    for _ in 0..4 {
        let entry = rx.recv_timeout(RECV_TIMEOUT).unwrap()?;
        seen.push(entry.message().unwrap_or_default().to_string());
    }
    assert_eq!(seen, vec!["a", "b", "c", "d"]);

    handle.stop();
    handle.join();
    Ok(())
}

#[test]
fn test_worker_runs_on_named_thread() -> Result<()> {
    let (store, _temp) = store();
    let conn = Connection::open(store.clone())?;

    let (tx, rx) = mpsc::channel();
    let handle = conn.follow_with(fast().with_thread_name("journal-tail"), move |_| {
        let _ = tx.send(thread::current().name().map(str::to_string));
    })?;
    handle.stop();
    handle.join();

    assert_eq!(
        rx.recv_timeout(RECV_TIMEOUT).unwrap().as_deref(),
        Some("journal-tail")
    );
    Ok(())
}

#[test]
fn test_closed_connection_cannot_follow() {
    let (store, _temp) = store();
    let conn = Connection::open(store).unwrap();
    conn.close();

    let (handler, _rx) = collect_into();
    assert!(matches!(
        conn.follow(handler),
        Err(LogbookError::ClosedHandle)
    ));
}
