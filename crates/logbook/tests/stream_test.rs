//! Follow exposed as an async stream.

mod common;

use common::store_with;
use futures::StreamExt;
use logbook::prelude::*;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn test_stream_yields_new_entries_then_ends() -> Result<()> {
    let (store, _temp) = store_with(&["old"]);
    let conn = Connection::open(store.clone())?;
    conn.seek_tail()?;

    let config = FollowConfig::new().with_wait_timeout(Duration::from_millis(20));
    let (mut entries, handle) = conn.follow_stream(config)?;

    submit(&*store, Priority::Info, "one")?;
    submit(&*store, Priority::Info, "two")?;

    let first = tokio::time::timeout(Duration::from_secs(5), entries.next())
        .await
        .expect("first entry")
        .expect("stream open")?;
    let second = tokio::time::timeout(Duration::from_secs(5), entries.next())
        .await
        .expect("second entry")
        .expect("stream open")?;
    assert_eq!(first.message(), Some("one"));
    assert_eq!(second.message(), Some("two"));

    handle.stop();
    let end = tokio::time::timeout(Duration::from_secs(5), entries.next())
        .await
        .expect("stream end");
    assert!(end.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_stream_stops_worker() -> Result<()> {
    let (store, _temp) = store_with(&["old"]);
    let conn = Connection::open(store.clone())?;
    conn.seek_tail()?;

    let config = FollowConfig::new().with_wait_timeout(Duration::from_millis(20));
    let (entries, handle) = conn.follow_stream(config)?;
    drop(entries);

    // The next delivery notices the receiver is gone
    submit(&*store, Priority::Info, "unseen")?;
    tokio::task::spawn_blocking(move || {
        while !handle.is_stopped() {
            std::thread::sleep(Duration::from_millis(10));
        }
        handle.join();
    })
    .await
    .expect("join worker");
    Ok(())
}
