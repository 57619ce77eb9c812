//! EventLogStore interface tests.
//!
//! These tests verify the contract of the EventLogStore trait.
//! Each storage implementation should run these tests. Every test works on
//! its own aggregate ids, so a shared table is fine.

use futures::TryStreamExt;
use serde_json::json;
use uuid::Uuid;

use eventlog::storage::{EventLogStore, StorageError};
use eventlog::{header, Message};

/// Fresh aggregate id scoped to one test.
pub fn aggregate(prefix: &str) -> String {
    format!("test_{}_{}", prefix, Uuid::new_v4())
}

/// Create a test message for `aggregate_root_id` at `version`.
pub fn make_message(aggregate_root_id: &str, version: u64) -> Message {
    Message::new(json!({"version": version, "items": [1, 2, 3]}))
        .with_header(header::EVENT_TYPE, "item_added")
        .with_header(header::AGGREGATE_ROOT_ID, aggregate_root_id)
        .with_header(header::AGGREGATE_ROOT_VERSION, version)
}

fn versions(messages: &[Message]) -> Vec<Option<u64>> {
    messages.iter().map(Message::aggregate_root_version).collect()
}

// =============================================================================
// EventLogStore::append tests
// =============================================================================

pub async fn test_append_empty_is_noop<S: EventLogStore + ?Sized>(store: &S) {
    let before: Vec<Message> = store.read_all().try_collect().await.expect("read_all should succeed");

    store.append(vec![]).await.expect("empty append should succeed");

    let after: Vec<Message> = store.read_all().try_collect().await.expect("read_all should succeed");
    assert_eq!(before.len(), after.len(), "log should be unchanged");
}

pub async fn test_append_round_trip<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("round_trip");
    let message = make_message(&id, 1)
        .with_header(header::EVENT_ID, Uuid::new_v4().to_string())
        .with_header(header::TIME_OF_RECORDING, "2024-03-01 12:00:00.000000+0000");

    store
        .append(vec![message.clone()])
        .await
        .expect("append should succeed");

    let (messages, watermark) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert_eq!(messages, vec![message], "stored message should round-trip");
    assert_eq!(watermark, 1);
}

pub async fn test_append_assigns_event_id<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("auto_id");
    let first = make_message(&id, 1);
    let second = make_message(&id, 2);

    store
        .append(vec![first.clone(), second])
        .await
        .expect("append should succeed");

    let (messages, _) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert_eq!(messages.len(), 2);

    let first_id = messages[0].event_id().expect("event id should be assigned");
    let second_id = messages[1].event_id().expect("event id should be assigned");
    assert!(!first_id.is_empty());
    assert_ne!(first_id, second_id, "assigned ids should be unique");

    let mut without_id = messages[0].headers().clone();
    without_id.remove(header::EVENT_ID);
    assert_eq!(&without_id, first.headers(), "only the event id header should differ");
    assert_eq!(messages[0].event(), first.event());
}

pub async fn test_append_is_atomic<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("atomic");
    let duplicate = Uuid::new_v4().to_string();
    let batch = vec![
        make_message(&id, 1).with_header(header::EVENT_ID, duplicate.clone()),
        make_message(&id, 2),
        make_message(&id, 3).with_header(header::EVENT_ID, duplicate),
    ];

    let err = store
        .append(batch)
        .await
        .expect_err("duplicate event id should fail the batch");
    assert!(err.is_constraint_violation(), "unexpected error: {err}");

    let (messages, watermark) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert!(messages.is_empty(), "no record of a failed batch should be visible");
    assert_eq!(watermark, 0);
}

pub async fn test_append_rejects_unparseable_timestamp<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("bad_time");
    let batch = vec![
        make_message(&id, 1),
        make_message(&id, 2).with_header(header::TIME_OF_RECORDING, "yesterday-ish"),
    ];

    let err = store
        .append(batch)
        .await
        .expect_err("unparseable timestamp should fail the batch");
    assert!(
        matches!(err, StorageError::InvalidTimestamp(_)),
        "unexpected error: {err}"
    );

    let (messages, _) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert!(messages.is_empty(), "no record of a rejected batch should be visible");
}

pub async fn test_append_sequential_batches<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("sequential");

    store
        .append(vec![make_message(&id, 1), make_message(&id, 2)])
        .await
        .expect("first append should succeed");
    store
        .append(vec![make_message(&id, 3)])
        .await
        .expect("second append should succeed");

    let (messages, watermark) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert_eq!(versions(&messages), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(watermark, 3);
}

// =============================================================================
// EventLogStore::read_aggregate_stream tests
// =============================================================================

pub async fn test_read_aggregate_orders_by_version<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("ordering");
    let other = aggregate("ordering_other");

    store
        .append(vec![
            make_message(&other, 15),
            make_message(&id, 11),
            make_message(&id, 10),
        ])
        .await
        .expect("append should succeed");

    let (messages, watermark) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert_eq!(versions(&messages), vec![Some(10), Some(11)]);
    assert!(messages.iter().all(|m| m.aggregate_root_id() == Some(id.as_str())));
    assert_eq!(watermark, 11);
}

pub async fn test_read_empty_aggregate<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("empty");

    let (messages, watermark) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert!(messages.is_empty());
    assert_eq!(watermark, 0);
}

pub async fn test_read_watermark_tracks_progress<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("watermark");
    store
        .append(vec![make_message(&id, 4), make_message(&id, 9)])
        .await
        .expect("append should succeed");

    let mut stream = store.read_aggregate_stream(&id);
    assert_eq!(stream.watermark(), None, "watermark is not final before the end");

    let first = stream.try_next().await.expect("read should succeed");
    assert_eq!(first.and_then(|m| m.aggregate_root_version()), Some(4));
    assert_eq!(stream.last_version(), 4);

    while stream.try_next().await.expect("read should succeed").is_some() {}
    assert_eq!(stream.watermark(), Some(9));
}

// =============================================================================
// EventLogStore::read_aggregate_stream_after_version tests
// =============================================================================

pub async fn test_read_after_version<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("after");
    store
        .append(vec![make_message(&id, 10), make_message(&id, 11)])
        .await
        .expect("append should succeed");

    let (messages, watermark) = store
        .read_aggregate_stream_after_version(&id, 10)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert_eq!(versions(&messages), vec![Some(11)]);
    assert_eq!(watermark, 11);

    let (messages, watermark) = store
        .read_aggregate_stream_after_version(&id, 11)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert!(messages.is_empty());
    assert_eq!(watermark, 0);
}

pub async fn test_read_after_version_zero<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("after_zero");
    store
        .append(vec![
            Message::new(json!({"unversioned": true})).with_header(header::AGGREGATE_ROOT_ID, id.as_str()),
            make_message(&id, 1),
        ])
        .await
        .expect("append should succeed");

    let (messages, _) = store
        .read_aggregate_stream(&id)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert_eq!(messages.len(), 2, "missing version is stored as 0");

    let (messages, watermark) = store
        .read_aggregate_stream_after_version(&id, 0)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert_eq!(versions(&messages), vec![Some(1)]);
    assert_eq!(watermark, 1);
}

pub async fn test_read_after_huge_version<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("after_huge");
    store
        .append(vec![make_message(&id, 1)])
        .await
        .expect("append should succeed");

    let (messages, watermark) = store
        .read_aggregate_stream_after_version(&id, u64::MAX)
        .collect_with_watermark()
        .await
        .expect("read should succeed");
    assert!(messages.is_empty());
    assert_eq!(watermark, 0);
}

// =============================================================================
// EventLogStore::read_all tests
// =============================================================================

pub async fn test_read_all_orders_by_time<S: EventLogStore + ?Sized>(store: &S) {
    let id = aggregate("global");
    let at = |version: u64, time: &str| {
        make_message(&id, version).with_header(header::TIME_OF_RECORDING, time.to_string())
    };

    // 09:30+02:00 is 07:30 UTC, earlier than 08:00 UTC.
    store
        .append(vec![
            at(1, "2001-01-01 08:00:00.000000+0000"),
            at(2, "2001-01-01 09:30:00.000000+02:00"),
            at(3, "2001-01-01 07:59:59.000000+0000"),
        ])
        .await
        .expect("append should succeed");

    let messages: Vec<Message> = store
        .read_all()
        .try_collect()
        .await
        .expect("read_all should succeed");

    let ours: Vec<_> = messages
        .into_iter()
        .filter(|m| m.aggregate_root_id() == Some(id.as_str()))
        .collect();
    assert_eq!(versions(&ours), vec![Some(2), Some(3), Some(1)]);
}

/// Run all EventLogStore interface tests.
#[macro_export]
macro_rules! run_event_log_tests {
    ($store:expr) => {
        use $crate::storage::event_log_tests::*;

        // append tests
        test_append_empty_is_noop($store).await;
        println!("  test_append_empty_is_noop: PASSED");

        test_append_round_trip($store).await;
        println!("  test_append_round_trip: PASSED");

        test_append_assigns_event_id($store).await;
        println!("  test_append_assigns_event_id: PASSED");

        test_append_is_atomic($store).await;
        println!("  test_append_is_atomic: PASSED");

        test_append_rejects_unparseable_timestamp($store).await;
        println!("  test_append_rejects_unparseable_timestamp: PASSED");

        test_append_sequential_batches($store).await;
        println!("  test_append_sequential_batches: PASSED");

        // read_aggregate_stream tests
        test_read_aggregate_orders_by_version($store).await;
        println!("  test_read_aggregate_orders_by_version: PASSED");

        test_read_empty_aggregate($store).await;
        println!("  test_read_empty_aggregate: PASSED");

        test_read_watermark_tracks_progress($store).await;
        println!("  test_read_watermark_tracks_progress: PASSED");

        // read_aggregate_stream_after_version tests
        test_read_after_version($store).await;
        println!("  test_read_after_version: PASSED");

        test_read_after_version_zero($store).await;
        println!("  test_read_after_version_zero: PASSED");

        test_read_after_huge_version($store).await;
        println!("  test_read_after_huge_version: PASSED");

        // read_all tests
        test_read_all_orders_by_time($store).await;
        println!("  test_read_all_orders_by_time: PASSED");
    };
}
