//! Integration tests for `PgEventStore`.

use std::sync::Arc;

use eventide_core::error::DomainError;
use eventide_core::store::{EventStore, NewStreamEvent};
use eventide_core::stream::{ExpectedStreamVersion, StreamReadPosition};
use eventide_event_store::pg_event_store::PgEventStore;
use eventide_test_support::{FixedClock, json_event};
use sqlx::PgPool;

fn store(pool: PgPool) -> PgEventStore {
    PgEventStore::with_clock(pool, Arc::new(FixedClock::reference()))
}

fn events(n: usize) -> Vec<NewStreamEvent> {
    (0..n)
        .map(|i| json_event("test.event", &serde_json::json!({ "n": i })))
        .collect()
}

// --- read_stream ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_read_stream_returns_none_for_unknown_stream(pool: PgPool) {
    let store = store(pool);

    let read = store
        .read_stream("nope", StreamReadPosition::START, None)
        .await
        .unwrap();

    assert_eq!(read, None);
    assert!(!store.stream_exists("nope").await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_and_read_single_event(pool: PgPool) {
    // Arrange
    let store = store(pool);
    let mut event = json_event("test.event", &serde_json::json!({"key": "value"}));
    event.metadata = Some(b"{\"trace\":1}".to_vec());
    let expected = event.clone();

    // Act
    let result = store
        .append_event("s-1", event, ExpectedStreamVersion::NoStream)
        .await
        .unwrap();

    // Assert
    assert_eq!(result.next_expected_version, 0);
    let read = store
        .read_stream("s-1", StreamReadPosition::START, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.len(), 1);
    let e = &read[0];
    assert_eq!(e.event_id, expected.event_id);
    assert_eq!(e.event_type, expected.event_type);
    assert_eq!(e.data, expected.data);
    assert_eq!(e.metadata, expected.metadata);
    assert_eq!(e.stream_id, "s-1");
    assert_eq!(e.event_number, 0);
    assert_eq!(e.global_position, result.global_position);
    assert_eq!(e.timestamp, FixedClock::reference().0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_read_stream_window(pool: PgPool) {
    let store = store(pool);
    store
        .append_events("s", events(10), ExpectedStreamVersion::NoStream)
        .await
        .unwrap();

    let window = store
        .read_stream("s", StreamReadPosition::new(5), Some(3))
        .await
        .unwrap()
        .unwrap();
    let past_end = store
        .read_stream("s", StreamReadPosition::new(10), None)
        .await
        .unwrap();

    let numbers: Vec<i64> = window.iter().map(|e| e.event_number).collect();
    assert_eq!(numbers, vec![5, 6, 7]);
    assert_eq!(past_end, Some(vec![]));
}

// --- versioning ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_sequential_appends_number_contiguously(pool: PgPool) {
    let store = store(pool);

    let first = store
        .append_events("s", events(2), ExpectedStreamVersion::NoStream)
        .await
        .unwrap();
    let second = store
        .append_events("s", events(2), ExpectedStreamVersion::Exact(1))
        .await
        .unwrap();

    assert_eq!(first.next_expected_version, 1);
    assert_eq!(second.next_expected_version, 3);
    assert!(second.global_position > first.global_position);
    let read = store
        .read_stream("s", StreamReadPosition::START, None)
        .await
        .unwrap()
        .unwrap();
    for (i, event) in read.iter().enumerate() {
        assert_eq!(event.event_number, i64::try_from(i).unwrap());
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_stale_expected_version_is_rejected(pool: PgPool) {
    // Arrange
    let store = store(pool);
    store
        .append_events("s", events(2), ExpectedStreamVersion::NoStream)
        .await
        .unwrap();

    // Act
    let result = store
        .append_events("s", events(2), ExpectedStreamVersion::Exact(0))
        .await;

    // Assert
    match result {
        Err(DomainError::ConcurrencyConflict {
            stream_id,
            expected,
            actual,
        }) => {
            assert_eq!(stream_id, "s");
            assert_eq!(expected, ExpectedStreamVersion::Exact(0));
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
    let read = store
        .read_stream("s", StreamReadPosition::START, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_no_stream_rejected_once_stream_exists(pool: PgPool) {
    let store = store(pool);
    store
        .append_events("s", events(1), ExpectedStreamVersion::NoStream)
        .await
        .unwrap();

    let result = store
        .append_events("s", events(1), ExpectedStreamVersion::NoStream)
        .await;

    assert!(result.unwrap_err().is_concurrency_conflict());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_writers_exactly_one_wins(pool: PgPool) {
    // Arrange
    let store = Arc::new(store(pool));
    store
        .append_events("s", events(1), ExpectedStreamVersion::NoStream)
        .await
        .unwrap();

    // Act
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .append_events("s", events(1), ExpectedStreamVersion::Exact(0))
                    .await
            })
        })
        .collect();
    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(err) if err.is_concurrency_conflict() => conflicts += 1,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    // Assert
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 3);
    let read = store
        .read_stream("s", StreamReadPosition::START, None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.len(), 2);
}

// --- edge cases ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_append_empty_batch_is_rejected(pool: PgPool) {
    let store = store(pool);

    let result = store
        .append_events("s", Vec::new(), ExpectedStreamVersion::Any)
        .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert!(!store.stream_exists("s").await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_duplicate_event_id_is_rejected(pool: PgPool) {
    let store = store(pool);
    let event = json_event("test.event", &serde_json::json!({}));
    store
        .append_event("a", event.clone(), ExpectedStreamVersion::Any)
        .await
        .unwrap();

    let result = store
        .append_event("b", event, ExpectedStreamVersion::Any)
        .await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
}

// --- global log ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_read_all_follows_commit_order_across_streams(pool: PgPool) {
    let store = store(pool);
    store
        .append_events("a", events(2), ExpectedStreamVersion::NoStream)
        .await
        .unwrap();
    store
        .append_events("b", events(1), ExpectedStreamVersion::NoStream)
        .await
        .unwrap();
    store
        .append_events("a", events(1), ExpectedStreamVersion::Exact(1))
        .await
        .unwrap();

    let all = store.read_all(0, 100).await.unwrap();

    let order: Vec<(&str, i64)> = all
        .iter()
        .map(|e| (e.stream_id.as_str(), e.event_number))
        .collect();
    assert_eq!(order, vec![("a", 0), ("a", 1), ("b", 0), ("a", 2)]);
    assert!(all.windows(2).all(|w| w[0].global_position < w[1].global_position));

    let tail = store.read_all(all[2].global_position, 10).await.unwrap();
    assert_eq!(tail.len(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_migrate_is_idempotent(pool: PgPool) {
    let store = store(pool);

    store.migrate().await.unwrap();
    store.migrate().await.unwrap();

    assert!(store.read_all(0, 10).await.unwrap().is_empty());
}
