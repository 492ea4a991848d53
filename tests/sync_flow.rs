//! End-to-end pipeline tests over in-memory doubles: dispatch, the
//! diff-aware writer, retry bounds, and checkpoint recording, without a
//! live MySQL or Elasticsearch.

use checkpoint::{CheckpointStore, MemoryStore};
use mysql_es_sync::dispatch::dispatch_page;
use mysql_es_sync::es::SearchIndex;
use mysql_es_sync::record::FieldValue;
use mysql_es_sync::retry::RetryPolicy;
use mysql_es_sync::testing::{make_record, MemoryIndex};
use std::sync::Arc;
use std::time::Duration;

fn retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::ZERO)
}

#[tokio::test]
async fn test_fresh_rows_are_indexed() {
    let index = Arc::new(MemoryIndex::new());
    index.create_index("users").await.unwrap();

    let record = make_record(
        "users",
        "users",
        "1",
        &[
            ("id", FieldValue::Int(1)),
            ("name", FieldValue::Text("alice".to_string())),
        ],
    );
    let result = dispatch_page(index.clone(), &retry(), vec![record]).await;

    assert_eq!(result.outcome.inserted, 1);
    assert_eq!(index.create_calls().await, 1);
    let doc = index.document("users", "1").await.unwrap();
    assert_eq!(doc["name"], serde_json::json!("alice"));
}

#[tokio::test]
async fn test_second_pass_over_unchanged_rows_writes_nothing() {
    let index = Arc::new(MemoryIndex::new());
    index.create_index("users").await.unwrap();

    let records: Vec<_> = (1..=3)
        .map(|id| {
            make_record(
                "users",
                "users",
                &id.to_string(),
                &[("id", FieldValue::Int(id))],
            )
        })
        .collect();

    dispatch_page(index.clone(), &retry(), records.clone()).await;
    let result = dispatch_page(index.clone(), &retry(), records).await;

    assert_eq!(result.outcome.skipped, 3);
    assert_eq!(result.outcome.inserted, 0);
    assert_eq!(result.outcome.updated, 0);
    assert_eq!(index.create_calls().await, 3);
    assert_eq!(index.update_calls().await, 0);
    // Unchanged rows still yield log entries so the checkpoint advances.
    assert_eq!(result.log_entries.len(), 3);
}

#[tokio::test]
async fn test_changed_field_triggers_an_update() {
    let index = Arc::new(MemoryIndex::new());
    index.create_index("users").await.unwrap();

    let mut record = make_record(
        "users",
        "users",
        "1",
        &[("id", FieldValue::Int(1)), ("a", FieldValue::Int(1))],
    );
    dispatch_page(index.clone(), &retry(), vec![record.clone()]).await;

    record.fields.insert("a".to_string(), FieldValue::Int(2));
    let result = dispatch_page(index.clone(), &retry(), vec![record]).await;

    assert_eq!(result.outcome.updated, 1);
    assert_eq!(index.update_calls().await, 1);
    let doc = index.document("users", "1").await.unwrap();
    assert_eq!(doc["a"], serde_json::json!(2));
}

#[tokio::test]
async fn test_derived_field_changes_alone_do_not_update() {
    let index = Arc::new(MemoryIndex::new());
    index.create_index("users").await.unwrap();

    let ts = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let mut record = make_record(
        "users",
        "users",
        "1",
        &[
            ("id", FieldValue::Int(1)),
            ("created_at", FieldValue::Int(1_700_000_000)),
            ("created_at_formatted", FieldValue::Timestamp(ts)),
        ],
    );
    dispatch_page(index.clone(), &retry(), vec![record.clone()]).await;

    // The derived value drifts but the source column does not.
    let later = chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap();
    record.fields.insert(
        "created_at_formatted".to_string(),
        FieldValue::Timestamp(later),
    );
    let result = dispatch_page(index.clone(), &retry(), vec![record]).await;

    assert_eq!(result.outcome.skipped, 1);
    assert_eq!(index.update_calls().await, 0);
}

#[tokio::test]
async fn test_persistent_write_failure_exhausts_the_retry_budget() {
    let index = Arc::new(MemoryIndex::new());
    index.create_index("users").await.unwrap();
    index.set_fail_writes(true).await;

    let record = make_record("users", "users", "1", &[("id", FieldValue::Int(1))]);
    let result = dispatch_page(index.clone(), &RetryPolicy::new(3, Duration::ZERO), vec![record])
        .await;

    assert_eq!(result.outcome.failed, 1);
    assert!(result.outcome.first_error.is_some());
    assert!(result.log_entries.is_empty());
    assert!(index.document("users", "1").await.is_none());
}

#[tokio::test]
async fn test_log_entries_advance_the_checkpoint() {
    let index = Arc::new(MemoryIndex::new());
    index.create_index("users").await.unwrap();
    let store = MemoryStore::new();

    let records: Vec<_> = [3, 7, 5]
        .iter()
        .map(|id| {
            make_record(
                "users",
                "users",
                &id.to_string(),
                &[("id", FieldValue::Int(*id))],
            )
        })
        .collect();

    let result = dispatch_page(index.clone(), &retry(), records).await;
    store.record_batch(&result.log_entries).await.unwrap();

    let checkpoint = store.last_checkpoint("users", "id").await.unwrap();
    assert_eq!(checkpoint, Some(7));
}
