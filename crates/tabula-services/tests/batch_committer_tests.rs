//! Integration tests for BatchCommitter

mod common;

use common::{people_columns, MockRowsApi, RecordedCall};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tabula_core::{ColumnDefinition, TempRow};
use tabula_services::{
    BatchCommitter, BulkDeleteReport, ChangeSet, CommitReport, PendingChanges, ServiceError,
};
use tokio_util::sync::CancellationToken;

fn staged_row(temp_id: &str, columns: &[ColumnDefinition], name: &str) -> TempRow {
    let mut row = TempRow::new(temp_id, columns);
    row.set("name", json!(name));
    row
}

fn created_names(api: &MockRowsApi) -> Vec<String> {
    api.calls()
        .into_iter()
        .filter_map(|call| match call {
            RecordedCall::Create(data) => data.get("name").and_then(|v| v.as_str()).map(String::from),
            _ => None,
        })
        .collect()
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// ===== Commit Tests =====

#[tokio::test]
async fn test_creates_run_before_updates_in_order() {
    let columns = people_columns();
    let api = Arc::new(MockRowsApi::new());
    let committer = BatchCommitter::new(api.clone());

    let mut patches = PendingChanges::new();
    patches.set_field("r2", "age", json!("7"));
    patches.set_field("r1", "age", json!("0"));
    let changes = ChangeSet {
        new_rows: vec![
            staged_row("temp-b", &columns, "newest"),
            staged_row("temp-a", &columns, "oldest"),
        ],
        patches,
    };

    let report = committer
        .commit(&columns, &changes, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report, CommitReport { created: 2, updated: 2 });
    assert_eq!(created_names(&api), vec!["newest", "oldest"]);

    let calls = api.calls();
    let updates: Vec<_> = calls[2..].to_vec();
    let mut r2 = tabula_core::FieldMap::new();
    r2.insert("age".into(), json!(7));
    let mut r1 = tabula_core::FieldMap::new();
    r1.insert("age".into(), json!(0));
    assert_eq!(
        updates,
        vec![
            RecordedCall::Update("r2".into(), r2),
            RecordedCall::Update("r1".into(), r1),
        ]
    );
    assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_failure_aborts_remaining_requests() {
    let columns = people_columns();
    let api = Arc::new(MockRowsApi::new().with_create_failure(1, Some("Name must be unique")));
    let committer = BatchCommitter::new(api.clone());

    let mut patches = PendingChanges::new();
    patches.set_field("r1", "name", json!("x"));
    let changes = ChangeSet {
        new_rows: vec![
            staged_row("temp-c", &columns, "c"),
            staged_row("temp-b", &columns, "b"),
            staged_row("temp-a", &columns, "a"),
        ],
        patches,
    };

    let err = committer
        .commit(&columns, &changes, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::RequestFailed("Name must be unique".into()));
    // The first row stays created; nothing after the failure is sent
    assert_eq!(created_names(&api), vec!["c", "b"]);
    assert_eq!(api.call_count(), 2);
}

#[tokio::test]
async fn test_fallback_messages() {
    let columns = people_columns();

    let api = Arc::new(MockRowsApi::new().with_create_failure(0, None));
    let changes = ChangeSet {
        new_rows: vec![staged_row("temp-a", &columns, "a")],
        ..ChangeSet::default()
    };
    let err = BatchCommitter::new(api)
        .commit(&columns, &changes, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to add row");

    let api = Arc::new(MockRowsApi::new().with_row_failure("r1", None));
    let mut patches = PendingChanges::new();
    patches.set_field("r1", "name", json!("x"));
    let changes = ChangeSet {
        patches,
        ..ChangeSet::default()
    };
    let err = BatchCommitter::new(api)
        .commit(&columns, &changes, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to update row");
}

#[tokio::test]
async fn test_malformed_json_aborts_before_its_request() {
    let columns = people_columns();
    let api = Arc::new(MockRowsApi::new());
    let committer = BatchCommitter::new(api.clone());

    let mut bad = staged_row("temp-b", &columns, "bad");
    bad.set("meta", json!("{"));
    let changes = ChangeSet {
        new_rows: vec![staged_row("temp-c", &columns, "good"), bad],
        ..ChangeSet::default()
    };

    let err = committer
        .commit(&columns, &changes, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidFieldValue(_)));
    assert_eq!(err.to_string(), "Invalid JSON for field: meta");
    assert_eq!(created_names(&api), vec!["good"]);
}

#[tokio::test]
async fn test_cancelled_token_sends_nothing() {
    let columns = people_columns();
    let api = Arc::new(MockRowsApi::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let changes = ChangeSet {
        new_rows: vec![staged_row("temp-a", &columns, "a")],
        ..ChangeSet::default()
    };
    let err = BatchCommitter::new(api.clone())
        .commit(&columns, &changes, &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::Cancelled);
    assert_eq!(api.call_count(), 0);
}

// ===== Delete Tests =====

#[tokio::test]
async fn test_delete_nothing() {
    let api = Arc::new(MockRowsApi::new());
    let report = BatchCommitter::new(api.clone()).delete_rows(&[]).await.unwrap();
    assert_eq!(report, BulkDeleteReport { deleted: 0 });
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_single_delete_uses_plain_message() {
    let api = Arc::new(MockRowsApi::new().with_row_failure("r1", None));
    let err = BatchCommitter::new(api)
        .delete_rows(&ids(&["r1"]))
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::RequestFailed("Failed to delete row".into()));
}

#[tokio::test]
async fn test_bulk_delete_runs_concurrently() {
    let api = Arc::new(MockRowsApi::new().with_delay(Duration::from_millis(50)));
    let report = BatchCommitter::new(api.clone())
        .delete_rows(&ids(&["r1", "r2", "r3", "r4"]))
        .await
        .unwrap();

    assert_eq!(report, BulkDeleteReport { deleted: 4 });
    assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_bulk_delete_aggregates_partial_failure() {
    let api = Arc::new(
        MockRowsApi::new()
            .with_delay(Duration::from_millis(10))
            .with_row_failure("r2", Some("Row r2 is referenced"))
            .with_row_failure("r4", Some("Row r4 is referenced")),
    );
    let err = BatchCommitter::new(api.clone())
        .delete_rows(&ids(&["r1", "r2", "r3", "r4", "r5"]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ServiceError::PartialBulkFailure {
            failed: 2,
            total: 5,
            succeeded: 3,
            first_error: "Row r2 is referenced".into(),
        }
    );
    assert_eq!(
        err.to_string(),
        "Failed to delete 2 of 5 row(s) (3 deleted successfully). Row r2 is referenced"
    );
    // Every request was issued despite the failures
    assert_eq!(api.call_count(), 5);
}

#[tokio::test]
async fn test_bulk_delete_fallback_names_row() {
    let api = Arc::new(
        MockRowsApi::new()
            .with_row_failure("r1", None)
            .with_row_failure("r2", None),
    );
    let err = BatchCommitter::new(api)
        .delete_rows(&ids(&["r1", "r2"]))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Failed to delete 2 of 2 row(s). Failed to delete row r1"
    );
}
