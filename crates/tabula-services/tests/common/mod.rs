//! Common test utilities and mocks

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tabula_core::{ColumnDefinition, ColumnType, FieldMap};
use tabula_services::{RequestError, RowsApi};

/// A request as seen by the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Create(FieldMap),
    Update(String, FieldMap),
    Delete(String),
}

/// Mock row API for testing commit logic without a server.
///
/// Failures are scripted per create index (0-based, in send order) or per
/// row id. A failure message of `None` simulates a response without an
/// `error` field.
#[derive(Default)]
pub struct MockRowsApi {
    /// Log of all requests received, for assertion in tests
    pub call_log: Arc<parking_lot::Mutex<Vec<RecordedCall>>>,
    create_failures: HashMap<usize, Option<String>>,
    row_failures: HashMap<String, Option<String>>,
    delay: Option<Duration>,
    create_count: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl MockRowsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create_failure(mut self, index: usize, message: Option<&str>) -> Self {
        self.create_failures.insert(index, message.map(String::from));
        self
    }

    /// Fail updates and deletes of `row_id`
    pub fn with_row_failure(mut self, row_id: &str, message: Option<&str>) -> Self {
        self.row_failures
            .insert(row_id.to_string(), message.map(String::from));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.call_log.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().len()
    }

    async fn respond(&self, call: RecordedCall, failure: Option<Option<String>>) -> Result<(), RequestError> {
        self.call_log.lock().push(call);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(message) => Err(RequestError::status(400, message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RowsApi for MockRowsApi {
    async fn create_row(&self, data: &FieldMap) -> Result<(), RequestError> {
        let index = self.create_count.fetch_add(1, Ordering::SeqCst);
        let failure = self.create_failures.get(&index).cloned();
        self.respond(RecordedCall::Create(data.clone()), failure).await
    }

    async fn update_row(&self, row_id: &str, data: &FieldMap) -> Result<(), RequestError> {
        let failure = self.row_failures.get(row_id).cloned();
        self.respond(RecordedCall::Update(row_id.to_string(), data.clone()), failure)
            .await
    }

    async fn delete_row(&self, row_id: &str) -> Result<(), RequestError> {
        let failure = self.row_failures.get(row_id).cloned();
        self.respond(RecordedCall::Delete(row_id.to_string()), failure)
            .await
    }
}

/// A small schema covering every column type
pub fn people_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new("name", ColumnType::String).required(),
        ColumnDefinition::new("age", ColumnType::Number),
        ColumnDefinition::new("active", ColumnType::Boolean),
        ColumnDefinition::new("joined", ColumnType::Date),
        ColumnDefinition::new("meta", ColumnType::Json),
    ]
}
