//! Batch commit protocol
//!
//! Save drains staged rows and patches one request at a time, creates
//! before updates, and stops at the first failure. Bulk delete fans out
//! one request per row and reports after every request has settled.
//! Neither path rolls back work the server already accepted.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tabula_core::{coerce_patch, coerce_row, ColumnDefinition, RowId};
use tokio_util::sync::CancellationToken;

use crate::edit_session::ChangeSet;
use crate::error::{ServiceError, ServiceResult};
use crate::rows_api::{RequestError, RowOperation, RowsApi};

/// Counts of requests a successful save issued
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub created: usize,
    pub updated: usize,
}

impl CommitReport {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0
    }
}

/// Result of a delete that fully succeeded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkDeleteReport {
    pub deleted: usize,
}

/// Applies staged edits and deletes through a [`RowsApi`]
#[derive(Clone)]
pub struct BatchCommitter {
    api: Arc<dyn RowsApi>,
}

impl BatchCommitter {
    pub fn new(api: Arc<dyn RowsApi>) -> Self {
        Self { api }
    }

    /// Persist a change set.
    ///
    /// Staged rows are created in their current order, then patches are
    /// applied in first-edit order. Coercion happens right before each
    /// request, so a malformed JSON field aborts the save after the rows
    /// ahead of it were already sent.
    #[tracing::instrument(
        skip_all,
        fields(new_rows = changes.new_rows.len(), patches = changes.patches.len())
    )]
    pub async fn commit(
        &self,
        columns: &[ColumnDefinition],
        changes: &ChangeSet,
        cancel: &CancellationToken,
    ) -> ServiceResult<CommitReport> {
        let mut report = CommitReport::default();

        for row in &changes.new_rows {
            let data = coerce_row(columns, &row.data)?;
            tracing::debug!(temp_id = %row.temp_id, "Creating row");
            self.send(RowOperation::Create, cancel, self.api.create_row(&data))
                .await?;
            report.created += 1;
        }

        for (row_id, patch) in changes.patches.iter() {
            let data = coerce_patch(columns, patch)?;
            tracing::debug!(row_id = %row_id, fields = data.len(), "Updating row");
            self.send(RowOperation::Update, cancel, self.api.update_row(row_id, &data))
                .await?;
            report.updated += 1;
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            "Committed pending changes"
        );
        Ok(report)
    }

    /// Delete a single row
    #[tracing::instrument(skip(self))]
    pub async fn delete_row(&self, row_id: &str) -> ServiceResult<()> {
        self.api.delete_row(row_id).await.map_err(|e| {
            tracing::warn!(row_id = %row_id, error = %e, "Row delete failed");
            ServiceError::RequestFailed(e.into_message(RowOperation::Delete.fallback_message()))
        })?;
        tracing::info!(row_id = %row_id, "Deleted row");
        Ok(())
    }

    /// Delete rows concurrently, waiting for every request to settle.
    ///
    /// A single id goes through [`Self::delete_row`]. With several ids any
    /// failure yields [`ServiceError::PartialBulkFailure`] carrying the
    /// message of the first failing id in input order.
    #[tracing::instrument(skip_all, fields(count = row_ids.len()))]
    pub async fn delete_rows(&self, row_ids: &[RowId]) -> ServiceResult<BulkDeleteReport> {
        match row_ids {
            [] => return Ok(BulkDeleteReport::default()),
            [row_id] => {
                self.delete_row(row_id).await?;
                return Ok(BulkDeleteReport { deleted: 1 });
            }
            _ => {}
        }

        let results = join_all(row_ids.iter().map(|row_id| async move {
            self.api.delete_row(row_id).await.map_err(|e| {
                tracing::warn!(row_id = %row_id, error = %e, "Row delete failed");
                e.into_message(format!("Failed to delete row {}", row_id))
            })
        }))
        .await;

        let total = results.len();
        let mut failures = results.into_iter().filter_map(Result::err);
        let Some(first_error) = failures.next() else {
            tracing::info!(deleted = total, "Deleted rows");
            return Ok(BulkDeleteReport { deleted: total });
        };
        let failed = 1 + failures.count();

        tracing::warn!(failed, total, "Bulk delete partially failed");
        Err(ServiceError::PartialBulkFailure {
            failed,
            total,
            succeeded: total - failed,
            first_error,
        })
    }

    async fn send(
        &self,
        operation: RowOperation,
        cancel: &CancellationToken,
        request: impl Future<Output = Result<(), RequestError>>,
    ) -> ServiceResult<()> {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ServiceError::Cancelled),
            result = request => result,
        };

        result.map_err(|e| {
            tracing::warn!(operation = %operation, error = %e, "Row request failed");
            ServiceError::RequestFailed(e.into_message(operation.fallback_message()))
        })
    }
}
