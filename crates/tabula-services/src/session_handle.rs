//! Shared session handle for async callers

use std::sync::Arc;

use parking_lot::Mutex;
use tabula_core::{ColumnDefinition, RowId};

use crate::batch_committer::{BatchCommitter, BulkDeleteReport};
use crate::edit_session::{EditSession, SaveOutcome};
use crate::error::ServiceResult;

/// An [`EditSession`] shared between UI events and a running save.
///
/// The session lock is only held for synchronous work. A save snapshots the
/// session, commits without the lock, then re-locks to apply the outcome,
/// so edits and `discard()` stay responsive while requests are in flight.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<EditSession>>,
    committer: Arc<BatchCommitter>,
}

impl SessionHandle {
    pub fn new(columns: Vec<ColumnDefinition>, committer: BatchCommitter) -> Self {
        Self {
            session: Arc::new(Mutex::new(EditSession::new(columns))),
            committer: Arc::new(committer),
        }
    }

    /// Run synchronous work against the session
    pub fn with_session<R>(&self, f: impl FnOnce(&mut EditSession) -> R) -> R {
        f(&mut self.session.lock())
    }

    /// Clear staged edits and cancel any running save
    pub fn discard(&self) {
        self.session.lock().discard();
    }

    /// Save the session. `on_success` runs only when the save committed and
    /// the session was not discarded in the meantime.
    pub async fn save(&self, on_success: impl FnOnce() + Send) -> SaveOutcome {
        let pending = match self.session.lock().begin_save() {
            Ok(pending) => pending,
            Err(err) => return SaveOutcome::Failed(err),
        };

        let result = self
            .committer
            .commit(&pending.columns, &pending.changes, &pending.cancel)
            .await;

        let outcome = self.session.lock().finish_save(&pending, result);
        if matches!(outcome, SaveOutcome::Committed(_)) {
            on_success();
        }
        outcome
    }

    pub async fn delete_rows(&self, row_ids: &[RowId]) -> ServiceResult<BulkDeleteReport> {
        self.committer.delete_rows(row_ids).await
    }
}
