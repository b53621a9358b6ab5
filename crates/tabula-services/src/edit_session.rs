//! Optimistic edit overlay for one table view
//!
//! The session stages new rows and field patches locally. Nothing here
//! touches the network except [`EditSession::save`], which hands a snapshot
//! to the [`BatchCommitter`].

use serde_json::Value;
use tabula_core::{is_field_empty, ColumnDefinition, FieldMap, TableRow, TempRow};
use tokio_util::sync::CancellationToken;

use crate::batch_committer::{BatchCommitter, CommitReport};
use crate::error::{ServiceError, ServiceResult};
use crate::pending::PendingChanges;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing staged
    Clean,
    /// Staged edits, no save running
    Dirty,
    Saving,
    /// The last save failed; staged edits are kept for a retry
    Failed,
}

/// Everything a save sends, in send order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub new_rows: Vec<TempRow>,
    pub patches: PendingChanges,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.new_rows.is_empty() && self.patches.is_empty()
    }
}

/// Snapshot taken when a save starts
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub generation: u64,
    pub columns: Vec<ColumnDefinition>,
    pub changes: ChangeSet,
    pub cancel: CancellationToken,
}

/// How a finished save was applied to the session
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Committed(CommitReport),
    Failed(ServiceError),
    /// The session was discarded while the save ran; its result was ignored
    Stale,
}

/// Staged rows and patches layered over server rows
#[derive(Debug)]
pub struct EditSession {
    columns: Vec<ColumnDefinition>,
    /// Most recently added first
    new_rows: Vec<TempRow>,
    patches: PendingChanges,
    saving: bool,
    last_error: Option<ServiceError>,
    /// Bumped on discard so results of abandoned saves can be recognized
    generation: u64,
    save_token: CancellationToken,
    /// Temp ids of staged rows the running save is creating
    in_flight: Vec<String>,
}

impl EditSession {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self {
            columns,
            new_rows: Vec::new(),
            patches: PendingChanges::new(),
            saving: false,
            last_error: None,
            generation: 0,
            save_token: CancellationToken::new(),
            in_flight: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Stage a new row with default values and return its temp id
    pub fn add_new_row(&mut self) -> String {
        let temp_id = format!("temp-{}", nanoid::nanoid!());
        self.new_rows
            .insert(0, TempRow::new(temp_id.clone(), &self.columns));
        tracing::debug!(temp_id = %temp_id, "Staged new row");
        temp_id
    }

    /// Set a field of a staged row. Returns false when the row is gone or
    /// is being created by the running save.
    pub fn update_new_row_cell(&mut self, temp_id: &str, column: &str, value: Value) -> bool {
        if self.is_row_in_flight(temp_id) {
            tracing::debug!(temp_id = %temp_id, "Ignoring edit to staged row being saved");
            return false;
        }
        match self.new_rows.iter_mut().find(|row| row.temp_id == temp_id) {
            Some(row) => {
                row.set(column, value);
                true
            }
            None => {
                tracing::debug!(temp_id = %temp_id, "Ignoring edit for unknown staged row");
                false
            }
        }
    }

    /// Unstage a row. Returns false when the row is unknown or is being
    /// created by the running save.
    pub fn remove_new_row(&mut self, temp_id: &str) -> bool {
        if self.is_row_in_flight(temp_id) {
            tracing::debug!(temp_id = %temp_id, "Ignoring removal of staged row being saved");
            return false;
        }
        let before = self.new_rows.len();
        self.new_rows.retain(|row| row.temp_id != temp_id);
        before != self.new_rows.len()
    }

    pub fn update_existing_row_cell(&mut self, row_id: &str, column: &str, value: Value) {
        self.patches.set_field(row_id, column, value);
    }

    /// Patched value if there is one, else the server value
    pub fn effective_value<'a>(&'a self, row: &'a TableRow, column: &str) -> Option<&'a Value> {
        self.patches
            .get_field(&row.id, column)
            .or_else(|| row.get(column))
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.new_rows.is_empty() || !self.patches.is_empty()
    }

    /// Staged rows plus patched rows
    pub fn pending_change_count(&self) -> usize {
        self.new_rows.len() + self.patches.len()
    }

    pub fn new_rows(&self) -> &[TempRow] {
        &self.new_rows
    }

    pub fn pending_changes(&self) -> &PendingChanges {
        &self.patches
    }

    pub fn patch_for(&self, row_id: &str) -> Option<&FieldMap> {
        self.patches.get(row_id)
    }

    pub fn new_row(&self, temp_id: &str) -> Option<&TempRow> {
        self.new_rows.iter().find(|row| row.temp_id == temp_id)
    }

    pub fn is_new_row(&self, temp_id: &str) -> bool {
        self.new_row(temp_id).is_some()
    }

    /// Required columns still empty in a staged row. Unknown rows report
    /// nothing missing.
    pub fn missing_required_fields(&self, temp_id: &str) -> Vec<String> {
        let Some(row) = self.new_row(temp_id) else {
            return Vec::new();
        };
        self.columns
            .iter()
            .filter(|col| col.required)
            .filter(|col| is_field_empty(row.get(&col.name).unwrap_or(&Value::Null), col.column_type))
            .map(|col| col.name.clone())
            .collect()
    }

    /// Whether a staged row has every required column filled
    pub fn is_new_row_ready(&self, temp_id: &str) -> bool {
        self.is_new_row(temp_id) && self.missing_required_fields(temp_id).is_empty()
    }

    /// Drop all staged state and abandon any running save
    pub fn discard(&mut self) {
        if self.saving {
            tracing::debug!(generation = self.generation, "Discarding session during save");
        }
        self.save_token.cancel();
        self.generation += 1;
        self.new_rows.clear();
        self.patches.clear();
        self.last_error = None;
        self.saving = false;
        self.in_flight.clear();
    }

    pub fn state(&self) -> SessionState {
        if self.saving {
            SessionState::Saving
        } else if self.last_error.is_some() {
            SessionState::Failed
        } else if self.has_pending_changes() {
            SessionState::Dirty
        } else {
            SessionState::Clean
        }
    }

    pub fn last_error(&self) -> Option<&ServiceError> {
        self.last_error.as_ref()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Whether a staged row is part of the running save and locked
    pub fn is_row_in_flight(&self, temp_id: &str) -> bool {
        self.saving && self.in_flight.iter().any(|id| id == temp_id)
    }

    /// Enter the saving state and snapshot what must be sent
    pub fn begin_save(&mut self) -> ServiceResult<PendingSave> {
        if self.saving {
            return Err(ServiceError::SaveInProgress);
        }

        self.saving = true;
        self.last_error = None;
        self.save_token = CancellationToken::new();
        self.in_flight = self.new_rows.iter().map(|row| row.temp_id.clone()).collect();

        Ok(PendingSave {
            generation: self.generation,
            columns: self.columns.clone(),
            changes: ChangeSet {
                new_rows: self.new_rows.clone(),
                patches: self.patches.clone(),
            },
            cancel: self.save_token.clone(),
        })
    }

    /// Apply the result of a save started with [`Self::begin_save`].
    ///
    /// On success only the snapshotted edits are removed; edits made while
    /// the save was running stay staged.
    pub fn finish_save(
        &mut self,
        pending: &PendingSave,
        result: ServiceResult<CommitReport>,
    ) -> SaveOutcome {
        if pending.generation != self.generation {
            tracing::debug!(
                save_generation = pending.generation,
                generation = self.generation,
                "Ignoring result of abandoned save"
            );
            return SaveOutcome::Stale;
        }

        self.saving = false;
        self.in_flight.clear();
        match result {
            Ok(report) => {
                let saved = &pending.changes;
                self.new_rows
                    .retain(|row| !saved.new_rows.iter().any(|s| s.temp_id == row.temp_id));
                self.patches.remove_saved(&saved.patches);
                SaveOutcome::Committed(report)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Save failed");
                self.last_error = Some(err.clone());
                SaveOutcome::Failed(err)
            }
        }
    }

    /// Commit all staged edits and run `on_success` once they are persisted.
    /// On failure the edits stay staged and the error is kept in
    /// [`Self::last_error`].
    pub async fn save(
        &mut self,
        committer: &BatchCommitter,
        on_success: impl FnOnce(),
    ) -> ServiceResult<CommitReport> {
        let pending = self.begin_save()?;
        let result = committer
            .commit(&pending.columns, &pending.changes, &pending.cancel)
            .await;

        match self.finish_save(&pending, result) {
            SaveOutcome::Committed(report) => {
                on_success();
                Ok(report)
            }
            SaveOutcome::Failed(err) => Err(err),
            SaveOutcome::Stale => Err(ServiceError::Cancelled),
        }
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.save_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tabula_core::ColumnType;

    fn columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("name", ColumnType::String).required(),
            ColumnDefinition::new("age", ColumnType::Number),
            ColumnDefinition::new("active", ColumnType::Boolean).required(),
        ]
    }

    #[test]
    fn test_add_new_row_prepends_with_defaults() {
        let mut session = EditSession::new(columns());
        let first = session.add_new_row();
        let second = session.add_new_row();

        assert!(first.starts_with("temp-"));
        assert_ne!(first, second);
        assert_eq!(session.new_rows()[0].temp_id, second);
        assert_eq!(session.new_rows()[1].temp_id, first);

        let row = session.new_row(&first).unwrap();
        assert_eq!(row.get("name"), Some(&Value::Null));
        assert_eq!(row.get("age"), Some(&Value::Null));
        assert_eq!(row.get("active"), Some(&json!(false)));
        assert_eq!(session.state(), SessionState::Dirty);
    }

    #[test]
    fn test_update_unknown_new_row_is_noop() {
        let mut session = EditSession::new(columns());
        assert!(!session.update_new_row_cell("temp-missing", "name", json!("x")));
        assert!(!session.has_pending_changes());
        assert!(!session.remove_new_row("temp-missing"));
    }

    #[test]
    fn test_effective_value_prefers_patch() {
        let mut session = EditSession::new(columns());
        let mut data = FieldMap::new();
        data.insert("name".into(), json!("Bob"));
        data.insert("age".into(), json!(30));
        let row = TableRow::new("r1", data);

        session.update_existing_row_cell("r1", "name", json!("Robert"));

        assert_eq!(session.effective_value(&row, "name"), Some(&json!("Robert")));
        assert_eq!(session.effective_value(&row, "age"), Some(&json!(30)));
        assert_eq!(session.effective_value(&row, "missing"), None);
        assert_eq!(row.get("name"), Some(&json!("Bob")));
    }

    #[test]
    fn test_required_field_readiness() {
        let mut session = EditSession::new(columns());
        let temp_id = session.add_new_row();
        assert_eq!(session.missing_required_fields(&temp_id), vec!["name".to_string()]);
        assert!(!session.is_new_row_ready(&temp_id));

        session.update_new_row_cell(&temp_id, "name", json!("   "));
        assert!(!session.is_new_row_ready(&temp_id));

        session.update_new_row_cell(&temp_id, "name", json!("Alice"));
        assert!(session.is_new_row_ready(&temp_id));
        assert!(!session.is_new_row_ready("temp-unknown"));
    }

    #[test]
    fn test_pending_change_count() {
        let mut session = EditSession::new(columns());
        session.add_new_row();
        session.update_existing_row_cell("r1", "name", json!("a"));
        session.update_existing_row_cell("r1", "age", json!("2"));
        session.update_existing_row_cell("r2", "age", json!("3"));
        assert_eq!(session.pending_change_count(), 3);
    }

    #[test]
    fn test_begin_save_rejects_second_save() {
        let mut session = EditSession::new(columns());
        session.add_new_row();
        let pending = session.begin_save().unwrap();
        assert_eq!(session.state(), SessionState::Saving);
        assert_eq!(pending.changes.new_rows.len(), 1);
        assert_eq!(session.begin_save().unwrap_err(), ServiceError::SaveInProgress);
    }

    #[test]
    fn test_rows_in_running_save_are_locked() {
        let mut session = EditSession::new(columns());
        let saving_row = session.add_new_row();
        let pending = session.begin_save().unwrap();
        let late_row = session.add_new_row();

        assert!(session.is_row_in_flight(&saving_row));
        assert!(!session.update_new_row_cell(&saving_row, "name", json!("Alice")));
        assert!(!session.remove_new_row(&saving_row));
        assert!(session.update_new_row_cell(&late_row, "name", json!("Bob")));

        session.finish_save(&pending, Err(ServiceError::RequestFailed("Failed to add row".into())));
        assert!(!session.is_row_in_flight(&saving_row));
        assert!(session.update_new_row_cell(&saving_row, "name", json!("Alice")));
        assert!(session.remove_new_row(&saving_row));
    }

    #[test]
    fn test_failed_save_keeps_edits() {
        let mut session = EditSession::new(columns());
        session.update_existing_row_cell("r1", "name", json!("a"));
        let pending = session.begin_save().unwrap();

        let outcome = session.finish_save(
            &pending,
            Err(ServiceError::RequestFailed("Failed to update row".into())),
        );

        assert!(matches!(outcome, SaveOutcome::Failed(_)));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(
            session.last_error().map(ToString::to_string),
            Some("Failed to update row".to_string())
        );
        assert!(session.has_pending_changes());
    }

    #[test]
    fn test_discard_abandons_running_save() {
        let mut session = EditSession::new(columns());
        session.add_new_row();
        let pending = session.begin_save().unwrap();

        session.discard();
        assert!(pending.cancel.is_cancelled());
        assert_eq!(session.state(), SessionState::Clean);

        let outcome = session.finish_save(&pending, Err(ServiceError::Cancelled));
        assert_eq!(outcome, SaveOutcome::Stale);
        assert_eq!(session.last_error(), None);
        assert_eq!(session.state(), SessionState::Clean);
    }

    #[test]
    fn test_successful_save_keeps_edits_made_during_save() {
        let mut session = EditSession::new(columns());
        let saved_row = session.add_new_row();
        session.update_existing_row_cell("r1", "name", json!("a"));
        let pending = session.begin_save().unwrap();

        let late_row = session.add_new_row();
        session.update_existing_row_cell("r2", "age", json!("5"));

        let outcome = session.finish_save(&pending, Ok(CommitReport { created: 1, updated: 1 }));
        assert_eq!(outcome, SaveOutcome::Committed(CommitReport { created: 1, updated: 1 }));
        assert!(!session.is_new_row(&saved_row));
        assert!(session.is_new_row(&late_row));
        assert_eq!(session.patch_for("r1"), None);
        assert!(session.patch_for("r2").is_some());
    }
}
