//! Per-row field patches for existing rows

use indexmap::IndexMap;
use serde_json::Value;
use tabula_core::{FieldMap, RowId};

/// Field-level edits keyed by row id, in first-edit order.
///
/// A row id appears at most once. Writing the same field twice keeps the
/// last value; writing different fields of one row merges them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChanges {
    rows: IndexMap<RowId, FieldMap>,
}

impl PendingChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `{column: value}` into the patch for `row_id`
    pub fn set_field(&mut self, row_id: &str, column: impl Into<String>, value: Value) {
        match self.rows.get_mut(row_id) {
            Some(patch) => {
                patch.insert(column.into(), value);
            }
            None => {
                let mut patch = FieldMap::new();
                patch.insert(column.into(), value);
                self.rows.insert(row_id.to_string(), patch);
            }
        }
    }

    pub fn get(&self, row_id: &str) -> Option<&FieldMap> {
        self.rows.get(row_id)
    }

    pub fn get_field(&self, row_id: &str, column: &str) -> Option<&Value> {
        self.rows.get(row_id).and_then(|patch| patch.get(column))
    }

    pub fn contains(&self, row_id: &str) -> bool {
        self.rows.contains_key(row_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RowId, &FieldMap)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Drop every field whose value still equals what `saved` committed.
    /// Fields edited again after the snapshot survive; emptied rows go away.
    pub fn remove_saved(&mut self, saved: &PendingChanges) {
        for (row_id, saved_patch) in saved.iter() {
            let Some(patch) = self.rows.get_mut(row_id) else {
                continue;
            };
            for (column, value) in saved_patch {
                if patch.get(column) == Some(value) {
                    patch.remove(column);
                }
            }
            if patch.is_empty() {
                self.rows.shift_remove(row_id);
            }
        }
    }
}
