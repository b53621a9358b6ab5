//! Column and row types shared across tabula crates

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field map of a row: column name to cell value
pub type FieldMap = serde_json::Map<String, Value>;

/// Server-assigned row identifier
pub type RowId = String;

/// The closed set of column types a table can declare.
///
/// Adding a variant means extending every conversion in
/// [`crate::value_coder`] as well.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ColumnType {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Json,
}

impl ColumnType {
    /// Value a freshly staged row holds for a column of this type
    pub fn default_value(&self) -> Value {
        match self {
            ColumnType::Boolean => Value::Bool(false),
            _ => Value::Null,
        }
    }
}

/// Schema entry for one column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name, unique within its table
    pub name: String,
    /// Column type, drives coercion and rendering
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: false,
            unique: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Look up a column by name
pub fn find_column<'a>(columns: &'a [ColumnDefinition], name: &str) -> Option<&'a ColumnDefinition> {
    columns.iter().find(|c| c.name == name)
}

/// A row as fetched from the backend. Treated as read-only by the editor;
/// edits live in the session overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: RowId,
    pub data: FieldMap,
}

impl TableRow {
    pub fn new(id: impl Into<RowId>, data: FieldMap) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Raw value of a column, `None` when the row has no such field
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }
}

/// A row staged for creation, identified by a session-local id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TempRow {
    pub temp_id: String,
    pub data: FieldMap,
}

impl TempRow {
    /// Create a staged row with one default-valued field per column
    pub fn new(temp_id: impl Into<String>, columns: &[ColumnDefinition]) -> Self {
        let data = columns
            .iter()
            .map(|col| (col.name.clone(), col.column_type.default_value()))
            .collect();

        Self {
            temp_id: temp_id.into(),
            data,
        }
    }

    /// Staged rows are by definition not yet persisted
    pub fn is_new(&self) -> bool {
        true
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }

    /// Replace a single field
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.data.insert(column.into(), value);
    }
}
