//! Error types for tabula-core

use thiserror::Error;

/// Errors raised while coercing cell values for submission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The edit buffer for a column could not be turned into a wire value.
    /// Only JSON columns can fail this way today.
    #[error("Invalid JSON for field: {column}")]
    InvalidFieldValue { column: String, reason: String },
}

impl CoreError {
    /// Name of the column that failed coercion
    pub fn column(&self) -> &str {
        match self {
            CoreError::InvalidFieldValue { column, .. } => column,
        }
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
