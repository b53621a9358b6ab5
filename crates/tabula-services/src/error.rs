use tabula_core::CoreError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors with user-friendly messages
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// A staged value could not be coerced for submission
    #[error(transparent)]
    InvalidFieldValue(#[from] CoreError),

    /// A row request failed; carries the server's message or the
    /// per-operation fallback
    #[error("{0}")]
    RequestFailed(String),

    /// Some deletes of a bulk delete failed
    #[error(
        "Failed to delete {failed} of {total} row(s){}. {first_error}",
        succeeded_clause(.succeeded)
    )]
    PartialBulkFailure {
        failed: usize,
        total: usize,
        succeeded: usize,
        first_error: String,
    },

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Save cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn succeeded_clause(succeeded: &usize) -> String {
    if *succeeded > 0 {
        format!(" ({} deleted successfully)", succeeded)
    } else {
        String::new()
    }
}
