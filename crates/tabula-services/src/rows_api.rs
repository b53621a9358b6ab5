//! Network boundary for row mutations

use std::fmt;

use async_trait::async_trait;
use tabula_core::FieldMap;

/// Row mutation endpoints of the backend.
///
/// Implementations send exactly one request per call and report failure
/// without interpreting it; fallback messages are chosen by the caller.
#[async_trait]
pub trait RowsApi: Send + Sync {
    /// Create a row from a fully coerced field map
    async fn create_row(&self, data: &FieldMap) -> Result<(), RequestError>;

    /// Apply a coerced partial field map to an existing row
    async fn update_row(&self, row_id: &str, data: &FieldMap) -> Result<(), RequestError>;

    /// Delete an existing row
    async fn delete_row(&self, row_id: &str) -> Result<(), RequestError>;
}

/// Kind of row request, used for logging and fallback messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowOperation {
    Create,
    Update,
    Delete,
}

impl RowOperation {
    /// Message surfaced when the server gives no reason
    pub fn fallback_message(&self) -> &'static str {
        match self {
            RowOperation::Create => "Failed to add row",
            RowOperation::Update => "Failed to update row",
            RowOperation::Delete => "Failed to delete row",
        }
    }
}

impl fmt::Display for RowOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowOperation::Create => write!(f, "create"),
            RowOperation::Update => write!(f, "update"),
            RowOperation::Delete => write!(f, "delete"),
        }
    }
}

/// A failed row request.
///
/// `status` is absent when the request never got a response. `message` is
/// the server's `error` field, or the transport error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub status: Option<u16>,
    pub message: Option<String>,
}

impl RequestError {
    /// Non-success response, with the server's reason if it sent one
    pub fn status(status: u16, message: Option<String>) -> Self {
        Self {
            status: Some(status),
            message: message.filter(|m| !m.is_empty()),
        }
    }

    /// The request never produced a response
    pub fn transport(err: impl fmt::Display) -> Self {
        Self {
            status: None,
            message: Some(err.to_string()),
        }
    }

    /// User-visible text for this failure
    pub fn into_message(self, fallback: impl Into<String>) -> String {
        self.message.unwrap_or_else(|| fallback.into())
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.message) {
            (Some(status), Some(message)) => write!(f, "HTTP {}: {}", status, message),
            (Some(status), None) => write!(f, "HTTP {}", status),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "request failed"),
        }
    }
}

impl std::error::Error for RequestError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_wins_over_fallback() {
        let err = RequestError::status(400, Some("Name is required".into()));
        assert_eq!(
            err.into_message(RowOperation::Create.fallback_message()),
            "Name is required"
        );
    }

    #[test]
    fn test_empty_server_message_uses_fallback() {
        let err = RequestError::status(500, Some(String::new()));
        assert_eq!(
            err.into_message(RowOperation::Update.fallback_message()),
            "Failed to update row"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(RequestError::status(404, None).to_string(), "HTTP 404");
        assert_eq!(
            RequestError::transport("connection refused").to_string(),
            "connection refused"
        );
        assert_eq!(RowOperation::Delete.to_string(), "delete");
    }
}
