//! Error types for the server.

use tabvault_core::CoreError;
use tabvault_storage::StorageError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A token failed verification (bad signature, expired, malformed).
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The caller presented no usable credential.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Malformed request body or parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Addressed something that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] CoreError),

    /// Event log storage failure.
    #[error("event log error: {0}")]
    Storage(#[from] StorageError),

    /// JSON encoding failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidToken(_) | ServerError::Unauthorized(_) => 401,
            ServerError::InvalidInput(_) => 400,
            ServerError::NotFound(_) => 404,
            ServerError::Store(e) if e.is_not_found() => 404,
            ServerError::Store(CoreError::InvalidInput { .. }) => 400,
            ServerError::Store(_)
            | ServerError::Storage(_)
            | ServerError::Encoding(_)
            | ServerError::Internal(_)
            | ServerError::Io(_) => 500,
        }
    }

    /// Message shown to HTTP callers.
    pub fn detail(&self) -> String {
        match self {
            ServerError::InvalidToken(_) | ServerError::Unauthorized(_) => {
                "Invalid token".to_string()
            }
            ServerError::Store(CoreError::TableNotFound { .. }) => "CSV file not found".to_string(),
            ServerError::Store(CoreError::BackupNotFound { .. }) => {
                "No backup file found".to_string()
            }
            ServerError::Store(CoreError::RowOutOfRange { .. }) | ServerError::NotFound(_) => {
                "Row not found".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidInput("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidInput("bad".into()).is_server_error());
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let missing = ServerError::from(CoreError::RowOutOfRange {
            position: 4,
            count: 2,
        });
        assert_eq!(missing.status_code(), 404);
        assert_eq!(missing.detail(), "Row not found");

        let write = ServerError::from(CoreError::write(io::Error::new(
            io::ErrorKind::Other,
            "disk full",
        )));
        assert_eq!(write.status_code(), 500);
        assert!(write.detail().contains("disk full"));

        let empty = ServerError::from(CoreError::invalid_input("record has no fields"));
        assert_eq!(empty.status_code(), 400);
    }

    #[test]
    fn auth_errors_hide_reason() {
        let err = ServerError::InvalidToken("signature mismatch".into());
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.detail(), "Invalid token");
    }
}
