//! Error types for tabvault core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in record store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The table file does not exist.
    #[error("table file not found: {path}")]
    TableNotFound {
        /// Expected location of the table.
        path: PathBuf,
    },

    /// No backup generation exists.
    #[error("no backup file found: {path}")]
    BackupNotFound {
        /// Expected location of the backup.
        path: PathBuf,
    },

    /// A position outside the current row range was addressed.
    #[error("row {position} not found (table has {count} rows)")]
    RowOutOfRange {
        /// Requested 0-based position.
        position: usize,
        /// Number of rows at the time of the request.
        count: usize,
    },

    /// Refreshing the backup generation failed. The table was not touched.
    #[error("backup failed: {source}")]
    Backup {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Rewriting the table failed.
    #[error("write failed: {source}")]
    Write {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The table file could not be parsed.
    #[error("malformed table: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },

    /// The caller supplied something the store cannot accept.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },

    /// Another process holds the data directory.
    #[error("data directory locked: another process has exclusive access")]
    DirectoryLocked,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a malformed table error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Wraps an I/O failure from the rewrite step.
    pub fn write(source: io::Error) -> Self {
        Self::Write { source }
    }

    /// Wraps an I/O failure from the backup step.
    pub fn backup(source: io::Error) -> Self {
        Self::Backup { source }
    }

    /// Returns true for the "nothing there" family: missing table, missing
    /// backup, or a position outside the row range.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::TableNotFound { .. }
                | CoreError::BackupNotFound { .. }
                | CoreError::RowOutOfRange { .. }
        )
    }

    /// Returns true if the failure happened while persisting (backup or rewrite).
    pub fn is_write_error(&self) -> bool {
        matches!(self, CoreError::Backup { .. } | CoreError::Write { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(CoreError::RowOutOfRange {
            position: 3,
            count: 1
        }
        .is_not_found());
        assert!(CoreError::backup(io::Error::new(io::ErrorKind::Other, "disk")).is_write_error());
        assert!(!CoreError::malformed("bad quote").is_not_found());
        assert!(!CoreError::DirectoryLocked.is_write_error());
    }

    #[test]
    fn backup_and_write_render_distinctly() {
        let backup = CoreError::backup(io::Error::new(io::ErrorKind::Other, "full"));
        let write = CoreError::write(io::Error::new(io::ErrorKind::Other, "full"));
        assert_ne!(backup.to_string(), write.to_string());
        assert!(backup.to_string().starts_with("backup failed"));
    }
}
