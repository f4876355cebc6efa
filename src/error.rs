//! Error types for recsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=dataset, 3=not_found, 4=data, etc.)
//! - Retryability flags
//! - Recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for recsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Dataset (exit 2)
    DatabaseError,
    ReadError,

    // Not Found (exit 3)
    DatasetNotFound,
    TaskNotFound,

    // Data (exit 4)
    InvalidArgument,
    MalformedRecord,
    DuplicateId,
    DuplicateExternalId,
    InvalidRecord,

    // Sync (exit 6)
    WriteError,
    NotSupported,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Interrupted (exit 9)
    Aborted,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ReadError => "READ_ERROR",
            Self::DatasetNotFound => "DATASET_NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::MalformedRecord => "MALFORMED_RECORD",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::DuplicateExternalId => "DUPLICATE_EXTERNAL_ID",
            Self::InvalidRecord => "INVALID_RECORD",
            Self::WriteError => "WRITE_ERROR",
            Self::NotSupported => "NOT_SUPPORTED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::Aborted => "ABORTED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError | Self::ReadError => 2,
            Self::DatasetNotFound | Self::TaskNotFound => 3,
            Self::InvalidArgument
            | Self::MalformedRecord
            | Self::DuplicateId
            | Self::DuplicateExternalId
            | Self::InvalidRecord => 4,
            Self::WriteError | Self::NotSupported => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::Aborted => 9,
        }
    }

    /// Whether running again unchanged may succeed.
    ///
    /// True for transient dataset failures and interrupted runs.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError | Self::ReadError | Self::WriteError | Self::Aborted
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in recsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Dataset not found: {}", path.display())]
    DatasetNotFound { path: PathBuf },

    #[error("No task is defined for object {object}")]
    TaskNotFound { object: String },

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Interrupted: {pending} actions were not started")]
    Aborted { pending: usize },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::DatasetNotFound { .. } => ErrorCode::DatasetNotFound,
            Self::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            Self::Sync(err) => match err {
                SyncError::MalformedRecord { .. } => ErrorCode::MalformedRecord,
                SyncError::DuplicateId { .. } => ErrorCode::DuplicateId,
                SyncError::DuplicateExternalId { .. } => ErrorCode::DuplicateExternalId,
                SyncError::InvalidRecord { .. } => ErrorCode::InvalidRecord,
                SyncError::UnsupportedTarget
                | SyncError::OperationNotPermitted { .. }
                | SyncError::NothingToSync => ErrorCode::NotSupported,
                SyncError::RemoteRead(_) => ErrorCode::ReadError,
                SyncError::RemoteWrite { .. } => ErrorCode::WriteError,
                SyncError::Database(_) => ErrorCode::DatabaseError,
                SyncError::FileNotFound(_) => ErrorCode::DatasetNotFound,
                SyncError::Io(_) => ErrorCode::IoError,
                SyncError::Json(_) => ErrorCode::JsonError,
            },
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Aborted { .. } => ErrorCode::Aborted,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Recovery hint for the user.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::DatasetNotFound { path } => Some(format!(
                "'{}' does not exist. Pass a .db/.sqlite file or a directory of <Object>.jsonl files.",
                path.display()
            )),

            Self::TaskNotFound { object } => Some(format!(
                "Add an entry for {object} to the config file or pass --object {object}."
            )),

            Self::Sync(SyncError::MalformedRecord { field, .. }) => Some(format!(
                "Every record needs a non-empty '{field}'. Check the dataset for incomplete rows."
            )),

            Self::Sync(SyncError::DuplicateExternalId { field, .. }) => Some(format!(
                "'{field}' is not unique. Set collision_policy to \"last_wins\" or \"first_wins\", \
                 or choose another external_id."
            )),

            Self::Sync(SyncError::UnsupportedTarget) => {
                Some("Use a SQLite dataset (.db, .sqlite, .sqlite3) as the target.".to_string())
            }

            Self::Sync(SyncError::OperationNotPermitted { .. }) => Some(
                "Set files.operation to Insert, Update, Upsert or Delete in the config file."
                    .to_string(),
            ),

            Self::Config(_) => Some(
                "Config is read from --config, RECSYNC_CONFIG, ./recsync.json or ~/.recsync/config.json"
                    .to_string(),
            ),

            Self::Aborted { .. } => {
                Some("Run the same command again; finished files are skipped.".to_string())
            }

            Self::Sync(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_errors_keep_their_category() {
        let err: Error = SyncError::DuplicateExternalId { field: "Name".into(), value: "Acme".into() }.into();
        assert_eq!(err.error_code(), ErrorCode::DuplicateExternalId);
        assert_eq!(err.exit_code(), 4);
        assert!(err.hint().unwrap().contains("collision_policy"));

        let err: Error = SyncError::RemoteRead("timeout".into()).into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.error_code().is_retryable());
        assert_eq!(err.to_string(), "Read failed: timeout");
    }

    #[test]
    fn test_structured_json() {
        let err = Error::DatasetNotFound { path: PathBuf::from("/nowhere.db") };
        let json = err.to_structured_json();

        assert_eq!(json["error"]["code"], "DATASET_NOT_FOUND");
        assert_eq!(json["error"]["exit_code"], 3);
        assert_eq!(json["error"]["retryable"], false);
        assert!(json["error"]["hint"].as_str().unwrap().contains("/nowhere.db"));

        let json = Error::Other("boom".into()).to_structured_json();
        assert_eq!(json["error"]["exit_code"], 1);
        assert!(json["error"].get("hint").is_none());
    }
}
