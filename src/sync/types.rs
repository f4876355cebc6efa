//! Sync types for attachment synchronization.
//!
//! This module defines the actions a plan is made of, the plan itself,
//! execution statistics, and the sync error taxonomy.

use serde::Serialize;

use crate::model::Operation;

/// One synchronization action.
///
/// Serialized with an `action` tag:
/// `{"action":"update_file","owner_id":"001T1","target_content_id":"069T","source_content_id":"069S"}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    /// Attach a copy of a source file to a target owner.
    CreateFile {
        owner_id: String,
        source_content_id: String,
    },
    /// Upload a newer source version onto an existing target document.
    UpdateFile {
        owner_id: String,
        target_content_id: String,
        source_content_id: String,
    },
    /// Target document is up to date.
    SkipFile {
        owner_id: String,
        target_content_id: String,
    },
    /// Remove a target document (with its links and versions).
    DeleteFile { target_content_id: String },
}

impl SyncAction {
    /// Short action name used in logs and reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CreateFile { .. } => "create",
            Self::UpdateFile { .. } => "update",
            Self::SkipFile { .. } => "skip",
            Self::DeleteFile { .. } => "delete",
        }
    }

    /// Owning target record, if the action has one.
    #[must_use]
    pub fn owner_id(&self) -> Option<&str> {
        match self {
            Self::CreateFile { owner_id, .. }
            | Self::UpdateFile { owner_id, .. }
            | Self::SkipFile { owner_id, .. } => Some(owner_id),
            Self::DeleteFile { .. } => None,
        }
    }

    /// Target content document the action touches, if it already exists.
    #[must_use]
    pub fn target_content_id(&self) -> Option<&str> {
        match self {
            Self::UpdateFile { target_content_id, .. }
            | Self::SkipFile { target_content_id, .. }
            | Self::DeleteFile { target_content_id } => Some(target_content_id),
            Self::CreateFile { .. } => None,
        }
    }

    /// Source content document the action copies from, if any.
    #[must_use]
    pub fn source_content_id(&self) -> Option<&str> {
        match self {
            Self::CreateFile { source_content_id, .. } | Self::UpdateFile { source_content_id, .. } => {
                Some(source_content_id)
            }
            Self::SkipFile { .. } | Self::DeleteFile { .. } => None,
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateFile { owner_id, source_content_id } => {
                write!(f, "create {source_content_id} -> {owner_id}")
            }
            Self::UpdateFile { owner_id, target_content_id, source_content_id } => {
                write!(f, "update {target_content_id} <- {source_content_id} ({owner_id})")
            }
            Self::SkipFile { owner_id, target_content_id } => {
                write!(f, "skip {target_content_id} ({owner_id})")
            }
            Self::DeleteFile { target_content_id } => write!(f, "delete {target_content_id}"),
        }
    }
}

/// Why a plan stopped early.
///
/// Notices are outcomes, not failures: the caller reports them and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanNotice {
    /// The target is a flat file and cannot hold content objects.
    UnsupportedTarget,
    /// The requested operation does not allow writes.
    OperationNotPermitted(Operation),
    /// No source owner has any attachment.
    NothingToSync,
}

impl PlanNotice {
    /// The matching error, for callers that report notices as errors.
    #[must_use]
    pub fn as_error(&self) -> SyncError {
        match self {
            Self::UnsupportedTarget => SyncError::UnsupportedTarget,
            Self::OperationNotPermitted(operation) => SyncError::OperationNotPermitted {
                operation: *operation,
            },
            Self::NothingToSync => SyncError::NothingToSync,
        }
    }
}

/// An ordered set of actions computed for one run.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Operation the actions were computed under (Insert after a delete pass).
    pub operation: Operation,
    /// Actions, every `DeleteFile` first.
    pub actions: Vec<SyncAction>,
    /// Early-exit reason, if any.
    pub notice: Option<PlanNotice>,
}

impl Plan {
    /// An empty plan with an early-exit notice.
    #[must_use]
    pub fn halted(operation: Operation, notice: PlanNotice) -> Self {
        Self { operation, actions: Vec::new(), notice: Some(notice) }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Count actions per kind.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action {
                SyncAction::CreateFile { .. } => summary.create += 1,
                SyncAction::UpdateFile { .. } => summary.update += 1,
                SyncAction::SkipFile { .. } => summary.skip += 1,
                SyncAction::DeleteFile { .. } => summary.delete += 1,
            }
        }
        summary
    }
}

/// Per-kind action counts of a plan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub skip: usize,
    pub delete: usize,
}

impl PlanSummary {
    /// Number of actions that write to the target.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.create + self.update + self.delete
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.writes() + self.skip
    }
}

/// A single action that failed during execution.
#[derive(Debug, Clone, Serialize)]
pub struct ActionFailure {
    pub action: SyncAction,
    /// Machine-readable error code (see [`SyncError::code`]).
    pub code: &'static str,
    pub message: String,
}

impl ActionFailure {
    #[must_use]
    pub fn new(action: SyncAction, error: &SyncError) -> Self {
        Self { action, code: error.code(), message: error.to_string() }
    }
}

/// Outcome of applying a plan.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExecutionResult {
    /// Number of files attached to a target owner.
    pub created: usize,
    /// Number of target documents that received a new version.
    pub updated: usize,
    /// Number of target documents left as they were.
    pub skipped: usize,
    /// Number of target documents removed.
    pub deleted: usize,
    /// Number of actions never dispatched because the job was aborted.
    pub aborted: usize,
    /// Actions that failed, with reasons.
    pub failures: Vec<ActionFailure>,
}

impl ExecutionResult {
    /// Number of actions that completed (skips included).
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.skipped + self.deleted
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when every action completed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.aborted == 0
    }

    /// Fold another partial result into this one.
    pub fn absorb(&mut self, other: ExecutionResult) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.deleted += other.deleted;
        self.aborted += other.aborted;
        self.failures.extend(other.failures);
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A record lacks a required field.
    #[error("Malformed record at position {position}: missing required field '{field}'")]
    MalformedRecord {
        /// Field that was missing or empty.
        field: String,
        /// Zero-based position in the input sequence.
        position: usize,
    },

    /// Two records share an internal id.
    #[error("Duplicate record id: {id}")]
    DuplicateId { id: String },

    /// Two records share an external-id value under the `Reject` policy.
    #[error("Duplicate external id value '{value}' in field '{field}'")]
    DuplicateExternalId { field: String, value: String },

    /// File-backed target requested for attachment sync.
    #[error("The target is a file: attachment synchronization is not supported")]
    UnsupportedTarget,

    /// Operation does not allow the requested action.
    #[error("Operation {operation} is not permitted for attachment synchronization")]
    OperationNotPermitted { operation: Operation },

    /// Nothing on the source side to synchronize.
    #[error("No source attachments to synchronize")]
    NothingToSync,

    /// A read against a dataset failed.
    #[error("Read failed: {0}")]
    RemoteRead(String),

    /// A write against the target failed.
    #[error("Write to {object} failed: {message}")]
    RemoteWrite { object: String, message: String },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// JSONL file not found.
    #[error("JSONL file not found: {0}")]
    FileNotFound(String),

    /// Invalid record format.
    #[error("Invalid record at line {line}: {message}")]
    InvalidRecord {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },
}

impl SyncError {
    /// Machine-readable SCREAMING_SNAKE code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedRecord { .. } => "MALFORMED_RECORD",
            Self::DuplicateId { .. } => "DUPLICATE_ID",
            Self::DuplicateExternalId { .. } => "DUPLICATE_EXTERNAL_ID",
            Self::UnsupportedTarget => "UNSUPPORTED_TARGET",
            Self::OperationNotPermitted { .. } => "OPERATION_NOT_PERMITTED",
            Self::NothingToSync => "NOTHING_TO_SYNC",
            Self::RemoteRead(_) => "REMOTE_READ",
            Self::RemoteWrite { .. } => "REMOTE_WRITE",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
        }
    }

    /// Whether the whole task should stop on this error.
    ///
    /// Notices and per-action write failures are not fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedTarget
                | Self::OperationNotPermitted { .. }
                | Self::NothingToSync
                | Self::RemoteWrite { .. }
        )
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
