//! Dataset connections.
//!
//! A dataset is one side of a task: a store of records grouped by object
//! name. Two backends are provided:
//!
//! - [`SqliteDataset`]: a structured store with content-object semantics
//!   (documents, versions, links and binary payloads)
//! - [`JsonlDataset`]: a directory of `<Object>.jsonl` files
//!
//! # Example
//!
//! ```ignore
//! let source = open_dataset(Path::new("prod.db"))?;
//! let links = source.query_multi(&queries).await?;
//! ```

mod jsonl;
mod query;
mod schema;
mod sqlite;

use std::future::Future;
use std::path::Path;

use serde::Serialize;

use crate::model::attachment::{DOCUMENT_OBJECT, LINK_OBJECT, VERSION_OBJECT};
use crate::model::{Operation, Record};
use crate::sync::SyncResult;

pub use jsonl::{append_jsonl, atomic_write, read_jsonl, write_jsonl, JsonlDataset};
pub use query::{build_in_queries, Condition, InFilter, Query, DEFAULT_MAX_QUERY_LENGTH};
pub use schema::CURRENT_SCHEMA_VERSION;
pub use sqlite::SqliteDataset;

/// What kind of store a dataset is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetKind {
    /// Flat files cannot hold content objects.
    pub is_file_backed: bool,
}

impl DatasetKind {
    pub const STRUCTURED: Self = Self { is_file_backed: false };
    pub const FILE: Self = Self { is_file_backed: true };
}

/// Outcome of writing one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteResult {
    /// The record as stored (with its assigned `Id` on insert).
    pub record: Record,
    /// Per-record rejection reason.
    pub error: Option<String>,
}

impl WriteResult {
    #[must_use]
    pub fn ok(record: Record) -> Self {
        Self { record, error: None }
    }

    #[must_use]
    pub fn failed(record: Record, error: impl Into<String>) -> Self {
        Self { record, error: Some(error.into()) }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Id of the stored record.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.record.key(crate::model::attachment::fields::ID)
    }
}

/// Connection to one side of a task.
///
/// Writes report per-record outcomes: a rejected record does not fail the
/// call. An `Err` means the whole call failed and nothing can be assumed
/// about its records.
pub trait DatasetConnection: Send + Sync {
    /// Kind of store behind the connection.
    fn kind(&self) -> DatasetKind;

    /// Human-readable location, for logs.
    fn label(&self) -> String;

    /// Run a single query.
    fn query(&self, query: &Query) -> impl Future<Output = SyncResult<Vec<Record>>> + Send;

    /// Run several queries and concatenate their results in order.
    fn query_multi(&self, queries: &[Query]) -> impl Future<Output = SyncResult<Vec<Record>>> + Send {
        async move {
            let mut records = Vec::new();
            for query in queries {
                records.extend(self.query(query).await?);
            }
            Ok(records)
        }
    }

    /// Write records to an object, one result per input record, in order.
    fn write(
        &self,
        object: &str,
        operation: Operation,
        records: Vec<Record>,
    ) -> impl Future<Output = SyncResult<Vec<WriteResult>>> + Send;

    /// Binary payload of a content version.
    fn fetch_blob(&self, version_id: &str) -> impl Future<Output = SyncResult<Vec<u8>>> + Send;
}

/// Either backend, chosen at runtime.
#[derive(Debug)]
pub enum AnyDataset {
    Sqlite(SqliteDataset),
    Jsonl(JsonlDataset),
}

impl DatasetConnection for AnyDataset {
    fn kind(&self) -> DatasetKind {
        match self {
            Self::Sqlite(d) => d.kind(),
            Self::Jsonl(d) => d.kind(),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Sqlite(d) => d.label(),
            Self::Jsonl(d) => d.label(),
        }
    }

    fn query(&self, query: &Query) -> impl Future<Output = SyncResult<Vec<Record>>> + Send {
        async move {
            match self {
                Self::Sqlite(d) => d.query(query).await,
                Self::Jsonl(d) => d.query(query).await,
            }
        }
    }

    fn write(
        &self,
        object: &str,
        operation: Operation,
        records: Vec<Record>,
    ) -> impl Future<Output = SyncResult<Vec<WriteResult>>> + Send {
        async move {
            match self {
                Self::Sqlite(d) => d.write(object, operation, records).await,
                Self::Jsonl(d) => d.write(object, operation, records).await,
            }
        }
    }

    fn fetch_blob(&self, version_id: &str) -> impl Future<Output = SyncResult<Vec<u8>>> + Send {
        async move {
            match self {
                Self::Sqlite(d) => d.fetch_blob(version_id).await,
                Self::Jsonl(d) => d.fetch_blob(version_id).await,
            }
        }
    }
}

/// Generate an 18-character record id with an object-specific prefix.
pub(crate) fn new_record_id(object: &str) -> String {
    let prefix = match object {
        DOCUMENT_OBJECT => "069",
        VERSION_OBJECT => "068",
        LINK_OBJECT => "06A",
        _ => "a0R",
    };
    format!("{prefix}{}", &uuid::Uuid::new_v4().simple().to_string()[..15])
}

/// Whether a path names a SQLite database rather than a JSONL directory.
#[must_use]
pub fn is_database_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "db" | "sqlite" | "sqlite3"))
}

/// Open a dataset by path.
///
/// `.db`, `.sqlite` and `.sqlite3` files open as SQLite databases; anything
/// else is treated as a directory of JSONL files.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the directory
/// cannot be created.
pub fn open_dataset(path: &Path) -> SyncResult<AnyDataset> {
    if is_database_path(path) {
        Ok(AnyDataset::Sqlite(SqliteDataset::open(path)?))
    } else {
        Ok(AnyDataset::Jsonl(JsonlDataset::open(path)?))
    }
}
