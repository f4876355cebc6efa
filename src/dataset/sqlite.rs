//! SQLite datasets.
//!
//! A structured store that behaves like the platform for content objects:
//!
//! - inserting a `ContentVersion` without a `ContentDocumentId` creates the
//!   document; with one, it becomes the new latest version of that document
//! - a `ContentDocumentLink` must point at an existing document, and an
//!   owner can link a document only once
//! - deleting a `ContentDocument` removes its versions, payloads and links
//!
//! Every write call runs in one IMMEDIATE transaction. Records the store
//! rejects are reported per record and do not roll the call back.

use std::future::Future;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::dataset::schema::apply_schema;
use crate::dataset::{new_record_id, DatasetConnection, DatasetKind, Query, WriteResult};
use crate::model::attachment::{fields, DOCUMENT_OBJECT, LINK_OBJECT, VERSION_OBJECT};
use crate::model::{FieldValue, Operation, Record};
use crate::sync::{SyncError, SyncResult};

/// Field on `ContentDocument` pointing at its latest version.
const LATEST_VERSION_ID: &str = "LatestPublishedVersionId";

/// Per-record outcome inside a write: `Err` is a rejection, not a failure.
type Outcome = Result<Record, String>;

/// SQLite-backed dataset.
#[derive(Debug)]
pub struct SqliteDataset {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteDataset {
    /// Open (creating if needed) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema cannot be applied.
    pub fn open(path: &Path) -> SyncResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), label: path.display().to_string() })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), label: ":memory:".to_string() })
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Database("connection lock poisoned".to_string()))
    }

    /// Store records as given, keeping their ids.
    ///
    /// No content-object rules are applied; `VersionData` payloads are moved
    /// to the blob table. Used to seed a dataset from exported data.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails. Nothing is stored in that case.
    pub fn load_records(&self, object: &str, records: Vec<Record>) -> SyncResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let count = records.len();
        for mut record in records {
            let id = record.key(fields::ID).unwrap_or_else(|| new_record_id(object));
            record.set(fields::ID, id.as_str());
            if let Some(payload) = take_payload(&mut record) {
                let checksum = put_blob(&tx, &id, &payload)?;
                record.set(fields::CHECKSUM, checksum);
            }
            put_record(&tx, object, &id, &record)?;
        }

        tx.commit()?;
        debug!(object, count, "Records loaded");
        Ok(count)
    }

    fn run_query(&self, query: &Query) -> SyncResult<Vec<Record>> {
        let conn = self.lock()?;
        let records = select_object(&conn, &query.object)?;
        trace!(%query, scanned = records.len(), "Query");
        Ok(records
            .iter()
            .filter(|r| query.matches(r))
            .map(|r| query.project(r))
            .collect())
    }

    fn apply_write(
        &self,
        object: &str,
        operation: Operation,
        records: Vec<Record>,
    ) -> SyncResult<Vec<WriteResult>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let outcome = write_one(&tx, object, operation, record.clone())?;
            results.push(match outcome {
                Ok(stored) => WriteResult::ok(stored),
                Err(reason) => WriteResult::failed(record, reason),
            });
        }

        tx.commit()?;

        let rejected = results.iter().filter(|r| !r.is_success()).count();
        debug!(object, %operation, written = results.len() - rejected, rejected, "Write applied");
        Ok(results)
    }

    fn read_blob(&self, version_id: &str) -> SyncResult<Vec<u8>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT data FROM blobs WHERE version_id = ?1",
            [version_id],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()?
        .ok_or_else(|| SyncError::RemoteRead(format!("no data for content version {version_id}")))
    }
}

impl DatasetConnection for SqliteDataset {
    fn kind(&self) -> DatasetKind {
        DatasetKind::STRUCTURED
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn query(&self, query: &Query) -> impl Future<Output = SyncResult<Vec<Record>>> + Send {
        std::future::ready(self.run_query(query))
    }

    fn write(
        &self,
        object: &str,
        operation: Operation,
        records: Vec<Record>,
    ) -> impl Future<Output = SyncResult<Vec<WriteResult>>> + Send {
        std::future::ready(self.apply_write(object, operation, records))
    }

    fn fetch_blob(&self, version_id: &str) -> impl Future<Output = SyncResult<Vec<u8>>> + Send {
        std::future::ready(self.read_blob(version_id))
    }
}

/// SHA-256 of a payload, hex encoded.
#[must_use]
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn write_one(tx: &Transaction, object: &str, operation: Operation, record: Record) -> SyncResult<Outcome> {
    let existing_id = match record.key(fields::ID) {
        Some(id) if get_record(tx, object, &id)?.is_some() => Some(id),
        _ => None,
    };

    match operation {
        Operation::Readonly => Ok(Err("operation not permitted: Readonly".to_string())),
        Operation::Insert => insert(tx, object, record),
        Operation::Update | Operation::Upsert => match existing_id {
            Some(id) => update(tx, object, &id, &record),
            None if operation == Operation::Upsert => insert(tx, object, record),
            None => Ok(Err(not_found(&record))),
        },
        Operation::Delete => match existing_id {
            Some(id) => delete(tx, object, &id),
            None => Ok(Err(not_found(&record))),
        },
    }
}

fn not_found(record: &Record) -> String {
    match record.key(fields::ID) {
        Some(id) => format!("entity is deleted or does not exist: {id}"),
        None => "missing required field: Id".to_string(),
    }
}

fn insert(tx: &Transaction, object: &str, mut record: Record) -> SyncResult<Outcome> {
    match object {
        VERSION_OBJECT => insert_version(tx, record),
        DOCUMENT_OBJECT => Ok(Err("documents are created by inserting a content version".to_string())),
        LINK_OBJECT => insert_link(tx, record),
        _ => {
            let id = new_record_id(object);
            record.set(fields::ID, id.as_str());
            put_record(tx, object, &id, &record)?;
            Ok(Ok(record))
        }
    }
}

fn insert_version(tx: &Transaction, mut record: Record) -> SyncResult<Outcome> {
    let Some(payload) = take_payload(&mut record) else {
        return Ok(Err(format!("missing required field: {}", fields::VERSION_DATA)));
    };

    let version_id = new_record_id(VERSION_OBJECT);

    let mut document = match record.key(fields::CONTENT_DOCUMENT_ID) {
        Some(content_id) => {
            let Some(document) = get_record(tx, DOCUMENT_OBJECT, &content_id)? else {
                return Ok(Err(format!("content document does not exist: {content_id}")));
            };
            demote_versions(tx, &content_id)?;
            document
        }
        None => Record::new().with(fields::ID, new_record_id(DOCUMENT_OBJECT)),
    };
    let content_id = document.key(fields::ID).unwrap_or_default();

    if let Some(title) = record.get(fields::TITLE).or_else(|| record.get(fields::PATH_ON_CLIENT)) {
        document.set(fields::TITLE, title.clone());
    }
    document.set(LATEST_VERSION_ID, version_id.as_str());
    put_record(tx, DOCUMENT_OBJECT, &content_id, &document)?;

    let checksum = put_blob(tx, &version_id, &payload)?;
    record.set(fields::ID, version_id.as_str());
    record.set(fields::CONTENT_DOCUMENT_ID, content_id.as_str());
    record.set(fields::IS_LATEST, true);
    record.set(fields::CHECKSUM, checksum);
    if !record.contains(fields::CONTENT_MODIFIED_DATE) {
        record.set(fields::CONTENT_MODIFIED_DATE, chrono::Utc::now().to_rfc3339());
    }
    put_record(tx, VERSION_OBJECT, &version_id, &record)?;

    Ok(Ok(record))
}

/// Clear `IsLatest` on every version of a document.
fn demote_versions(tx: &Transaction, content_id: &str) -> SyncResult<()> {
    for mut version in select_object(tx, VERSION_OBJECT)? {
        if version.key(fields::CONTENT_DOCUMENT_ID).as_deref() != Some(content_id)
            || version.get(fields::IS_LATEST) != Some(&FieldValue::Bool(true))
        {
            continue;
        }
        if let Some(id) = version.key(fields::ID) {
            version.set(fields::IS_LATEST, false);
            put_record(tx, VERSION_OBJECT, &id, &version)?;
        }
    }
    Ok(())
}

fn insert_link(tx: &Transaction, mut record: Record) -> SyncResult<Outcome> {
    let (Some(owner_id), Some(content_id)) =
        (record.key(fields::LINKED_ENTITY_ID), record.key(fields::CONTENT_DOCUMENT_ID))
    else {
        return Ok(Err(format!(
            "missing required field: {} or {}",
            fields::LINKED_ENTITY_ID,
            fields::CONTENT_DOCUMENT_ID
        )));
    };

    if get_record(tx, DOCUMENT_OBJECT, &content_id)?.is_none() {
        return Ok(Err(format!("content document does not exist: {content_id}")));
    }
    let duplicate = select_object(tx, LINK_OBJECT)?.iter().any(|link| {
        link.key(fields::LINKED_ENTITY_ID).as_deref() == Some(owner_id.as_str())
            && link.key(fields::CONTENT_DOCUMENT_ID).as_deref() == Some(content_id.as_str())
    });
    if duplicate {
        return Ok(Err(format!("duplicate value: {content_id} is already linked to {owner_id}")));
    }

    let id = new_record_id(LINK_OBJECT);
    record.set(fields::ID, id.as_str());
    put_record(tx, LINK_OBJECT, &id, &record)?;
    Ok(Ok(record))
}

fn update(tx: &Transaction, object: &str, id: &str, changes: &Record) -> SyncResult<Outcome> {
    if object == VERSION_OBJECT && changes.contains(fields::VERSION_DATA) {
        return Ok(Err("VersionData cannot be changed; insert a new version".to_string()));
    }
    let Some(mut stored) = get_record(tx, object, id)? else {
        return Ok(Err(not_found(changes)));
    };
    stored.merge(changes);
    put_record(tx, object, id, &stored)?;
    Ok(Ok(stored))
}

fn delete(tx: &Transaction, object: &str, id: &str) -> SyncResult<Outcome> {
    let Some(stored) = get_record(tx, object, id)? else {
        return Ok(Err(format!("entity is deleted or does not exist: {id}")));
    };

    if object == DOCUMENT_OBJECT {
        for child in [VERSION_OBJECT, LINK_OBJECT] {
            for record in select_object(tx, child)? {
                if record.key(fields::CONTENT_DOCUMENT_ID).as_deref() != Some(id) {
                    continue;
                }
                if let Some(child_id) = record.key(fields::ID) {
                    delete_record(tx, child, &child_id)?;
                    if child == VERSION_OBJECT {
                        tx.execute("DELETE FROM blobs WHERE version_id = ?1", [&child_id])?;
                    }
                }
            }
        }
    } else if object == VERSION_OBJECT {
        tx.execute("DELETE FROM blobs WHERE version_id = ?1", [id])?;
    }

    delete_record(tx, object, id)?;
    Ok(Ok(stored))
}

/// Remove `VersionData` from a record and return it as bytes.
fn take_payload(record: &mut Record) -> Option<Vec<u8>> {
    match record.remove(fields::VERSION_DATA)? {
        FieldValue::Bytes(bytes) => Some(bytes),
        FieldValue::Text(text) => Some(text.into_bytes()),
        _ => None,
    }
}

fn select_object(conn: &Connection, object: &str) -> SyncResult<Vec<Record>> {
    let mut stmt = conn.prepare("SELECT data FROM records WHERE object = ?1 ORDER BY seq")?;
    let rows = stmt.query_map([object], |row| row.get::<_, String>(0))?;

    let mut records = Vec::new();
    for data in rows {
        records.push(serde_json::from_str(&data?)?);
    }
    Ok(records)
}

fn get_record(conn: &Connection, object: &str, id: &str) -> SyncResult<Option<Record>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM records WHERE object = ?1 AND id = ?2",
            [object, id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
}

fn put_record(conn: &Connection, object: &str, id: &str, record: &Record) -> SyncResult<()> {
    conn.execute(
        "INSERT INTO records (object, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(object, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        rusqlite::params![
            object,
            id,
            serde_json::to_string(record)?,
            chrono::Utc::now().timestamp_millis()
        ],
    )?;
    Ok(())
}

fn delete_record(conn: &Connection, object: &str, id: &str) -> SyncResult<()> {
    conn.execute("DELETE FROM records WHERE object = ?1 AND id = ?2", [object, id])?;
    Ok(())
}

fn put_blob(conn: &Connection, version_id: &str, data: &[u8]) -> SyncResult<String> {
    let checksum = checksum(data);
    conn.execute(
        "INSERT OR REPLACE INTO blobs (version_id, data, checksum, size) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![version_id, data, checksum, data.len() as i64],
    )?;
    Ok(checksum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Condition;
    use tempfile::TempDir;

    fn version(title: &str, data: &[u8]) -> Record {
        Record::new()
            .with(fields::TITLE, title)
            .with(fields::PATH_ON_CLIENT, format!("{title}.pdf"))
            .with(fields::VERSION_DATA, data.to_vec())
    }

    async fn insert_one(dataset: &SqliteDataset, object: &str, record: Record) -> Record {
        let mut results = dataset.write(object, Operation::Insert, vec![record]).await.unwrap();
        let result = results.remove(0);
        assert!(result.is_success(), "{:?}", result.error);
        result.record
    }

    #[tokio::test]
    async fn test_version_insert_creates_document() {
        let dataset = SqliteDataset::open_memory().unwrap();

        let stored = insert_one(&dataset, VERSION_OBJECT, version("Q1", b"report")).await;

        let content_id = stored.key(fields::CONTENT_DOCUMENT_ID).unwrap();
        assert!(content_id.starts_with("069"));
        assert_eq!(stored.get(fields::IS_LATEST), Some(&FieldValue::Bool(true)));
        assert!(!stored.contains(fields::VERSION_DATA));
        assert_eq!(stored.get_str(fields::CHECKSUM), Some(checksum(b"report").as_str()));

        let documents = dataset.query(&Query::all(DOCUMENT_OBJECT)).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].get_str(fields::TITLE), Some("Q1"));

        let version_id = stored.key(fields::ID).unwrap();
        assert_eq!(dataset.fetch_blob(&version_id).await.unwrap(), b"report".to_vec());
    }

    #[tokio::test]
    async fn test_new_version_demotes_previous() {
        let dataset = SqliteDataset::open_memory().unwrap();
        let first = insert_one(&dataset, VERSION_OBJECT, version("Q1", b"v1")).await;
        let content_id = first.key(fields::CONTENT_DOCUMENT_ID).unwrap();

        let second = insert_one(
            &dataset,
            VERSION_OBJECT,
            version("Q1", b"v2").with(fields::CONTENT_DOCUMENT_ID, content_id.as_str()),
        )
        .await;
        assert_eq!(second.key(fields::CONTENT_DOCUMENT_ID), Some(content_id.clone()));

        let latest = dataset
            .query(&Query::all(VERSION_OBJECT).with_condition(Condition::eq(fields::IS_LATEST, true)))
            .await
            .unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].key(fields::ID), second.key(fields::ID));
    }

    #[tokio::test]
    async fn test_version_rejections() {
        let dataset = SqliteDataset::open_memory().unwrap();
        let results = dataset
            .write(
                VERSION_OBJECT,
                Operation::Insert,
                vec![
                    Record::new().with(fields::TITLE, "no data"),
                    version("orphan", b"x").with(fields::CONTENT_DOCUMENT_ID, "069missing"),
                ],
            )
            .await
            .unwrap();
        assert!(results.iter().all(|r| !r.is_success()));
        assert!(dataset.query(&Query::all(DOCUMENT_OBJECT)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_rules() {
        let dataset = SqliteDataset::open_memory().unwrap();
        let stored = insert_one(&dataset, VERSION_OBJECT, version("Q1", b"x")).await;
        let content_id = stored.key(fields::CONTENT_DOCUMENT_ID).unwrap();
        let link = |content: &str| {
            Record::new()
                .with(fields::LINKED_ENTITY_ID, "001A")
                .with(fields::CONTENT_DOCUMENT_ID, content)
                .with(fields::SHARE_TYPE, "V")
        };

        let results = dataset
            .write(
                LINK_OBJECT,
                Operation::Insert,
                vec![link(&content_id), link(&content_id), link("069missing")],
            )
            .await
            .unwrap();

        assert!(results[0].is_success());
        assert!(results[1].error.as_deref().unwrap().contains("duplicate"));
        assert!(!results[2].is_success());
    }

    #[tokio::test]
    async fn test_document_delete_cascades() {
        let dataset = SqliteDataset::open_memory().unwrap();
        let stored = insert_one(&dataset, VERSION_OBJECT, version("Q1", b"x")).await;
        let content_id = stored.key(fields::CONTENT_DOCUMENT_ID).unwrap();
        insert_one(
            &dataset,
            LINK_OBJECT,
            Record::new()
                .with(fields::LINKED_ENTITY_ID, "001A")
                .with(fields::CONTENT_DOCUMENT_ID, content_id.as_str()),
        )
        .await;

        let results = dataset
            .write(
                DOCUMENT_OBJECT,
                Operation::Delete,
                vec![Record::new().with(fields::ID, content_id.as_str())],
            )
            .await
            .unwrap();
        assert!(results[0].is_success());

        for object in [DOCUMENT_OBJECT, VERSION_OBJECT, LINK_OBJECT] {
            assert!(dataset.query(&Query::all(object)).await.unwrap().is_empty(), "{object}");
        }
        assert!(dataset.fetch_blob(&stored.key(fields::ID).unwrap()).await.is_err());

        let again = dataset
            .write(
                DOCUMENT_OBJECT,
                Operation::Delete,
                vec![Record::new().with(fields::ID, content_id.as_str())],
            )
            .await
            .unwrap();
        assert!(!again[0].is_success());
    }

    #[tokio::test]
    async fn test_update_and_upsert() {
        let dataset = SqliteDataset::open_memory().unwrap();
        let account = insert_one(&dataset, "Account", Record::new().with("Name", "Acme")).await;
        let id = account.key(fields::ID).unwrap();

        let results = dataset
            .write(
                "Account",
                Operation::Upsert,
                vec![
                    Record::new().with(fields::ID, id.as_str()).with("Name", "Acme Corp"),
                    Record::new().with("Name", "Globex"),
                ],
            )
            .await
            .unwrap();
        assert!(results.iter().all(WriteResult::is_success));

        let names: Vec<_> = dataset
            .query(&Query::all("Account"))
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.get_str("Name").map(String::from))
            .collect();
        assert_eq!(names, vec!["Acme Corp", "Globex"]);

        let missing = dataset
            .write("Account", Operation::Update, vec![Record::new().with(fields::ID, "nope")])
            .await
            .unwrap();
        assert!(!missing[0].is_success());
    }

    #[tokio::test]
    async fn test_load_records_keeps_ids_and_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("source.db");

        {
            let dataset = SqliteDataset::open(&path).unwrap();
            let loaded = dataset
                .load_records(
                    VERSION_OBJECT,
                    vec![Record::new()
                        .with(fields::ID, "068S")
                        .with(fields::CONTENT_DOCUMENT_ID, "069S")
                        .with(fields::VERSION_DATA, b"payload".to_vec())],
                )
                .unwrap();
            assert_eq!(loaded, 1);
        }

        let dataset = SqliteDataset::open(&path).unwrap();
        let versions = dataset.query(&Query::all(VERSION_OBJECT)).await.unwrap();
        assert_eq!(versions[0].key(fields::ID).as_deref(), Some("068S"));
        assert_eq!(versions[0].get_str(fields::CHECKSUM), Some(checksum(b"payload").as_str()));
        assert_eq!(dataset.fetch_blob("068S").await.unwrap(), b"payload".to_vec());
    }
}
