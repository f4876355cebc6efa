//! JSONL directory datasets.
//!
//! Each object lives in its own `<Object>.jsonl` file, one record per line.
//! Files are rewritten atomically (temp file, fsync, rename) so a crash
//! never leaves a half-written object behind.

use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::dataset::{new_record_id, DatasetConnection, DatasetKind, Query, WriteResult};
use crate::model::attachment::{fields, VERSION_OBJECT};
use crate::model::{FieldValue, Operation, Record};
use crate::sync::{SyncError, SyncResult};

/// Write content to a file atomically.
///
/// The content goes to a sibling `.tmp` file first, is synced to disk, then
/// renamed over the target. On failure the original file is untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> SyncResult<()> {
    let temp_path = path.with_extension("jsonl.tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Append records to a JSONL file, one line each.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn append_jsonl(path: &Path, records: &[Record]) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
    }
    file.sync_all()?;

    Ok(())
}

/// Replace a JSONL file with the given records.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_jsonl(path: &Path, records: &[Record]) -> SyncResult<()> {
    let mut content = String::new();
    for record in records {
        content.push_str(&serde_json::to_string(record)?);
        content.push('\n');
    }
    atomic_write(path, &content)
}

/// Read every record of a JSONL file.
///
/// Blank lines are ignored.
///
/// # Errors
///
/// Returns `FileNotFound` if the file does not exist, or `InvalidRecord`
/// with the 1-based line number of the first line that is not a JSON object.
pub fn read_jsonl(path: &Path) -> SyncResult<Vec<Record>> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.display().to_string()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line).map_err(|e| SyncError::InvalidRecord {
            line: line_num + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(records)
}

/// A directory of `<Object>.jsonl` files.
#[derive(Debug)]
pub struct JsonlDataset {
    dir: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonlDataset {
    /// Open (creating if needed) a dataset directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> SyncResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self { dir: dir.to_path_buf(), write_lock: Mutex::new(()) })
    }

    /// Path of an object's file.
    #[must_use]
    pub fn object_path(&self, object: &str) -> PathBuf {
        self.dir.join(format!("{object}.jsonl"))
    }

    /// All records of an object. A missing file is an empty object.
    fn load(&self, object: &str) -> SyncResult<Vec<Record>> {
        match read_jsonl(&self.object_path(object)) {
            Ok(records) => Ok(records),
            Err(SyncError::FileNotFound(path)) => {
                debug!(%path, "No file for object, treating as empty");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn run_query(&self, query: &Query) -> SyncResult<Vec<Record>> {
        Ok(self
            .load(&query.object)?
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
        let _guard = self.write_lock.lock().map_err(|_| SyncError::RemoteWrite {
            object: object.to_string(),
            message: "write lock poisoned".into(),
        })?;

        if operation == Operation::Readonly {
            return Ok(records
                .into_iter()
                .map(|r| WriteResult::failed(r, "operation not permitted: Readonly"))
                .collect());
        }

        let path = self.object_path(object);

        if operation == Operation::Insert {
            let stored: Vec<Record> = records.into_iter().map(|r| with_new_id(object, r)).collect();
            append_jsonl(&path, &stored)?;
            return Ok(stored.into_iter().map(WriteResult::ok).collect());
        }

        let mut existing = self.load(object)?;
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let position = record.key(fields::ID).and_then(|id| {
                existing
                    .iter()
                    .position(|r| r.key(fields::ID).as_deref() == Some(id.as_str()))
            });

            match (operation, position) {
                (Operation::Update | Operation::Upsert, Some(i)) => {
                    existing[i].merge(&record);
                    results.push(WriteResult::ok(existing[i].clone()));
                }
                (Operation::Upsert, None) => {
                    let stored = with_new_id(object, record);
                    existing.push(stored.clone());
                    results.push(WriteResult::ok(stored));
                }
                (Operation::Delete, Some(i)) => {
                    results.push(WriteResult::ok(existing.remove(i)));
                }
                (_, _) => results.push(WriteResult::failed(record, "entity does not exist")),
            }
        }

        write_jsonl(&path, &existing)?;
        Ok(results)
    }

    fn read_blob(&self, version_id: &str) -> SyncResult<Vec<u8>> {
        let version = self
            .load(VERSION_OBJECT)?
            .into_iter()
            .find(|r| r.key(fields::ID).as_deref() == Some(version_id))
            .ok_or_else(|| SyncError::RemoteRead(format!("content version {version_id} not found")))?;

        match version.get(fields::VERSION_DATA) {
            Some(FieldValue::Bytes(bytes)) => Ok(bytes.clone()),
            Some(FieldValue::Text(text)) => Ok(text.clone().into_bytes()),
            _ => Err(SyncError::RemoteRead(format!("content version {version_id} has no data"))),
        }
    }
}

fn with_new_id(object: &str, mut record: Record) -> Record {
    if record.key(fields::ID).is_none() {
        record.set(fields::ID, new_record_id(object));
    }
    record
}

impl DatasetConnection for JsonlDataset {
    fn kind(&self) -> DatasetKind {
        DatasetKind::FILE
    }

    fn label(&self) -> String {
        self.dir.display().to_string()
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
