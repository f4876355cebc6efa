use std::path::{Path, PathBuf};

use assert_cmd::Command;
use recsync::dataset::{DatasetConnection, Query, SqliteDataset};
use recsync::model::Record;
use tempfile::TempDir;

fn seed(path: &Path, object: &str, records: Vec<Record>) {
    let dataset = SqliteDataset::open(path).unwrap();
    dataset.load_records(object, records).unwrap();
}

fn version(id: &str, doc: &str, title: &str, modified: &str) -> Record {
    Record::new()
        .with("Id", id)
        .with("ContentDocumentId", doc)
        .with("Title", title)
        .with("ContentModifiedDate", modified)
        .with("IsLatest", true)
        .with("VersionData", title.as_bytes().to_vec())
}

fn link(id: &str, owner: &str, doc: &str) -> Record {
    Record::new().with("Id", id).with("LinkedEntityId", owner).with("ContentDocumentId", doc)
}

/// Source Acme has report.pdf; target Acme exists without files.
fn datasets(temp: &TempDir) -> (PathBuf, PathBuf) {
    let source = temp.path().join("source.db");
    let target = temp.path().join("target.db");

    seed(&source, "Account", vec![Record::new().with("Id", "S1").with("Name", "Acme")]);
    seed(&source, "ContentDocument", vec![Record::new().with("Id", "DS1")]);
    seed(&source, "ContentVersion", vec![version("VS1", "DS1", "report.pdf", "2024-05-01T00:00:00Z")]);
    seed(&source, "ContentDocumentLink", vec![link("LS1", "S1", "DS1")]);

    seed(&target, "Account", vec![Record::new().with("Id", "T1").with("Name", "Acme")]);

    (source, target)
}

fn recsync(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("recsync").unwrap();
    cmd.current_dir(temp.path())
        .env("HOME", temp.path())
        .env_remove("RECSYNC_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn version_prints_json_when_piped() {
    let temp = TempDir::new().unwrap();
    let output = recsync(&temp).arg("version").output().unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn correlate_reports_matches() {
    let temp = TempDir::new().unwrap();
    let (source, target) = datasets(&temp);

    let output = recsync(&temp)
        .args(["correlate", "--object", "Account", "--source"])
        .arg(&source)
        .arg("--target")
        .arg(&target)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json[0]["object"], "Account");
    assert_eq!(json[0]["stats"]["matched"], 1);
}

#[test]
fn files_plan_does_not_write() {
    let temp = TempDir::new().unwrap();
    let (source, target) = datasets(&temp);

    let output = recsync(&temp)
        .args(["files", "plan", "--object", "Account", "--source"])
        .arg(&source)
        .arg("--target")
        .arg(&target)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["objects"][0]["summary"]["create"], 1);

    let target = SqliteDataset::open(&target).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let links = runtime.block_on(target.query(&Query::all("ContentDocumentLink"))).unwrap();
    assert!(links.is_empty());
}

#[test]
fn files_sync_uploads_and_links() {
    let temp = TempDir::new().unwrap();
    let (source, target) = datasets(&temp);

    let output = recsync(&temp)
        .args(["files", "sync", "--object", "Account", "--source"])
        .arg(&source)
        .arg("--target")
        .arg(&target)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["objects"][0]["result"]["created"], 1);

    let target = SqliteDataset::open(&target).unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let links = runtime.block_on(target.query(&Query::all("ContentDocumentLink"))).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].get_str("LinkedEntityId"), Some("T1"));

    let versions = runtime.block_on(target.query(&Query::all("ContentVersion"))).unwrap();
    let payload = runtime.block_on(target.fetch_blob(versions[0].get_str("Id").unwrap())).unwrap();
    assert_eq!(payload, b"report.pdf");
}

#[test]
fn config_file_selects_objects() {
    let temp = TempDir::new().unwrap();
    let (source, target) = datasets(&temp);
    std::fs::write(
        temp.path().join("recsync.json"),
        r#"{ "objects": [ { "object": "Account", "files": { "operation": "Readonly" } } ] }"#,
    )
    .unwrap();

    let output = recsync(&temp)
        .args(["files", "sync", "--source"])
        .arg(&source)
        .arg("--target")
        .arg(&target)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["objects"][0]["plan"]["notice"]["operation_not_permitted"], "Readonly");
}

#[test]
fn missing_dataset_exits_with_not_found() {
    let temp = TempDir::new().unwrap();

    let output = recsync(&temp)
        .args(["files", "sync", "--object", "Account", "--source", "nope.db", "--target", "nope2.db"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let error: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(error["error"]["code"], "DATASET_NOT_FOUND");
}

#[test]
fn invalid_config_exits_with_config_error() {
    let temp = TempDir::new().unwrap();
    let (source, target) = datasets(&temp);
    std::fs::write(temp.path().join("recsync.json"), r#"{ "batch_size": 0 }"#).unwrap();

    let output = recsync(&temp)
        .args(["files", "plan", "--object", "Account", "--source"])
        .arg(&source)
        .arg("--target")
        .arg(&target)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(7));
}
