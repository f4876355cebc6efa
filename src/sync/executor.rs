//! Plan execution.
//!
//! Applies a [`Plan`] to the target dataset:
//!
//! 1. Skips are counted, nothing is read or written
//! 2. Deletes run first, batched on `ContentDocument`
//! 3. Creates sharing a source document become one upload plus one link
//!    per owner; updates upload a new version onto the target document
//!
//! Up to `max_in_flight` batches run at once. A failed action is recorded
//! and never stops the others. Raising the [`AbortSignal`] stops dispatch:
//! batches already started finish, the rest are counted as aborted.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::dataset::{DatasetConnection, WriteResult};
use crate::messages::{MessageId, Reporter, TracingReporter};
use crate::model::attachment::{
    fields, new_link_record, DOCUMENT_OBJECT, LINK_OBJECT, VERSION_OBJECT,
};
use crate::model::{Operation, Record};
use crate::sync::snapshot::AttachmentSnapshot;
use crate::sync::types::{ActionFailure, ExecutionResult, Plan, SyncAction, SyncError};

/// Default number of records per write call.
pub const DEFAULT_BATCH_SIZE: usize = 200;

static TRACING_REPORTER: TracingReporter = TracingReporter;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching further work.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One upload: a source document going to one or more target places.
#[derive(Debug, Clone)]
enum Transfer {
    /// New document on the target, linked to every owner.
    Create { source_content_id: String, owners: Vec<String> },
    /// New version of an existing target document, shared by every owner.
    Update { source_content_id: String, target_content_id: String, owners: Vec<String> },
}

impl Transfer {
    fn source_content_id(&self) -> &str {
        match self {
            Self::Create { source_content_id, .. } | Self::Update { source_content_id, .. } => {
                source_content_id
            }
        }
    }

    /// The plan actions this transfer stands for.
    fn actions(&self) -> Vec<SyncAction> {
        match self {
            Self::Create { source_content_id, owners } => owners
                .iter()
                .map(|owner| SyncAction::CreateFile {
                    owner_id: owner.clone(),
                    source_content_id: source_content_id.clone(),
                })
                .collect(),
            Self::Update { source_content_id, target_content_id, owners } => owners
                .iter()
                .map(|owner| SyncAction::UpdateFile {
                    owner_id: owner.clone(),
                    target_content_id: target_content_id.clone(),
                    source_content_id: source_content_id.clone(),
                })
                .collect(),
        }
    }

    fn action_count(&self) -> usize {
        match self {
            Self::Create { owners, .. } | Self::Update { owners, .. } => owners.len(),
        }
    }
}

/// Applies plans from one source to one target.
pub struct SyncPlanExecutor<'a, S, T> {
    source: &'a S,
    target: &'a T,
    source_files: &'a AttachmentSnapshot,
    label: String,
    batch_size: usize,
    max_in_flight: usize,
    abort: AbortSignal,
    reporter: &'a dyn Reporter,
}

impl<'a, S: DatasetConnection, T: DatasetConnection> SyncPlanExecutor<'a, S, T> {
    /// Executor reading payloads from `source` (described by `source_files`)
    /// and writing to `target`.
    #[must_use]
    pub fn new(source: &'a S, target: &'a T, source_files: &'a AttachmentSnapshot) -> Self {
        Self {
            source,
            target,
            source_files,
            label: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: 1,
            abort: AbortSignal::new(),
            reporter: &TRACING_REPORTER,
        }
    }

    /// Name used as the first token of reported messages.
    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    #[must_use]
    pub fn with_abort_signal(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: &'a dyn Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Apply a plan.
    ///
    /// Never fails as a whole: every action ends up counted, failed or aborted.
    pub async fn apply(&self, plan: Plan) -> ExecutionResult {
        let mut result = ExecutionResult::default();

        let mut deletes: Vec<String> = Vec::new();
        let mut seen_deletes: HashSet<String> = HashSet::new();
        let mut creates: Vec<Transfer> = Vec::new();
        let mut create_index: HashMap<String, usize> = HashMap::new();
        let mut updates: Vec<Transfer> = Vec::new();
        let mut update_index: HashMap<(String, String), usize> = HashMap::new();

        for action in plan.actions {
            match action {
                SyncAction::SkipFile { .. } => result.skipped += 1,
                SyncAction::DeleteFile { target_content_id } => {
                    if seen_deletes.insert(target_content_id.clone()) {
                        deletes.push(target_content_id);
                    }
                }
                SyncAction::CreateFile { owner_id, source_content_id } => {
                    if let Some(&i) = create_index.get(&source_content_id) {
                        if let Transfer::Create { owners, .. } = &mut creates[i] {
                            owners.push(owner_id);
                        }
                    } else {
                        create_index.insert(source_content_id.clone(), creates.len());
                        creates.push(Transfer::Create { source_content_id, owners: vec![owner_id] });
                    }
                }
                SyncAction::UpdateFile { owner_id, target_content_id, source_content_id } => {
                    let key = (target_content_id, source_content_id);
                    if let Some(&i) = update_index.get(&key) {
                        if let Transfer::Update { owners, .. } = &mut updates[i] {
                            owners.push(owner_id);
                        }
                    } else {
                        update_index.insert(key.clone(), updates.len());
                        let (target_content_id, source_content_id) = key;
                        updates.push(Transfer::Update {
                            source_content_id,
                            target_content_id,
                            owners: vec![owner_id],
                        });
                    }
                }
            }
        }

        if !deletes.is_empty() {
            self.report(MessageId::DeletingTargetData, &[deletes.len().to_string()]);
            let batches: Vec<Vec<String>> =
                deletes.chunks(self.batch_size).map(<[String]>::to_vec).collect();
            let outcomes: Vec<ExecutionResult> = stream::iter(batches)
                .map(|batch| self.delete_batch(batch))
                .buffered(self.max_in_flight)
                .collect()
                .await;
            for outcome in outcomes {
                result.absorb(outcome);
            }
        }

        let transfers: Vec<Transfer> = creates.into_iter().chain(updates).collect();
        if !transfers.is_empty() {
            let files: usize = transfers.iter().map(Transfer::action_count).sum();
            self.report(MessageId::UploadingFiles, &[files.to_string()]);
            let batches: Vec<Vec<Transfer>> =
                transfers.chunks(self.batch_size).map(<[Transfer]>::to_vec).collect();
            let outcomes: Vec<ExecutionResult> = stream::iter(batches)
                .map(|batch| self.transfer_batch(batch))
                .buffered(self.max_in_flight)
                .collect()
                .await;
            for outcome in outcomes {
                result.absorb(outcome);
            }
        }

        for failure in &result.failures {
            self.reporter.warn(
                MessageId::ActionFailed,
                &[self.label.clone(), failure.action.to_string(), failure.message.clone()],
            );
        }
        if result.aborted > 0 {
            self.reporter
                .warn(MessageId::JobAborted, &[self.label.clone(), result.aborted.to_string()]);
        }

        info!(
            created = result.created,
            updated = result.updated,
            skipped = result.skipped,
            deleted = result.deleted,
            failed = result.failed(),
            aborted = result.aborted,
            "Plan applied"
        );
        result
    }

    fn report(&self, id: MessageId, tokens: &[String]) {
        let mut all = Vec::with_capacity(tokens.len() + 1);
        all.push(self.label.clone());
        all.extend_from_slice(tokens);
        self.reporter.info(id, &all);
    }

    async fn delete_batch(&self, content_ids: Vec<String>) -> ExecutionResult {
        let mut result = ExecutionResult::default();
        if self.abort.is_aborted() {
            result.aborted = content_ids.len();
            return result;
        }

        let records = content_ids
            .iter()
            .map(|id| Record::new().with(fields::ID, id.as_str()))
            .collect();
        let action = |id: &str| SyncAction::DeleteFile { target_content_id: id.to_string() };

        match self.target.write(DOCUMENT_OBJECT, Operation::Delete, records).await {
            Ok(written) => {
                let mut written = written.into_iter();
                for id in &content_ids {
                    let error = match written.next() {
                        Some(WriteResult { error: None, .. }) => {
                            result.deleted += 1;
                            continue;
                        }
                        Some(WriteResult { error: Some(message), .. }) => {
                            SyncError::RemoteWrite { object: DOCUMENT_OBJECT.to_string(), message }
                        }
                        None => missing_result(DOCUMENT_OBJECT),
                    };
                    result.failures.push(ActionFailure::new(action(id), &error));
                }
            }
            Err(e) => {
                warn!(error = %e, count = content_ids.len(), "Delete batch failed");
                for id in &content_ids {
                    result.failures.push(ActionFailure::new(action(id), &e));
                }
            }
        }
        debug!(deleted = result.deleted, failed = result.failed(), "Delete batch done");
        result
    }

    async fn transfer_batch(&self, batch: Vec<Transfer>) -> ExecutionResult {
        let mut result = ExecutionResult::default();
        if self.abort.is_aborted() {
            result.aborted = batch.iter().map(Transfer::action_count).sum();
            return result;
        }

        // Fetch payloads and build the versions to insert.
        let mut ready: Vec<(Transfer, Record)> = Vec::with_capacity(batch.len());
        for transfer in batch {
            match self.build_upload(&transfer).await {
                Ok(upload) => ready.push((transfer, upload)),
                Err(e) => fail_all(&mut result, &transfer, &e),
            }
        }
        if ready.is_empty() {
            return result;
        }

        let uploads = ready.iter().map(|(_, upload)| upload.clone()).collect();
        let written = match self.target.write(VERSION_OBJECT, Operation::Insert, uploads).await
        {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, count = ready.len(), "Upload batch failed");
                for (transfer, _) in &ready {
                    fail_all(&mut result, transfer, &e);
                }
                return result;
            }
        };

        let mut links: Vec<(SyncAction, Record)> = Vec::new();
        let mut written = written.into_iter();
        for (transfer, _) in &ready {
            let Some(outcome) = written.next() else {
                fail_all(&mut result, transfer, &missing_result(VERSION_OBJECT));
                continue;
            };
            if let Some(message) = outcome.error {
                let error = SyncError::RemoteWrite { object: VERSION_OBJECT.to_string(), message };
                fail_all(&mut result, transfer, &error);
                continue;
            }
            match transfer {
                Transfer::Update { owners, .. } => result.updated += owners.len(),
                Transfer::Create { source_content_id, owners } => {
                    let Some(content_id) = outcome.record.key(fields::CONTENT_DOCUMENT_ID) else {
                        let error = SyncError::RemoteWrite {
                            object: VERSION_OBJECT.to_string(),
                            message: "stored version has no document id".to_string(),
                        };
                        fail_all(&mut result, transfer, &error);
                        continue;
                    };
                    let template = self.source_files.link_to(source_content_id);
                    for owner in owners {
                        let record = match template {
                            Some(link) => link.to_new_link(owner, &content_id),
                            None => new_link_record(owner, &content_id, None, None),
                        };
                        let action = SyncAction::CreateFile {
                            owner_id: owner.clone(),
                            source_content_id: source_content_id.clone(),
                        };
                        links.push((action, record));
                    }
                }
            }
        }

        if !links.is_empty() {
            let records = links.iter().map(|(_, r)| r.clone()).collect();
            match self.target.write(LINK_OBJECT, Operation::Insert, records).await {
                Ok(written) => {
                    let mut written = written.into_iter();
                    for (action, _) in links {
                        let error = match written.next() {
                            Some(WriteResult { error: None, .. }) => {
                                result.created += 1;
                                continue;
                            }
                            Some(WriteResult { error: Some(message), .. }) => {
                                SyncError::RemoteWrite { object: LINK_OBJECT.to_string(), message }
                            }
                            None => missing_result(LINK_OBJECT),
                        };
                        result.failures.push(ActionFailure::new(action, &error));
                    }
                }
                Err(e) => {
                    warn!(error = %e, count = links.len(), "Link batch failed");
                    for (action, _) in links {
                        result.failures.push(ActionFailure::new(action, &e));
                    }
                }
            }
        }

        debug!(
            created = result.created,
            updated = result.updated,
            failed = result.failed(),
            "Transfer batch done"
        );
        result
    }

    /// The version record to insert for a transfer, payload included.
    async fn build_upload(&self, transfer: &Transfer) -> Result<Record, SyncError> {
        let source_content_id = transfer.source_content_id();
        let version = self.source_files.version(source_content_id).ok_or_else(|| {
            SyncError::RemoteRead(format!("no latest version for source document {source_content_id}"))
        })?;
        let payload = self.source.fetch_blob(&version.id).await?;

        let mut upload = version.to_upload_record();
        upload.set(fields::VERSION_DATA, payload);
        if let Transfer::Update { target_content_id, .. } = transfer {
            upload.set(fields::CONTENT_DOCUMENT_ID, target_content_id.as_str());
        }
        Ok(upload)
    }
}

/// Failure for a record the target returned no result for.
fn missing_result(object: &str) -> SyncError {
    SyncError::RemoteWrite { object: object.to_string(), message: "missing write result".to_string() }
}

fn fail_all(result: &mut ExecutionResult, transfer: &Transfer, error: &SyncError) {
    for action in transfer.actions() {
        result.failures.push(ActionFailure::new(action, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Query, SqliteDataset, WriteResult};
    use crate::messages::MemoryReporter;
    use crate::model::{AttachmentLink, AttachmentVersion};
    use std::future::Future;

    fn version_record(id: &str, content: &str, title: &str, modified: &str) -> Record {
        Record::new()
            .with(fields::ID, id)
            .with(fields::CONTENT_DOCUMENT_ID, content)
            .with(fields::TITLE, title)
            .with(fields::PATH_ON_CLIENT, format!("{title}.txt"))
            .with(fields::CONTENT_MODIFIED_DATE, modified)
            .with(fields::IS_LATEST, true)
    }

    /// Source with two documents (069A, 069B) linked to 001S1.
    fn source() -> (SqliteDataset, AttachmentSnapshot) {
        let dataset = SqliteDataset::open_memory().unwrap();
        let versions = vec![
            version_record("068A", "069A", "alpha", "2024-02-01")
                .with(fields::VERSION_DATA, b"alpha".to_vec()),
            version_record("068B", "069B", "beta", "2024-02-01")
                .with(fields::VERSION_DATA, b"beta".to_vec()),
        ];
        dataset.load_records(VERSION_OBJECT, versions.clone()).unwrap();

        let links = vec![
            AttachmentLink {
                id: "06AS1".into(),
                owner_id: "001S1".into(),
                content_id: "069A".into(),
                share_type: Some("I".into()),
                visibility: Some("AllUsers".into()),
            },
            AttachmentLink {
                id: "06AS2".into(),
                owner_id: "001S1".into(),
                content_id: "069B".into(),
                share_type: None,
                visibility: None,
            },
        ];
        let versions = versions
            .into_iter()
            .map(|mut r| {
                r.remove(fields::VERSION_DATA);
                AttachmentVersion::from_record(r, fields::TITLE, 0).unwrap()
            })
            .collect::<Vec<_>>();
        (dataset, AttachmentSnapshot::new(links, versions))
    }

    /// Target with document 069T (titled alpha) linked to 001T1.
    fn target() -> SqliteDataset {
        let dataset = SqliteDataset::open_memory().unwrap();
        dataset
            .load_records(
                DOCUMENT_OBJECT,
                vec![Record::new().with(fields::ID, "069T").with(fields::TITLE, "alpha")],
            )
            .unwrap();
        dataset
            .load_records(
                VERSION_OBJECT,
                vec![version_record("068T", "069T", "alpha", "2024-01-01")
                    .with(fields::VERSION_DATA, b"old".to_vec())],
            )
            .unwrap();
        dataset
            .load_records(
                LINK_OBJECT,
                vec![Record::new()
                    .with(fields::ID, "06AT1")
                    .with(fields::LINKED_ENTITY_ID, "001T1")
                    .with(fields::CONTENT_DOCUMENT_ID, "069T")],
            )
            .unwrap();
        dataset
    }

    fn plan(actions: Vec<SyncAction>) -> Plan {
        Plan { operation: Operation::Upsert, actions, notice: None }
    }

    fn create(owner: &str, content: &str) -> SyncAction {
        SyncAction::CreateFile { owner_id: owner.into(), source_content_id: content.into() }
    }

    fn update() -> SyncAction {
        SyncAction::UpdateFile {
            owner_id: "001T1".into(),
            target_content_id: "069T".into(),
            source_content_id: "069A".into(),
        }
    }

    async fn latest_versions(dataset: &SqliteDataset) -> Vec<Record> {
        dataset
            .query(
                &Query::all(VERSION_OBJECT)
                    .with_condition(crate::dataset::Condition::eq(fields::IS_LATEST, true)),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_group_uploads_once_and_links_each_owner() {
        let (source, files) = source();
        let target = target();

        let result = SyncPlanExecutor::new(&source, &target, &files)
            .apply(plan(vec![create("001T1", "069B"), create("001T2", "069B")]))
            .await;

        assert!(result.is_clean(), "{:?}", result.failures);
        assert_eq!(result.created, 2);

        let betas: Vec<_> = latest_versions(&target)
            .await
            .into_iter()
            .filter(|v| v.get_str(fields::TITLE) == Some("beta"))
            .collect();
        assert_eq!(betas.len(), 1);

        let content_id = betas[0].key(fields::CONTENT_DOCUMENT_ID).unwrap();
        let links = target
            .query(&Query::all(LINK_OBJECT).with_condition(crate::dataset::Condition::eq(
                fields::CONTENT_DOCUMENT_ID,
                content_id.as_str(),
            )))
            .await
            .unwrap();
        assert_eq!(links.len(), 2);

        let version_id = betas[0].key(fields::ID).unwrap();
        assert_eq!(target.fetch_blob(&version_id).await.unwrap(), b"beta".to_vec());
    }

    #[tokio::test]
    async fn test_create_keeps_link_settings() {
        let (source, files) = source();
        let target = target();

        SyncPlanExecutor::new(&source, &target, &files)
            .apply(plan(vec![create("001T2", "069A")]))
            .await;

        let links = target
            .query(&Query::all(LINK_OBJECT).with_condition(crate::dataset::Condition::eq(
                fields::LINKED_ENTITY_ID,
                "001T2",
            )))
            .await
            .unwrap();
        assert_eq!(links[0].get_str(fields::SHARE_TYPE), Some("I"));
        assert_eq!(links[0].get_str(fields::VISIBILITY), Some("AllUsers"));
    }

    #[tokio::test]
    async fn test_update_adds_latest_version_to_target_document() {
        let (source, files) = source();
        let target = target();

        let result = SyncPlanExecutor::new(&source, &target, &files)
            .apply(plan(vec![update()]))
            .await;

        assert_eq!(result.updated, 1);
        let latest = latest_versions(&target).await;
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].get_str(fields::CONTENT_DOCUMENT_ID), Some("069T"));
        assert_eq!(latest[0].get_str(fields::CONTENT_MODIFIED_DATE), Some("2024-02-01"));
        assert_ne!(latest[0].get_str(fields::ID), Some("068T"));

        let all = target.query(&Query::all(VERSION_OBJECT)).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_shared_target_document_gets_one_new_version() {
        let (source, files) = source();
        let target = target();
        target
            .load_records(
                LINK_OBJECT,
                vec![Record::new()
                    .with(fields::ID, "06AT2")
                    .with(fields::LINKED_ENTITY_ID, "001T2")
                    .with(fields::CONTENT_DOCUMENT_ID, "069T")],
            )
            .unwrap();
        let second_owner = SyncAction::UpdateFile {
            owner_id: "001T2".into(),
            target_content_id: "069T".into(),
            source_content_id: "069A".into(),
        };

        let result = SyncPlanExecutor::new(&source, &target, &files)
            .apply(plan(vec![update(), second_owner]))
            .await;

        assert!(result.is_clean(), "{:?}", result.failures);
        assert_eq!(result.updated, 2);
        let versions = target
            .query(&Query::all(VERSION_OBJECT).with_condition(crate::dataset::Condition::eq(
                fields::CONTENT_DOCUMENT_ID,
                "069T",
            )))
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(latest_versions(&target).await.len(), 1);
    }

    #[tokio::test]
    async fn test_deletes_and_skips() {
        let (source, files) = source();
        let target = target();

        let result = SyncPlanExecutor::new(&source, &target, &files)
            .apply(plan(vec![
                SyncAction::DeleteFile { target_content_id: "069T".into() },
                SyncAction::DeleteFile { target_content_id: "069T".into() },
                SyncAction::SkipFile { owner_id: "001T9".into(), target_content_id: "069X".into() },
            ]))
            .await;

        assert_eq!(result.deleted, 1);
        assert_eq!(result.skipped, 1);
        assert!(result.is_clean());
        assert!(target.query(&Query::all(LINK_OBJECT)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let (source, files) = source();
        let target = target();
        let reporter = MemoryReporter::new();

        let result = SyncPlanExecutor::new(&source, &target, &files)
            .with_reporter(&reporter)
            .with_label("Account")
            .apply(plan(vec![
                create("001T1", "069MISSING"),
                create("001T1", "069B"),
                SyncAction::DeleteFile { target_content_id: "069NOPE".into() },
            ]))
            .await;

        assert_eq!(result.created, 1);
        assert_eq!(result.failed(), 2);
        let codes: Vec<_> = result.failures.iter().map(|f| f.code).collect();
        assert!(codes.contains(&"REMOTE_READ"));
        assert!(codes.contains(&"REMOTE_WRITE"));
        assert!(reporter.contains(MessageId::ActionFailed));
    }

    #[tokio::test]
    async fn test_abort_before_dispatch() {
        let (source, files) = source();
        let target = target();
        let abort = AbortSignal::new();
        abort.abort();

        let result = SyncPlanExecutor::new(&source, &target, &files)
            .with_abort_signal(abort)
            .apply(plan(vec![
                SyncAction::DeleteFile { target_content_id: "069T".into() },
                create("001T1", "069B"),
                create("001T2", "069B"),
                update(),
                SyncAction::SkipFile { owner_id: "001T1".into(), target_content_id: "069T".into() },
            ]))
            .await;

        assert_eq!(result.aborted, 4);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(target.query(&Query::all(VERSION_OBJECT)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_batches_give_same_counts() {
        let (source, files) = source();
        let target = target();

        let result = SyncPlanExecutor::new(&source, &target, &files)
            .with_batch_size(1)
            .with_max_in_flight(4)
            .apply(plan(vec![create("001T2", "069A"), create("001T3", "069B"), update()]))
            .await;

        assert!(result.is_clean());
        assert_eq!((result.created, result.updated), (2, 1));
    }

    /// Target that rejects every write call.
    struct Unreachable;

    impl DatasetConnection for Unreachable {
        fn kind(&self) -> crate::dataset::DatasetKind {
            crate::dataset::DatasetKind::STRUCTURED
        }

        fn label(&self) -> String {
            "unreachable".into()
        }

        fn query(&self, _query: &Query) -> impl Future<Output = crate::sync::SyncResult<Vec<Record>>> + Send {
            std::future::ready(Ok(Vec::new()))
        }

        fn write(
            &self,
            object: &str,
            _operation: Operation,
            _records: Vec<Record>,
        ) -> impl Future<Output = crate::sync::SyncResult<Vec<WriteResult>>> + Send {
            std::future::ready(Err(SyncError::RemoteWrite {
                object: object.to_string(),
                message: "connection reset".into(),
            }))
        }

        fn fetch_blob(&self, _version_id: &str) -> impl Future<Output = crate::sync::SyncResult<Vec<u8>>> + Send {
            std::future::ready(Ok(Vec::new()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_call_fails_every_action_in_batch() {
        let (source, files) = source();

        let result = SyncPlanExecutor::new(&source, &Unreachable, &files)
            .apply(plan(vec![
                SyncAction::DeleteFile { target_content_id: "069T".into() },
                create("001T1", "069A"),
                create("001T2", "069A"),
            ]))
            .await;

        assert_eq!(result.failed(), 3);
        assert_eq!(result.succeeded(), 0);
        assert!(result.failures.iter().all(|f| f.message.contains("connection reset")));
    }

    /// Target that accepts write calls but returns no per-record results.
    struct SilentWriter;

    impl DatasetConnection for SilentWriter {
        fn kind(&self) -> crate::dataset::DatasetKind {
            crate::dataset::DatasetKind::STRUCTURED
        }

        fn label(&self) -> String {
            "silent".into()
        }

        fn query(&self, _query: &Query) -> impl Future<Output = crate::sync::SyncResult<Vec<Record>>> + Send {
            std::future::ready(Ok(Vec::new()))
        }

        fn write(
            &self,
            _object: &str,
            _operation: Operation,
            _records: Vec<Record>,
        ) -> impl Future<Output = crate::sync::SyncResult<Vec<WriteResult>>> + Send {
            std::future::ready(Ok(Vec::new()))
        }

        fn fetch_blob(&self, _version_id: &str) -> impl Future<Output = crate::sync::SyncResult<Vec<u8>>> + Send {
            std::future::ready(Ok(Vec::new()))
        }
    }

    #[tokio::test]
    async fn test_missing_write_results_count_as_failures() {
        let (source, files) = source();

        let result = SyncPlanExecutor::new(&source, &SilentWriter, &files)
            .apply(plan(vec![
                SyncAction::DeleteFile { target_content_id: "069T".into() },
                SyncAction::DeleteFile { target_content_id: "069U".into() },
                create("001T1", "069A"),
            ]))
            .await;

        assert_eq!(result.deleted, 0);
        assert_eq!(result.created, 0);
        assert_eq!(result.failed(), 3);
        assert!(result.failures.iter().all(|f| f.message.contains("missing write result")));
    }
}
