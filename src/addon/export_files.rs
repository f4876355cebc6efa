//! File export add-on.
//!
//! Brings the files attached to a task's records over to the target. Reads
//! only what the chosen operation needs:
//!
//! | Read                  | When                                          |
//! |-----------------------|-----------------------------------------------|
//! | target links          | Update, Upsert, Delete or `delete_old_data`   |
//! | target versions       | target links found and not running as Insert  |
//! | source links/versions | every operation but Delete                    |
//!
//! Every read is an IN query on the relevant ids, split to respect the
//! query length limit.

use serde::Serialize;
use tracing::{debug, info};

use crate::addon::RunSettings;
use crate::dataset::{build_in_queries, Condition, DatasetConnection};
use crate::error::Result;
use crate::messages::{MessageId, Reporter, TracingReporter};
use crate::model::attachment::{fields, LINK_FIELDS, LINK_OBJECT, VERSION_OBJECT};
use crate::model::{Operation, Record};
use crate::sync::{
    AttachmentDiffEngine, AttachmentSnapshot, ExecutionResult, Plan, PlanNotice, PlanSummary,
    SyncPlanExecutor,
};
use crate::task::{MigrationJob, MigrationTask};

/// Name reported in start and finish messages.
pub const DISPLAY_NAME: &str = "core:ExportFiles";

static TRACING_REPORTER: TracingReporter = TracingReporter;

/// What the add-on did for one object.
#[derive(Debug, Clone, Serialize)]
pub struct FilesReport {
    pub object: String,
    /// Operation requested for files.
    pub operation: Operation,
    pub plan: Plan,
    pub summary: PlanSummary,
    /// `None` for dry runs and halted plans.
    pub result: Option<ExecutionResult>,
}

impl FilesReport {
    fn halted(object: &str, operation: Operation, notice: PlanNotice) -> Self {
        let plan = Plan::halted(operation, notice);
        Self { object: object.to_string(), operation, summary: plan.summary(), plan, result: None }
    }

    #[must_use]
    pub fn notice(&self) -> Option<PlanNotice> {
        self.plan.notice
    }
}

/// Synchronizes the files of a job's records.
pub struct ExportFiles<'a, S, T> {
    source: &'a S,
    target: &'a T,
    job: &'a MigrationJob,
    settings: RunSettings,
    reporter: &'a dyn Reporter,
}

impl<'a, S: DatasetConnection, T: DatasetConnection> ExportFiles<'a, S, T> {
    #[must_use]
    pub fn new(source: &'a S, target: &'a T, job: &'a MigrationJob) -> Self {
        Self { source, target, job, settings: RunSettings::default(), reporter: &TRACING_REPORTER }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: &'a dyn Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run for one object of the job.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if the job has no task for `object`, or the
    /// first failed read. Write failures are collected in the report.
    pub async fn execute(&self, object: &str) -> Result<FilesReport> {
        self.report(MessageId::StartAddonExecute, object, &[DISPLAY_NAME.to_string()]);
        let outcome = self.run(object).await;
        self.report(MessageId::FinishAddonExecute, object, &[DISPLAY_NAME.to_string()]);
        outcome
    }

    async fn run(&self, object: &str) -> Result<FilesReport> {
        let task = match self.job.require(object) {
            Ok(task) => task,
            Err(e) => {
                self.warn(MessageId::TaskNotFound, object, &[]);
                return Err(e);
            }
        };

        let files = task.config().files_or_default();
        let operation = files.operation_or(task.config().operation);
        let external_id = files.content_external_id();
        let engine = AttachmentDiffEngine::new(operation, files.delete_old_data, self.target.kind());
        debug!(object, %operation, external_id, delete_old_data = files.delete_old_data, "Export files");

        if let Some(notice) = engine.precheck() {
            match notice {
                PlanNotice::UnsupportedTarget => self.warn(MessageId::TargetIsFile, object, &[]),
                _ => self.warn(MessageId::ActionIsNotPermitted, object, &[operation.to_string()]),
            }
            return Ok(FilesReport::halted(object, operation, notice));
        }

        let target_files = self.read_target(task, &engine, external_id).await?;
        let source_files = if operation == Operation::Delete {
            AttachmentSnapshot::default()
        } else {
            self.read_source(task, external_id).await?
        };

        let plan = engine.compute_plan(task.correlation(), &source_files, &target_files);
        let summary = plan.summary();
        if plan.notice == Some(PlanNotice::NothingToSync) {
            self.report(MessageId::NoRecords, object, &[]);
        }
        self.report(
            MessageId::PlanComputed,
            object,
            &[
                summary.create.to_string(),
                summary.update.to_string(),
                summary.skip.to_string(),
                summary.delete.to_string(),
            ],
        );

        let mut report = FilesReport { object: object.to_string(), operation, plan, summary, result: None };
        if self.settings.dry_run || report.plan.is_empty() {
            return Ok(report);
        }

        let result = SyncPlanExecutor::new(self.source, self.target, &source_files)
            .with_label(object)
            .with_batch_size(self.settings.batch_size)
            .with_max_in_flight(self.settings.max_in_flight)
            .with_abort_signal(self.settings.abort.clone())
            .with_reporter(self.reporter)
            .apply(report.plan.clone())
            .await;

        self.report(
            MessageId::FilesProcessed,
            object,
            &[
                result.created.to_string(),
                result.updated.to_string(),
                result.skipped.to_string(),
                result.deleted.to_string(),
                result.failed().to_string(),
            ],
        );
        info!(
            object,
            created = result.created,
            updated = result.updated,
            failed = result.failed(),
            "Files exported"
        );

        report.result = Some(result);
        Ok(report)
    }

    async fn read_target(
        &self,
        task: &MigrationTask,
        engine: &AttachmentDiffEngine,
        external_id: &str,
    ) -> Result<AttachmentSnapshot> {
        if !engine.needs_target_links() {
            return Ok(AttachmentSnapshot::default());
        }

        let object = task.object();
        let links = self
            .read_links(self.target, object, &task.correlated_target_ids(), "target")
            .await?;

        let versions = if engine.needs_target_versions() {
            let version_fields =
                [fields::ID, external_id, fields::CONTENT_DOCUMENT_ID, fields::CONTENT_MODIFIED_DATE];
            self.read_versions(self.target, object, &version_fields, &links, "target").await?
        } else {
            Vec::new()
        };

        Ok(AttachmentSnapshot::from_records(links, versions, external_id)?)
    }

    async fn read_source(&self, task: &MigrationTask, external_id: &str) -> Result<AttachmentSnapshot> {
        let object = task.object();
        let links = self
            .read_links(self.source, object, &task.correlated_source_ids(), "source")
            .await?;

        let version_fields = [
            fields::ID,
            external_id,
            fields::CONTENT_DOCUMENT_ID,
            fields::TITLE,
            fields::DESCRIPTION,
            fields::PATH_ON_CLIENT,
            fields::CONTENT_MODIFIED_DATE,
        ];
        let versions = self.read_versions(self.source, object, &version_fields, &links, "source").await?;

        Ok(AttachmentSnapshot::from_records(links, versions, external_id)?)
    }

    async fn read_links<D: DatasetConnection>(
        &self,
        dataset: &D,
        object: &str,
        owner_ids: &[String],
        side: &str,
    ) -> Result<Vec<Record>> {
        let queries = build_in_queries(
            &LINK_FIELDS,
            fields::LINKED_ENTITY_ID,
            LINK_OBJECT,
            owner_ids,
            None,
            self.settings.max_query_length,
        );
        self.retrieve(dataset, object, LINK_OBJECT, &queries, side).await
    }

    /// Latest versions of the documents the links point at.
    async fn read_versions<D: DatasetConnection>(
        &self,
        dataset: &D,
        object: &str,
        version_fields: &[&str],
        links: &[Record],
        side: &str,
    ) -> Result<Vec<Record>> {
        let content_ids: Vec<String> =
            links.iter().filter_map(|l| l.key(fields::CONTENT_DOCUMENT_ID)).collect();
        let queries = build_in_queries(
            version_fields,
            fields::CONTENT_DOCUMENT_ID,
            VERSION_OBJECT,
            &content_ids,
            Some(Condition::eq(fields::IS_LATEST, true)),
            self.settings.max_query_length,
        );
        self.retrieve(dataset, object, VERSION_OBJECT, &queries, side).await
    }

    async fn retrieve<D: DatasetConnection>(
        &self,
        dataset: &D,
        object: &str,
        what: &str,
        queries: &[crate::dataset::Query],
        side: &str,
    ) -> Result<Vec<Record>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        self.report(MessageId::RetrievingData, object, &[what.to_string(), side.to_string()]);
        debug!(dataset = %dataset.label(), queries = queries.len(), "Querying {what}");
        let records = dataset.query_multi(queries).await?;
        self.report(
            MessageId::RetrievingDataCompleted,
            object,
            &[records.len().to_string(), what.to_string(), side.to_string()],
        );
        Ok(records)
    }

    fn report(&self, id: MessageId, object: &str, tokens: &[String]) {
        self.reporter.info(id, &labelled(object, tokens));
    }

    fn warn(&self, id: MessageId, object: &str, tokens: &[String]) {
        self.reporter.warn(id, &labelled(object, tokens));
    }
}

fn labelled(object: &str, tokens: &[String]) -> Vec<String> {
    let mut all = Vec::with_capacity(tokens.len() + 1);
    all.push(object.to_string());
    all.extend_from_slice(tokens);
    all
}
