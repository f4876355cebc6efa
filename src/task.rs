//! Migration tasks: one object, both sides loaded and correlated.

use tracing::{debug, info};

use crate::config::ObjectConfig;
use crate::correlate::{correlate, Correlation, RecordIndex};
use crate::dataset::{DatasetConnection, Query};
use crate::error::{Error, Result};

/// Records of one object on both sides and how they pair up.
#[derive(Debug, Clone)]
pub struct MigrationTask {
    config: ObjectConfig,
    source: RecordIndex,
    target: RecordIndex,
    correlation: Correlation,
}

impl MigrationTask {
    /// Read the object from both datasets, index and correlate it.
    ///
    /// # Errors
    ///
    /// Returns an error if a read fails or an index cannot be built.
    pub async fn load<S, T>(source: &S, target: &T, config: &ObjectConfig) -> Result<Self>
    where
        S: DatasetConnection,
        T: DatasetConnection,
    {
        let query = Query::all(&config.object);
        debug!(query = %query, "Loading task records");

        let source_records = source.query(&query).await?;
        let target_records = target.query(&query).await?;

        let source_index = RecordIndex::build_with_policy(
            source_records,
            &config.id_field,
            &config.external_id,
            config.collision_policy,
        )?;
        let target_index = RecordIndex::build_with_policy(
            target_records,
            &config.id_field,
            &config.external_id,
            config.collision_policy,
        )?;

        Ok(Self::from_indexes(config.clone(), source_index, target_index))
    }

    /// Task over already built indexes.
    #[must_use]
    pub fn from_indexes(config: ObjectConfig, source: RecordIndex, target: RecordIndex) -> Self {
        let correlation = correlate(&source, &target);
        let stats = correlation.stats();
        info!(
            object = %config.object,
            source = source.len(),
            target = target.len(),
            matched = stats.matched,
            "Task correlated"
        );
        Self { config, source, target, correlation }
    }

    #[must_use]
    pub fn object(&self) -> &str {
        &self.config.object
    }

    #[must_use]
    pub fn config(&self) -> &ObjectConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &RecordIndex {
        &self.source
    }

    #[must_use]
    pub fn target(&self) -> &RecordIndex {
        &self.target
    }

    #[must_use]
    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Source ids that have a target counterpart, sorted.
    #[must_use]
    pub fn correlated_source_ids(&self) -> Vec<String> {
        self.correlation.pairs().into_iter().map(|(id, _)| id.to_string()).collect()
    }

    /// Target ids claimed by some source record, sorted and distinct.
    #[must_use]
    pub fn correlated_target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.correlation.target_ids().into_iter().map(str::to_string).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// All tasks of a run.
#[derive(Debug, Clone, Default)]
pub struct MigrationJob {
    tasks: Vec<MigrationTask>,
}

impl MigrationJob {
    /// Load one task per configured object, in order.
    ///
    /// # Errors
    ///
    /// Returns the first task's load error.
    pub async fn load<S, T>(source: &S, target: &T, objects: &[ObjectConfig]) -> Result<Self>
    where
        S: DatasetConnection,
        T: DatasetConnection,
    {
        let mut tasks = Vec::with_capacity(objects.len());
        for config in objects {
            tasks.push(MigrationTask::load(source, target, config).await?);
        }
        Ok(Self { tasks })
    }

    #[must_use]
    pub fn new(tasks: Vec<MigrationTask>) -> Self {
        Self { tasks }
    }

    /// Task of an object (case-insensitive).
    #[must_use]
    pub fn task_for(&self, object: &str) -> Option<&MigrationTask> {
        self.tasks.iter().find(|t| t.object().eq_ignore_ascii_case(object))
    }

    /// Like [`MigrationJob::task_for`], as an error when absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::TaskNotFound`.
    pub fn require(&self, object: &str) -> Result<&MigrationTask> {
        self.task_for(object)
            .ok_or_else(|| Error::TaskNotFound { object: object.to_string() })
    }

    #[must_use]
    pub fn tasks(&self) -> &[MigrationTask] {
        &self.tasks
    }
}
