//! Add-on modules run against a loaded migration job.
//!
//! An add-on works on one object of the job at a time and talks to both
//! datasets only through [`DatasetConnection`](crate::dataset::DatasetConnection).

pub mod export_files;

pub use export_files::{ExportFiles, FilesReport};

use crate::config::SyncConfig;
use crate::dataset::DEFAULT_MAX_QUERY_LENGTH;
use crate::sync::{AbortSignal, DEFAULT_BATCH_SIZE};

/// Settings shared by every add-on of a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub max_query_length: usize,
    /// Compute plans without writing.
    pub dry_run: bool,
    pub abort: AbortSignal,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: 1,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            dry_run: false,
            abort: AbortSignal::new(),
        }
    }
}

impl RunSettings {
    #[must_use]
    pub fn from_config(config: &SyncConfig, dry_run: bool, abort: AbortSignal) -> Self {
        Self {
            batch_size: config.batch_size,
            max_in_flight: config.max_in_flight,
            max_query_length: config.max_query_length,
            dry_run,
            abort,
        }
    }
}
