//! Attachment synchronization.
//!
//! Files attached to correlated records are brought over from the source
//! to the target in three steps:
//!
//! - **Snapshot**: links and latest versions read from each side
//! - **Diff**: a pure comparison producing a [`Plan`] of create, update,
//!   skip and delete actions
//! - **Execute**: the plan applied to the target in batches
//!
//! # Example
//!
//! ```ignore
//! use recsync::sync::{AttachmentDiffEngine, SyncPlanExecutor};
//!
//! let engine = AttachmentDiffEngine::new(Operation::Upsert, false, target.kind());
//! let plan = engine.compute_plan(&correlation, &source_files, &target_files);
//! let result = SyncPlanExecutor::new(&source, &target, &source_files)
//!     .with_batch_size(200)
//!     .apply(plan)
//!     .await;
//! ```

mod diff;
mod executor;
mod snapshot;
mod status;
mod types;

pub use diff::AttachmentDiffEngine;
pub use executor::{AbortSignal, SyncPlanExecutor, DEFAULT_BATCH_SIZE};
pub use snapshot::AttachmentSnapshot;
pub use status::{notice_text, print_plan, print_result};
pub use types::{
    ActionFailure, ExecutionResult, Plan, PlanNotice, PlanSummary, SyncAction, SyncError,
    SyncResult,
};
