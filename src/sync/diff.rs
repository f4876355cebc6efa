//! Attachment diffing.
//!
//! Compares the files linked to correlated records on both sides and
//! decides, per file, whether the target needs a new copy, a new version,
//! nothing, or (when asked to start clean) a delete.
//!
//! # Decision order
//!
//! 1. File-backed target → empty plan
//! 2. `Readonly` → empty plan
//! 3. Delete pass (`delete_old_data` or `Delete`), then continue as `Insert`
//! 4. No source links → stop
//! 5. Per correlated owner: create, update (source strictly newer) or skip

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::correlate::Correlation;
use crate::dataset::DatasetKind;
use crate::model::{AttachmentLink, Operation};
use crate::sync::snapshot::AttachmentSnapshot;
use crate::sync::types::{Plan, PlanNotice, SyncAction};

/// Computes synchronization plans for one task.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentDiffEngine {
    operation: Operation,
    delete_old_data: bool,
    target_kind: DatasetKind,
}

impl AttachmentDiffEngine {
    #[must_use]
    pub fn new(operation: Operation, delete_old_data: bool, target_kind: DatasetKind) -> Self {
        Self { operation, delete_old_data, target_kind }
    }

    /// Early-exit check that needs no data.
    ///
    /// Callers use it to avoid reading links and versions at all.
    #[must_use]
    pub fn precheck(&self) -> Option<PlanNotice> {
        if self.target_kind.is_file_backed {
            return Some(PlanNotice::UnsupportedTarget);
        }
        if self.operation == Operation::Readonly {
            return Some(PlanNotice::OperationNotPermitted(self.operation));
        }
        None
    }

    /// Whether target documents are deleted before anything else.
    #[must_use]
    pub fn deletes_first(&self) -> bool {
        self.delete_old_data || self.operation == Operation::Delete
    }

    /// Operation the create/update pass runs under.
    #[must_use]
    pub fn effective_operation(&self) -> Operation {
        if self.deletes_first() && self.operation != Operation::Delete {
            Operation::Insert
        } else {
            self.operation
        }
    }

    /// Whether the target's links have to be read.
    #[must_use]
    pub fn needs_target_links(&self) -> bool {
        self.deletes_first() || self.operation.reads_target()
    }

    /// Whether the target's versions have to be read.
    #[must_use]
    pub fn needs_target_versions(&self) -> bool {
        self.operation != Operation::Delete && self.effective_operation() != Operation::Insert
    }

    /// Compute the plan.
    ///
    /// Pure: the same inputs always give the same actions in the same order.
    #[must_use]
    pub fn compute_plan(
        &self,
        correlation: &Correlation,
        source: &AttachmentSnapshot,
        target: &AttachmentSnapshot,
    ) -> Plan {
        if let Some(notice) = self.precheck() {
            debug!(?notice, "Plan halted before diffing");
            return Plan::halted(self.operation, notice);
        }

        let mut builder = PlanBuilder::default();

        if self.deletes_first() {
            for (source_id, _) in correlation.pairs() {
                let Some(target_id) = correlation.target_id_for(source_id) else {
                    continue;
                };
                for link in target.links_for(target_id) {
                    builder.push(SyncAction::DeleteFile { target_content_id: link.content_id.clone() });
                }
            }
            debug!(deletes = builder.actions.len(), "Delete pass planned");

            if self.operation == Operation::Delete {
                return builder.finish(self.operation, None);
            }
        }

        let operation = self.effective_operation();

        if !source.has_links() {
            return builder.finish(operation, Some(PlanNotice::NothingToSync));
        }

        for owner in source.owners() {
            let Some(target_id) = correlation.target_id_for(owner) else {
                debug!(owner, "Source owner has no correlated target record");
                continue;
            };

            let source_links = distinct_by_content(source.links_for(owner));
            let target_links: &[AttachmentLink] = if operation == Operation::Insert {
                &[]
            } else {
                target.links_for(target_id)
            };

            for source_link in source_links {
                let Some(source_version) = source.version(&source_link.content_id) else {
                    warn!(
                        owner,
                        content = %source_link.content_id,
                        "Source document has no latest version, skipping"
                    );
                    continue;
                };

                let mut matched = false;
                for target_link in target_links {
                    let Some(target_version) = target.version(&target_link.content_id) else {
                        continue;
                    };
                    if !source_version.same_file_as(target_version) {
                        continue;
                    }
                    matched = true;

                    if source_version.is_newer_than(target_version) {
                        builder.push(SyncAction::UpdateFile {
                            owner_id: target_id.to_string(),
                            target_content_id: target_link.content_id.clone(),
                            source_content_id: source_link.content_id.clone(),
                        });
                    } else {
                        builder.push(SyncAction::SkipFile {
                            owner_id: target_id.to_string(),
                            target_content_id: target_link.content_id.clone(),
                        });
                    }
                }

                if matched {
                    continue;
                }
                if operation.allows_insert() {
                    builder.push(SyncAction::CreateFile {
                        owner_id: target_id.to_string(),
                        source_content_id: source_link.content_id.clone(),
                    });
                } else {
                    debug!(
                        owner,
                        content = %source_link.content_id,
                        %operation,
                        "New file not created: operation does not allow inserts"
                    );
                }
            }
        }

        let plan = builder.finish(operation, None);
        let summary = plan.summary();
        info!(
            create = summary.create,
            update = summary.update,
            skip = summary.skip,
            delete = summary.delete,
            "Attachment plan computed"
        );
        plan
    }
}

/// Source links with repeated documents removed, in link order.
fn distinct_by_content(links: &[AttachmentLink]) -> Vec<&AttachmentLink> {
    let mut seen = HashSet::new();
    links.iter().filter(|l| seen.insert(l.content_id.as_str())).collect()
}

/// Accumulates actions, dropping duplicates.
#[derive(Default)]
struct PlanBuilder {
    actions: Vec<SyncAction>,
    seen: HashSet<SyncAction>,
}

impl PlanBuilder {
    fn push(&mut self, action: SyncAction) {
        if self.seen.insert(action.clone()) {
            self.actions.push(action);
        }
    }

    fn finish(self, operation: Operation, notice: Option<PlanNotice>) -> Plan {
        Plan { operation, actions: self.actions, notice }
    }
}
