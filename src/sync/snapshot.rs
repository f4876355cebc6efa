//! Attachment data read from one side of a task.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::model::{AttachmentLink, AttachmentVersion, Record};
use crate::sync::SyncResult;

/// Links grouped by owner plus the latest version of every linked document.
#[derive(Debug, Clone, Default)]
pub struct AttachmentSnapshot {
    links_by_owner: HashMap<String, Vec<AttachmentLink>>,
    versions_by_content: HashMap<String, AttachmentVersion>,
    /// Distinct content ids in link order.
    content_ids: Vec<String>,
}

impl AttachmentSnapshot {
    /// Build a snapshot from typed links and versions.
    ///
    /// When several versions of one document are given, the last one wins.
    #[must_use]
    pub fn new(
        links: impl IntoIterator<Item = AttachmentLink>,
        versions: impl IntoIterator<Item = AttachmentVersion>,
    ) -> Self {
        let mut snapshot = Self::default();
        let mut seen = HashSet::new();

        for link in links {
            if seen.insert(link.content_id.clone()) {
                snapshot.content_ids.push(link.content_id.clone());
            }
            snapshot.links_by_owner.entry(link.owner_id.clone()).or_default().push(link);
        }
        for version in versions {
            snapshot.versions_by_content.insert(version.content_id.clone(), version);
        }

        snapshot
    }

    /// Build a snapshot from raw `ContentDocumentLink` and `ContentVersion` records.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if a link or version lacks a required field.
    pub fn from_records(
        links: Vec<Record>,
        versions: Vec<Record>,
        external_id_field: &str,
    ) -> SyncResult<Self> {
        let links = links
            .iter()
            .enumerate()
            .map(|(i, r)| AttachmentLink::from_record(r, i))
            .collect::<SyncResult<Vec<_>>>()?;
        let versions = versions
            .into_iter()
            .enumerate()
            .map(|(i, r)| AttachmentVersion::from_record(r, external_id_field, i))
            .collect::<SyncResult<Vec<_>>>()?;

        let snapshot = Self::new(links, versions);
        let missing = snapshot
            .content_ids
            .iter()
            .filter(|id| !snapshot.versions_by_content.contains_key(*id))
            .count();
        if missing > 0 {
            warn!(missing, "Linked documents without a latest version");
        }
        Ok(snapshot)
    }

    /// Links owned by a record (empty if none).
    #[must_use]
    pub fn links_for(&self, owner_id: &str) -> &[AttachmentLink] {
        self.links_by_owner.get(owner_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Latest version of a document.
    #[must_use]
    pub fn version(&self, content_id: &str) -> Option<&AttachmentVersion> {
        self.versions_by_content.get(content_id)
    }

    /// First link (by owner id) to a document.
    #[must_use]
    pub fn link_to(&self, content_id: &str) -> Option<&AttachmentLink> {
        self.owners()
            .into_iter()
            .flat_map(|owner| self.links_for(owner))
            .find(|link| link.content_id == content_id)
    }

    /// Owners with at least one link, sorted.
    #[must_use]
    pub fn owners(&self) -> Vec<&str> {
        let mut owners: Vec<_> = self.links_by_owner.keys().map(String::as_str).collect();
        owners.sort_unstable();
        owners
    }

    /// Distinct linked document ids in link order.
    #[must_use]
    pub fn content_ids(&self) -> &[String] {
        &self.content_ids
    }

    /// Whether any owner has a link.
    #[must_use]
    pub fn has_links(&self) -> bool {
        !self.links_by_owner.is_empty()
    }

    /// Number of links across all owners.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links_by_owner.values().map(Vec::len).sum()
    }
}
