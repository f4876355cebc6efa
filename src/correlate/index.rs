//! Per-dataset record index.
//!
//! A `RecordIndex` answers two questions for one side of a task:
//! which record has internal id X, and which internal id carries
//! external-id value V.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::Record;
use crate::sync::{SyncError, SyncResult};

/// What to do when two records share an external-id value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The later record in input order owns the value.
    #[default]
    LastWins,
    /// The earlier record in input order owns the value.
    FirstWins,
    /// Fail the build.
    Reject,
}

/// Records of one dataset side, indexed by id and by external id.
#[derive(Debug, Clone)]
pub struct RecordIndex {
    id_field: String,
    external_id_field: String,
    by_id: HashMap<String, Record>,
    by_external_id: HashMap<String, String>,
    /// Input order of ids, for deterministic iteration.
    order: Vec<String>,
    collisions: usize,
}

impl RecordIndex {
    /// Build an index with the default `LastWins` collision policy.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if a record lacks `id_field`, or
    /// `DuplicateId` if two records share an id.
    pub fn build(
        records: impl IntoIterator<Item = Record>,
        id_field: &str,
        external_id_field: &str,
    ) -> SyncResult<Self> {
        Self::build_with_policy(records, id_field, external_id_field, CollisionPolicy::default())
    }

    /// Build an index with an explicit collision policy.
    ///
    /// # Errors
    ///
    /// Same as [`RecordIndex::build`], plus `DuplicateExternalId` under
    /// [`CollisionPolicy::Reject`].
    pub fn build_with_policy(
        records: impl IntoIterator<Item = Record>,
        id_field: &str,
        external_id_field: &str,
        policy: CollisionPolicy,
    ) -> SyncResult<Self> {
        let mut index = Self {
            id_field: id_field.to_string(),
            external_id_field: external_id_field.to_string(),
            by_id: HashMap::new(),
            by_external_id: HashMap::new(),
            order: Vec::new(),
            collisions: 0,
        };

        for (position, record) in records.into_iter().enumerate() {
            let id = record.key(id_field).ok_or_else(|| SyncError::MalformedRecord {
                field: id_field.to_string(),
                position,
            })?;

            if index.by_id.contains_key(&id) {
                return Err(SyncError::DuplicateId { id });
            }

            if let Some(value) = record.key(external_id_field) {
                index.insert_external(value, &id, policy)?;
            }

            index.order.push(id.clone());
            index.by_id.insert(id, record);
        }

        if index.collisions > 0 {
            warn!(
                field = external_id_field,
                collisions = index.collisions,
                ?policy,
                "External id values are not unique"
            );
        }
        debug!(
            records = index.by_id.len(),
            keyed = index.by_external_id.len(),
            field = external_id_field,
            "Record index built"
        );

        Ok(index)
    }

    fn insert_external(&mut self, value: String, id: &str, policy: CollisionPolicy) -> SyncResult<()> {
        if !self.by_external_id.contains_key(&value) {
            self.by_external_id.insert(value, id.to_string());
            return Ok(());
        }

        self.collisions += 1;
        match policy {
            CollisionPolicy::LastWins => {
                self.by_external_id.insert(value, id.to_string());
            }
            CollisionPolicy::FirstWins => {}
            CollisionPolicy::Reject => {
                return Err(SyncError::DuplicateExternalId {
                    field: self.external_id_field.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Record with the given internal id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id)
    }

    /// Internal id owning an external-id value.
    #[must_use]
    pub fn id_for_external(&self, value: &str) -> Option<&str> {
        self.by_external_id.get(value).map(String::as_str)
    }

    /// Record owning an external-id value.
    #[must_use]
    pub fn get_by_external(&self, value: &str) -> Option<&Record> {
        self.id_for_external(value).and_then(|id| self.get(id))
    }

    /// External-id value of a record, if it has one.
    #[must_use]
    pub fn external_value_of(&self, record: &Record) -> Option<String> {
        record.key(&self.external_id_field)
    }

    /// Internal ids in input order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(id, record)` pairs in input order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|r| (id.as_str(), r)))
    }

    #[must_use]
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    #[must_use]
    pub fn external_id_field(&self) -> &str {
        &self.external_id_field
    }

    /// Number of external-id collisions seen while building.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Number of records carrying a non-empty external-id value.
    #[must_use]
    pub fn keyed_len(&self) -> usize {
        self.by_external_id.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
