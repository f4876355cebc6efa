//! Source-to-target record correlation.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::correlate::index::RecordIndex;
use crate::model::Record;

/// Mapping from source records to their equivalent target records.
///
/// Built once per task by [`correlate`] and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Correlation {
    forward: HashMap<String, Record>,
    forward_ids: HashMap<String, String>,
    reverse: HashMap<String, String>,
    stats: CorrelationStats,
}

/// Counts describing how well two sides matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationStats {
    /// Source records considered.
    pub source_records: usize,
    /// Source records that found a target.
    pub matched: usize,
    /// Source records without an external-id value.
    pub without_external_id: usize,
    /// Source records whose value has no target counterpart.
    pub unmatched: usize,
    /// Matches that landed on a target already claimed by another source record.
    pub shared_targets: usize,
}

impl Correlation {
    /// Target record correlated to a source id.
    #[must_use]
    pub fn target_for(&self, source_id: &str) -> Option<&Record> {
        self.forward.get(source_id)
    }

    /// Id of the target record correlated to a source id.
    #[must_use]
    pub fn target_id_for(&self, source_id: &str) -> Option<&str> {
        self.forward_ids.get(source_id).map(String::as_str)
    }

    /// Source id correlated to a target id.
    #[must_use]
    pub fn source_for(&self, target_id: &str) -> Option<&str> {
        self.reverse.get(target_id).map(String::as_str)
    }

    /// Correlated `(source id, target record)` pairs, sorted by source id.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, &Record)> {
        let mut pairs: Vec<_> = self.forward.iter().map(|(k, v)| (k.as_str(), v)).collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
    }

    /// Correlated target ids, sorted.
    #[must_use]
    pub fn target_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.reverse.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn stats(&self) -> CorrelationStats {
        self.stats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Correlate every source record with the target record sharing its
/// external-id value.
///
/// Source records without a value, or whose value is unknown on the target,
/// are simply absent from the result.
#[must_use]
pub fn correlate(source: &RecordIndex, target: &RecordIndex) -> Correlation {
    let mut correlation = Correlation::default();
    let target_id_field = target.id_field();

    for (source_id, record) in source.iter() {
        correlation.stats.source_records += 1;

        let Some(value) = source.external_value_of(record) else {
            correlation.stats.without_external_id += 1;
            continue;
        };
        let Some(target_record) = target.get_by_external(&value) else {
            correlation.stats.unmatched += 1;
            continue;
        };
        let Some(target_id) = target_record.key(target_id_field) else {
            continue;
        };

        if let Some(previous) = correlation.reverse.insert(target_id.clone(), source_id.to_string()) {
            correlation.stats.shared_targets += 1;
            warn!(
                target = %target_id,
                previous = %previous,
                source = source_id,
                "Target record correlated to more than one source record"
            );
        }
        correlation.forward_ids.insert(source_id.to_string(), target_id);
        correlation.forward.insert(source_id.to_string(), target_record.clone());
        correlation.stats.matched += 1;
    }

    debug!(
        matched = correlation.stats.matched,
        unmatched = correlation.stats.unmatched,
        without_external_id = correlation.stats.without_external_id,
        "Correlation built"
    );

    correlation
}
