//! Record model for recsync.
//!
//! A record is a bag of named field values read from one side of a task.
//! Field names are kept sorted so serialized records are stable.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single field value.
///
/// Serialized untagged, so a record round-trips as a plain JSON object:
/// `{"Id":"001","Name":"Acme","NumberOfEmployees":12}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Binary payload (only ever set on `VersionData`).
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Canonical key form used by indexes.
    ///
    /// Returns `None` for values that cannot identify a record:
    /// `Null`, `Bytes` and empty (or whitespace-only) text.
    #[must_use]
    pub fn as_key(&self) -> Option<String> {
        match self {
            Self::Null | Self::Bytes(_) => None,
            Self::Text(s) if s.trim().is_empty() => None,
            Self::Text(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
        }
    }

    /// Borrow the value as text, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for `Null` and empty text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A record read from (or written to) a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Get a field as non-empty text.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(FieldValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Key form of a field, see [`FieldValue::as_key`].
    #[must_use]
    pub fn key(&self, field: &str) -> Option<String> {
        self.get(field).and_then(FieldValue::as_key)
    }

    /// Whether the record carries a field (even a null one).
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Iterate fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every field of `other` onto this record.
    pub fn merge(&mut self, other: &Record) {
        for (k, v) in &other.fields {
            self.fields.insert(k.clone(), v.clone());
        }
    }

    /// Keep only the listed fields. An empty list keeps everything.
    #[must_use]
    pub fn project(&self, fields: &[String]) -> Record {
        if fields.is_empty() {
            return self.clone();
        }
        let fields = fields
            .iter()
            .filter_map(|f| self.fields.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
        Record { fields }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_key_excludes_empty_values() {
        assert_eq!(FieldValue::Null.as_key(), None);
        assert_eq!(FieldValue::Text(String::new()).as_key(), None);
        assert_eq!(FieldValue::Text("  ".into()).as_key(), None);
        assert_eq!(FieldValue::Bytes(vec![1, 2]).as_key(), None);
        assert_eq!(FieldValue::Int(42).as_key(), Some("42".to_string()));
        assert_eq!(FieldValue::Text("X".into()).as_key(), Some("X".to_string()));
    }

    #[test]
    fn test_record_json_shape() {
        let record = Record::new()
            .with("Id", "001")
            .with("Count", 3_i64)
            .with("Active", true)
            .with("Note", FieldValue::Null);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Active":true,"Count":3,"Id":"001","Note":null}"#);

        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_project_keeps_requested_fields() {
        let record = Record::new().with("Id", "1").with("Name", "a").with("Other", "b");
        let projected = record.project(&["Id".to_string(), "Name".to_string(), "Missing".to_string()]);
        assert_eq!(projected.len(), 2);
        assert!(projected.contains("Name"));
        assert!(!projected.contains("Other"));

        assert_eq!(record.project(&[]), record);
    }

    #[test]
    fn test_get_str_skips_empty_text() {
        let record = Record::new().with("A", "").with("B", "b");
        assert_eq!(record.get_str("A"), None);
        assert_eq!(record.get_str("B"), Some("b"));
        assert_eq!(record.get_str("C"), None);
    }
}
