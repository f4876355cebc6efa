//! Typed views over the content objects.
//!
//! Attachments live in three objects on each side:
//! - `ContentDocument`: the logical file
//! - `ContentVersion`: one revision of it (only the latest is tracked)
//! - `ContentDocumentLink`: the association between an owner record and a document

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::model::record::{FieldValue, Record};
use crate::sync::{SyncError, SyncResult};

pub const DOCUMENT_OBJECT: &str = "ContentDocument";
pub const VERSION_OBJECT: &str = "ContentVersion";
pub const LINK_OBJECT: &str = "ContentDocumentLink";

/// Default field used to decide that two versions are the same logical file.
pub const DEFAULT_CONTENT_EXTERNAL_ID: &str = "Title";

/// Field names of the content objects.
pub mod fields {
    pub const ID: &str = "Id";
    pub const LINKED_ENTITY_ID: &str = "LinkedEntityId";
    pub const CONTENT_DOCUMENT_ID: &str = "ContentDocumentId";
    pub const SHARE_TYPE: &str = "ShareType";
    pub const VISIBILITY: &str = "Visibility";
    pub const TITLE: &str = "Title";
    pub const DESCRIPTION: &str = "Description";
    pub const PATH_ON_CLIENT: &str = "PathOnClient";
    pub const VERSION_DATA: &str = "VersionData";
    pub const CONTENT_MODIFIED_DATE: &str = "ContentModifiedDate";
    pub const IS_LATEST: &str = "IsLatest";
    pub const CHECKSUM: &str = "Checksum";
}

/// Fields selected when reading links.
pub const LINK_FIELDS: [&str; 5] = [
    fields::ID,
    fields::LINKED_ENTITY_ID,
    fields::CONTENT_DOCUMENT_ID,
    fields::SHARE_TYPE,
    fields::VISIBILITY,
];

/// Fields that belong to the dataset, never copied onto an uploaded version.
const SYSTEM_VERSION_FIELDS: [&str; 5] = [
    fields::ID,
    fields::CONTENT_DOCUMENT_ID,
    fields::IS_LATEST,
    fields::VERSION_DATA,
    fields::CHECKSUM,
];

/// Association between an owning record and a content document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentLink {
    pub id: String,
    pub owner_id: String,
    pub content_id: String,
    pub share_type: Option<String>,
    pub visibility: Option<String>,
}

impl AttachmentLink {
    /// Read a link from a `ContentDocumentLink` record.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the id, owner or document field is missing.
    pub fn from_record(record: &Record, position: usize) -> SyncResult<Self> {
        let required = |field: &'static str| {
            record
                .key(field)
                .ok_or(SyncError::MalformedRecord { field: field.to_string(), position })
        };

        Ok(Self {
            id: required(fields::ID)?,
            owner_id: required(fields::LINKED_ENTITY_ID)?,
            content_id: required(fields::CONTENT_DOCUMENT_ID)?,
            share_type: record.get_str(fields::SHARE_TYPE).map(String::from),
            visibility: record.get_str(fields::VISIBILITY).map(String::from),
        })
    }

    /// Build the record that links `content_id` to `owner_id`, keeping
    /// this link's sharing settings.
    #[must_use]
    pub fn to_new_link(&self, owner_id: &str, content_id: &str) -> Record {
        new_link_record(owner_id, content_id, self.share_type.as_deref(), self.visibility.as_deref())
    }
}

/// Build a `ContentDocumentLink` record for insertion.
#[must_use]
pub fn new_link_record(
    owner_id: &str,
    content_id: &str,
    share_type: Option<&str>,
    visibility: Option<&str>,
) -> Record {
    let mut record = Record::new()
        .with(fields::LINKED_ENTITY_ID, owner_id)
        .with(fields::CONTENT_DOCUMENT_ID, content_id);
    if let Some(share_type) = share_type {
        record.set(fields::SHARE_TYPE, share_type);
    }
    if let Some(visibility) = visibility {
        record.set(fields::VISIBILITY, visibility);
    }
    record
}

/// Latest version of a content document.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentVersion {
    pub id: String,
    pub content_id: String,
    /// Value of the configured content external-id field.
    pub external_id_value: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// The record as read, used to build uploads.
    pub record: Record,
}

impl AttachmentVersion {
    /// Read a version from a `ContentVersion` record.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the id or document field is missing.
    pub fn from_record(record: Record, external_id_field: &str, position: usize) -> SyncResult<Self> {
        let id = record
            .key(fields::ID)
            .ok_or(SyncError::MalformedRecord { field: fields::ID.to_string(), position })?;
        let content_id = record.key(fields::CONTENT_DOCUMENT_ID).ok_or(SyncError::MalformedRecord {
            field: fields::CONTENT_DOCUMENT_ID.to_string(),
            position,
        })?;

        Ok(Self {
            id,
            content_id,
            external_id_value: record.key(external_id_field),
            last_modified: record.get(fields::CONTENT_MODIFIED_DATE).and_then(parse_timestamp),
            record,
        })
    }

    /// Whether both versions describe the same logical file.
    ///
    /// Versions without an external-id value never match.
    #[must_use]
    pub fn same_file_as(&self, other: &AttachmentVersion) -> bool {
        match (&self.external_id_value, &other.external_id_value) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Whether this version was modified strictly after `other`.
    ///
    /// Unknown timestamps never count as newer.
    #[must_use]
    pub fn is_newer_than(&self, other: &AttachmentVersion) -> bool {
        match (self.last_modified, other.last_modified) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => false,
        }
    }

    /// Fields to send when uploading this version to the other side.
    ///
    /// Dataset-owned fields are stripped; the payload is added by the caller.
    #[must_use]
    pub fn to_upload_record(&self) -> Record {
        let mut record = self.record.clone();
        for field in SYSTEM_VERSION_FIELDS {
            record.remove(field);
        }
        record
    }
}

/// Parse a modification timestamp.
///
/// Accepts RFC 3339, the `2024-01-10T08:00:00.000+0000` form, a bare
/// `2024-01-10` date, or an integer of Unix milliseconds.
#[must_use]
pub fn parse_timestamp(value: &FieldValue) -> Option<DateTime<Utc>> {
    match value {
        FieldValue::Int(millis) => DateTime::from_timestamp_millis(*millis),
        FieldValue::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(dt.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(ext: Option<&str>, modified: &str) -> AttachmentVersion {
        let mut record = Record::new()
            .with(fields::ID, "068A")
            .with(fields::CONTENT_DOCUMENT_ID, "069A")
            .with(fields::CONTENT_MODIFIED_DATE, modified);
        if let Some(ext) = ext {
            record.set(fields::TITLE, ext);
        }
        AttachmentVersion::from_record(record, fields::TITLE, 0).unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = parse_timestamp(&"2024-01-10T00:00:00Z".into()).unwrap();
        assert_eq!(parse_timestamp(&"2024-01-10".into()), Some(expected));
        assert_eq!(parse_timestamp(&"2024-01-10T00:00:00.000+0000".into()), Some(expected));
        assert_eq!(
            parse_timestamp(&FieldValue::Int(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(parse_timestamp(&"yesterday".into()), None);
        assert_eq!(parse_timestamp(&FieldValue::Null), None);
    }

    #[test]
    fn test_same_file_requires_external_values() {
        let a = version(Some("V1"), "2024-01-10");
        let b = version(Some("V1"), "2024-01-05");
        let c = version(Some("V2"), "2024-01-05");
        let none = version(None, "2024-01-05");

        assert!(a.same_file_as(&b));
        assert!(!a.same_file_as(&c));
        assert!(!none.same_file_as(&none));
    }

    #[test]
    fn test_is_newer_than_is_strict() {
        let a = version(Some("V1"), "2024-01-10");
        let b = version(Some("V1"), "2024-01-05");
        assert!(a.is_newer_than(&b));
        assert!(!b.is_newer_than(&a));
        assert!(!a.is_newer_than(&a));
    }

    #[test]
    fn test_link_requires_owner() {
        let record = Record::new().with(fields::ID, "06A").with(fields::CONTENT_DOCUMENT_ID, "069");
        let err = AttachmentLink::from_record(&record, 3).unwrap_err();
        assert!(matches!(err, SyncError::MalformedRecord { ref field, position: 3 } if field == fields::LINKED_ENTITY_ID));
    }

    #[test]
    fn test_upload_record_strips_system_fields() {
        let mut v = version(Some("V1"), "2024-01-10");
        v.record.set(fields::IS_LATEST, true);
        v.record.set(fields::PATH_ON_CLIENT, "a.pdf");
        let upload = v.to_upload_record();
        assert!(!upload.contains(fields::ID));
        assert!(!upload.contains(fields::CONTENT_DOCUMENT_ID));
        assert!(!upload.contains(fields::IS_LATEST));
        assert_eq!(upload.get_str(fields::PATH_ON_CLIENT), Some("a.pdf"));
        assert_eq!(upload.get_str(fields::TITLE), Some("V1"));
    }
}
