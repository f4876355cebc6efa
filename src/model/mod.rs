//! Data models for recsync.
//!
//! This module contains the domain models shared by every component:
//! - Record / FieldValue
//! - Operation
//! - AttachmentLink / AttachmentVersion (typed views over content objects)

pub mod attachment;
pub mod operation;
pub mod record;

pub use attachment::{AttachmentLink, AttachmentVersion};
pub use operation::Operation;
pub use record::{FieldValue, Record};
