//! recsync - correlate records across two datasets and synchronize their files
//!
//! This crate provides the core functionality for the `recsync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Records, operations and typed content-object views
//! - [`dataset`] - Dataset connections (SQLite, JSONL) and chunked queries
//! - [`correlate`] - Record indexes and source-to-target correlation
//! - [`task`] - Per-object migration tasks
//! - [`sync`] - Attachment diffing and plan execution
//! - [`addon`] - Add-on modules (file export)
//! - [`messages`] - User-facing message catalog and reporters
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod addon;
pub mod cli;
pub mod config;
pub mod correlate;
pub mod dataset;
pub mod error;
pub mod messages;
pub mod model;
pub mod sync;
pub mod task;

pub use error::{Error, Result};
