//! Job configuration.
//!
//! A job file lists the objects to synchronize and how. It is resolved in
//! this order:
//!
//! 1. `--config <path>`
//! 2. `RECSYNC_CONFIG` environment variable
//! 3. `./recsync.json`
//! 4. `~/.recsync/config.json`
//!
//! Without any file, defaults apply and objects come from the command line.
//! `RECSYNC_BATCH_SIZE` and `RECSYNC_MAX_IN_FLIGHT` override the file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::correlate::CollisionPolicy;
use crate::dataset::DEFAULT_MAX_QUERY_LENGTH;
use crate::error::{Error, Result};
use crate::model::attachment::DEFAULT_CONTENT_EXTERNAL_ID;
use crate::model::Operation;
use crate::sync::DEFAULT_BATCH_SIZE;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "recsync.json";

/// Whole-job settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    /// Records per write call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Write batches allowed in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Upper bound on a rendered query, in characters.
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_in_flight() -> usize {
    1
}

fn default_max_query_length() -> usize {
    DEFAULT_MAX_QUERY_LENGTH
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
            max_query_length: default_max_query_length(),
        }
    }
}

/// Settings of one object task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub object: String,
    #[serde(default = "default_operation")]
    pub operation: Operation,
    /// Field whose value identifies a record on both sides.
    #[serde(default = "default_external_id")]
    pub external_id: String,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    /// File synchronization for this object; absent means no files.
    #[serde(default)]
    pub files: Option<FilesConfig>,
}

fn default_operation() -> Operation {
    Operation::Upsert
}

fn default_external_id() -> String {
    "Name".to_string()
}

fn default_id_field() -> String {
    "Id".to_string()
}

impl ObjectConfig {
    /// Settings for an object named on the command line.
    #[must_use]
    pub fn for_object(object: &str) -> Self {
        Self {
            object: object.to_string(),
            operation: default_operation(),
            external_id: default_external_id(),
            id_field: default_id_field(),
            collision_policy: CollisionPolicy::default(),
            files: Some(FilesConfig::default()),
        }
    }

    /// File settings, defaulted when the object has none.
    #[must_use]
    pub fn files_or_default(&self) -> FilesConfig {
        self.files.clone().unwrap_or_default()
    }
}

/// Settings of the file export for one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Overrides the object's operation for files.
    #[serde(default)]
    pub operation: Option<Operation>,
    /// Delete the target's files of correlated records before uploading.
    #[serde(default)]
    pub delete_old_data: bool,
    /// Version field deciding that two files are the same (default `Title`).
    #[serde(default)]
    pub content_external_id: Option<String>,
}

impl FilesConfig {
    /// Operation for files, falling back to the object's.
    #[must_use]
    pub fn operation_or(&self, task_operation: Operation) -> Operation {
        self.operation.unwrap_or(task_operation)
    }

    #[must_use]
    pub fn content_external_id(&self) -> &str {
        self.content_external_id
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_EXTERNAL_ID)
    }
}

impl SyncConfig {
    /// Read a job file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file {}: {e}", path.display())))
    }

    /// Apply overrides from a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a value is not a number.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("RECSYNC_BATCH_SIZE") {
            self.batch_size = parse_count("RECSYNC_BATCH_SIZE", &value)?;
        }
        if let Some(value) = lookup("RECSYNC_MAX_IN_FLIGHT") {
            self.max_in_flight = parse_count("RECSYNC_MAX_IN_FLIGHT", &value)?;
        }
        Ok(())
    }

    /// Check settings for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("max_in_flight", self.max_in_flight),
            ("max_query_length", self.max_query_length),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        let mut seen = HashSet::new();
        for object in &self.objects {
            let name = object.object.trim();
            if name.is_empty() {
                return Err(Error::Config("Object name must not be empty".into()));
            }
            if object.external_id.trim().is_empty() {
                return Err(Error::Config(format!("{name}: external_id must not be empty")));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(Error::Config(format!("Object {name} is configured more than once")));
            }
        }
        Ok(())
    }

    /// Settings of an object (case-insensitive).
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&ObjectConfig> {
        self.objects.iter().find(|o| o.object.eq_ignore_ascii_case(name))
    }

    /// Objects to run: the named one (configured or defaulted), or all.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when nothing is named and nothing is configured.
    pub fn select(&self, name: Option<&str>) -> Result<Vec<ObjectConfig>> {
        match name {
            Some(name) => Ok(vec![self.object(name).cloned().unwrap_or_else(|| ObjectConfig::for_object(name))]),
            None if self.objects.is_empty() => Err(Error::Config(
                "No objects configured; pass --object or add objects to the config file".into(),
            )),
            None => Ok(self.objects.clone()),
        }
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a positive integer, got '{value}'")))
}

/// The per-user config directory (`~/.recsync`).
#[must_use]
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".recsync"))
}

/// Find the job file to use, if any.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("RECSYNC_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    global_config_dir()
        .map(|dir| dir.join("config.json"))
        .filter(|p| p.is_file())
}

/// Load, override and validate the job configuration.
///
/// # Errors
///
/// Returns `Error::Config` if the file is unreadable or a setting is invalid.
pub fn load_config(explicit: Option<&Path>) -> Result<SyncConfig> {
    let mut config = match resolve_config_path(explicit) {
        Some(path) => {
            debug!(path = %path.display(), "Loading config");
            SyncConfig::from_file(&path)?
        }
        None => SyncConfig::default(),
    };
    config.apply_overrides(|name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}
