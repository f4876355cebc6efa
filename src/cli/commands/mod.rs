//! Command implementations.

pub mod completions;
pub mod correlate;
pub mod files;
pub mod version;

use std::path::Path;

use crate::dataset::{open_dataset, AnyDataset};
use crate::error::{Error, Result};

/// Open one side of a run. The dataset has to exist already.
fn open_side(path: &Path) -> Result<AnyDataset> {
    if !path.exists() {
        return Err(Error::DatasetNotFound { path: path.to_path_buf() });
    }
    Ok(open_dataset(path)?)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}
