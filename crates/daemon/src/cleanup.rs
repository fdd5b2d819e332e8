//! Removal of originals once their conversion has been validated.
//!
//! The converted output is never rolled back: if the original cannot be
//! removed both files stay on disk and the failure is reported.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("error removing old video {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Deletes the original input file.
pub fn remove_original(path: &Path) -> Result<(), CleanupError> {
    fs::remove_file(path).map_err(|e| CleanupError {
        path: path.to_path_buf(),
        source: e,
    })
}
