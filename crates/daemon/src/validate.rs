//! Output validation
//!
//! Post-encode check that the converted file exists and is not suspiciously
//! small. File size is the only integrity signal; the media itself is never
//! parsed.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a converted file was rejected
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The output could not be stat'ed
    #[error("error reading converted video {}: {source}", .path.display())]
    OutputMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output is below the configured minimum
    #[error("converted video {} too small: {size} bytes < minimum {minimum}", .path.display())]
    OutputTooSmall { path: PathBuf, size: u64, minimum: u64 },
}

/// Result of the minimum size check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    /// Output is at least the minimum
    Accept,
    /// Output is below the minimum
    Reject { output_bytes: u64, minimum_bytes: u64 },
}

/// Accepts when `output_bytes >= minimum_bytes`.
pub fn check_min_size(output_bytes: u64, minimum_bytes: u64) -> SizeCheck {
    if output_bytes >= minimum_bytes {
        SizeCheck::Accept
    } else {
        SizeCheck::Reject {
            output_bytes,
            minimum_bytes,
        }
    }
}

/// Confirms the encoder produced a plausible file at `path`.
///
/// Returns the output size on success.
pub fn validate_output(path: &Path, minimum_bytes: u64) -> Result<u64, ValidationError> {
    let metadata = fs::metadata(path).map_err(|e| ValidationError::OutputMissing {
        path: path.to_path_buf(),
        source: e,
    })?;

    match check_min_size(metadata.len(), minimum_bytes) {
        SizeCheck::Accept => Ok(metadata.len()),
        SizeCheck::Reject {
            output_bytes,
            minimum_bytes,
        } => Err(ValidationError::OutputTooSmall {
            path: path.to_path_buf(),
            size: output_bytes,
            minimum: minimum_bytes,
        }),
    }
}
