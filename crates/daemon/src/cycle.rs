//! Per-cycle results and error aggregation.
//!
//! A failing file never stops the rest of its batch. Failures are collected
//! into one [`CycleError`] that is reported once and then dropped.

use crate::cleanup::CleanupError;
use crate::encode::EncodeError;
use crate::validate::ValidationError;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why one file in a batch was not converted
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The encoder failed or could not be started
    #[error("error converting {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: EncodeError,
    },

    /// The output is missing or too small; the original is kept
    #[error("error converting {}: {source}", .path.display())]
    Validation {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    /// The output is valid but the original could not be removed
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
}

impl ConvertError {
    /// The original input file this failure belongs to.
    pub fn path(&self) -> &Path {
        match self {
            ConvertError::Encode { path, .. } => path,
            ConvertError::Validation { path, .. } => path,
            ConvertError::Cleanup(e) => &e.path,
        }
    }
}

/// All failures of one cycle, in processing order.
#[derive(Debug, Default)]
pub struct CycleError {
    failures: Vec<ConvertError>,
}

impl CycleError {
    pub fn push(&mut self, failure: ConvertError) {
        self.failures.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ConvertError] {
        &self.failures
    }

    /// `Ok` when nothing failed.
    pub fn into_result(self) -> Result<(), CycleError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str(" , ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for CycleError {}

/// What one scheduler cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Size of the eligible set
    pub eligible: usize,
    /// Converted outputs, in processing order
    pub converted: Vec<PathBuf>,
    /// Batch members the retry policy declined to attempt
    pub withheld: Vec<PathBuf>,
    /// Combined failure, if any file failed
    pub error: Option<CycleError>,
}

impl CycleReport {
    /// A cycle where the buffer absorbed every eligible file.
    pub fn idle(eligible: usize) -> Self {
        Self {
            eligible,
            ..Self::default()
        }
    }

    /// Number of files that were attempted.
    pub fn attempted(&self) -> usize {
        self.converted.len() + self.error.as_ref().map_or(0, |e| e.failures().len())
    }
}
