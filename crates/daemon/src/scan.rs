//! Scanner module for discovering convertible videos in the watch directory.
//!
//! Lists the top level of the watch directory and filters it down to the
//! eligible set: regular entries that are not hidden, not already converted
//! and have been left alone for at least the configured wait time.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors that abort a scan (and with it, the current cycle).
#[derive(Debug, Error)]
pub enum ScanError {
    /// The watch directory could not be listed.
    #[error("error reading watch directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Metadata for one entry could not be read.
    #[error("error reading metadata for {}: {source}", .path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file found in the watch directory during one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// File name without directory.
    pub name: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
}

impl CandidateFile {
    /// Names starting with `.` are hidden.
    pub fn is_hidden(&self) -> bool {
        is_hidden_name(&self.name)
    }

    /// True when the extension-stripped name ends with `suffix`.
    pub fn is_converted(&self, suffix: &str) -> bool {
        is_converted_name(&self.name, suffix)
    }
}

/// Splits a file name into stem and extension, the extension keeping its dot.
///
/// The extension starts at the last `.`; a name without one has an empty
/// extension. `movie.final.mp4` -> (`movie.final`, `.mp4`)
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => name.split_at(idx),
        None => (name, ""),
    }
}

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

pub fn is_converted_name(name: &str, suffix: &str) -> bool {
    split_extension(name).0.ends_with(suffix)
}

/// Lists the watch directory, dropping directories, hidden names and
/// already-converted names.
///
/// Metadata is only read for entries that survive the name checks. The
/// result is in directory order; see [`filter_eligible`] for the rest.
pub fn list_candidates(dir: &Path, suffix: &str) -> Result<Vec<CandidateFile>, ScanError> {
    let mut candidates = Vec::new();

    let walker = WalkDir::new(dir).min_depth(1).max_depth(1);
    for entry in walker {
        let entry = entry.map_err(|e| ScanError::ReadDir {
            path: dir.to_path_buf(),
            source: e,
        })?;

        if entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden_name(&name) || is_converted_name(&name, suffix) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| ScanError::Metadata {
            path: entry.path().to_path_buf(),
            source: e.into(),
        })?;
        let modified = metadata.modified().map_err(|e| ScanError::Metadata {
            path: entry.path().to_path_buf(),
            source: e,
        })?;

        candidates.push(CandidateFile {
            name,
            path: entry.into_path(),
            modified,
        });
    }

    Ok(candidates)
}

/// Keeps candidates that are quiescent relative to `now` and orders them
/// newest first.
///
/// A file qualifies only when `modified + wait_time` is strictly before
/// `now`. Hidden and converted names are dropped again so the eligible set
/// holds regardless of where the candidates came from. Equal modification
/// times are ordered by path so a directory snapshot always sorts the same way.
pub fn filter_eligible(
    candidates: Vec<CandidateFile>,
    suffix: &str,
    wait_time: Duration,
    now: SystemTime,
) -> Vec<CandidateFile> {
    let mut eligible: Vec<CandidateFile> = candidates
        .into_iter()
        .filter(|c| !c.is_hidden() && !c.is_converted(suffix))
        .filter(|c| is_quiescent(c.modified, wait_time, now))
        .collect();

    eligible.sort_by(newest_first);
    eligible
}

/// Scans `dir` and returns the eligible set, newest first.
pub fn scan_eligible(
    dir: &Path,
    suffix: &str,
    wait_time: Duration,
    now: SystemTime,
) -> Result<Vec<CandidateFile>, ScanError> {
    let candidates = list_candidates(dir, suffix)?;
    Ok(filter_eligible(candidates, suffix, wait_time, now))
}

fn is_quiescent(modified: SystemTime, wait_time: Duration, now: SystemTime) -> bool {
    match modified.checked_add(wait_time) {
        Some(settled_at) => settled_at < now,
        None => false,
    }
}

fn newest_first(a: &CandidateFile, b: &CandidateFile) -> Ordering {
    b.modified
        .cmp(&a.modified)
        .then_with(|| a.path.cmp(&b.path))
}
