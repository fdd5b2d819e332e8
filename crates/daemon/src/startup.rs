//! Startup checks module for handbraked
//!
//! Preflight checks run once before the scheduler starts. Any failure here
//! is fatal:
//! - The watch directory exists and is a directory
//! - The preset file exists
//! - The encoder executable can be found on `PATH`
//! - A preset name can be resolved from the preset file

use crate::config::WatchConfig;
use crate::preset::{resolve_preset_name, PresetError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("--watch-dir does not exist: {}", .0.display())]
    WatchDirMissing(PathBuf),

    #[error("--watch-dir is not a directory: {}", .0.display())]
    WatchDirNotDirectory(PathBuf),

    #[error("--preset does not exist: {}", .0.display())]
    PresetMissing(PathBuf),

    #[error("encoder {program:?} not found on PATH: {source}")]
    EncoderNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("parse preset name: {0}")]
    Preset(#[from] PresetError),

    #[error("unknown error checking {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything resolved at startup that the scheduler needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// Absolute path of the encoder executable
    pub encoder_path: PathBuf,
    /// Preset name passed to the encoder
    pub preset_name: String,
}

/// Check that the watch directory exists and is a directory
pub fn check_watch_dir(path: &Path) -> Result<(), StartupError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StartupError::WatchDirNotDirectory(path.to_path_buf())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(StartupError::WatchDirMissing(path.to_path_buf()))
        }
        Err(e) => Err(StartupError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Check that the preset file exists
pub fn check_preset_file(path: &Path) -> Result<(), StartupError> {
    match fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(StartupError::PresetMissing(path.to_path_buf()))
        }
        Err(e) => Err(StartupError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Locate the encoder executable on `PATH`
///
/// A program given as a path is checked directly.
pub fn locate_encoder(program: &str) -> Result<PathBuf, StartupError> {
    which::which(program).map_err(|e| StartupError::EncoderNotFound {
        program: program.to_string(),
        source: e,
    })
}

/// Run all startup checks in order
///
/// Checks are run in the following order:
/// 1. Watch directory
/// 2. Preset file
/// 3. Encoder on `PATH`
/// 4. Preset name resolution
pub fn run_startup_checks(cfg: &WatchConfig) -> Result<StartupReport, StartupError> {
    check_watch_dir(&cfg.watch_dir)?;
    check_preset_file(&cfg.preset_path)?;
    let encoder_path = locate_encoder(&cfg.encoder)?;
    let preset_name = resolve_preset_name(&cfg.preset_path, &cfg.preset_selection())?;

    Ok(StartupReport {
        encoder_path,
        preset_name,
    })
}
