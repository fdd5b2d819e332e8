//! HandBrake preset file handling.
//!
//! Preset exports are JSON documents with a `PresetList` array. Only the
//! declared names are read; the rest of the file is handed to the encoder
//! untouched via `--preset-import-file`.

use crate::config::PresetSelection;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors resolving the preset name. All are fatal at startup.
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("error reading preset file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing preset file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no presets found in file")]
    Empty,

    #[error("preset file does not declare a preset named {name:?} (found: {declared:?})")]
    NameNotDeclared { name: String, declared: Vec<String> },
}

#[derive(Debug, Deserialize)]
struct PresetFile {
    #[serde(rename = "PresetList", default)]
    preset_list: Vec<PresetEntry>,
}

#[derive(Debug, Deserialize)]
struct PresetEntry {
    #[serde(rename = "PresetName")]
    preset_name: String,
}

/// Names declared in a preset export, in file order.
pub fn parse_preset_names(content: &str) -> Result<Vec<String>, PresetError> {
    let file: PresetFile = serde_json::from_str(content)?;
    Ok(file.preset_list.into_iter().map(|p| p.preset_name).collect())
}

/// Picks the preset name according to `selection`.
pub fn select_preset_name(
    declared: &[String],
    selection: &PresetSelection,
) -> Result<String, PresetError> {
    match selection {
        PresetSelection::FirstDeclared => {
            let first = declared.first().ok_or(PresetError::Empty)?;
            if declared.len() > 1 {
                tracing::warn!(
                    preset = %first,
                    count = declared.len(),
                    "Found more than one preset in file, using first"
                );
            }
            Ok(first.clone())
        }
        PresetSelection::Fixed(name) => {
            if declared.iter().any(|d| d == name) {
                Ok(name.clone())
            } else {
                Err(PresetError::NameNotDeclared {
                    name: name.clone(),
                    declared: declared.to_vec(),
                })
            }
        }
    }
}

/// Reads the preset file and resolves the name passed to the encoder.
pub fn resolve_preset_name(
    path: &Path,
    selection: &PresetSelection,
) -> Result<String, PresetError> {
    let content = fs::read_to_string(path)?;
    let declared = parse_preset_names(&content)?;
    select_preset_name(&declared, selection)
}
