//! Conversion of a single file: encode, validate, remove the original.

use crate::cleanup::remove_original;
use crate::cycle::ConvertError;
use crate::encode::{converted_path, Encoder};
use crate::scan::CandidateFile;
use crate::validate::validate_output;
use std::path::PathBuf;

/// Converts `candidate` and removes the original once the output checks out.
///
/// Returns the path of the converted file. The original is only deleted
/// after the encoder succeeded and the output passed validation.
pub fn convert_file(
    encoder: &dyn Encoder,
    candidate: &CandidateFile,
    suffix: &str,
    min_size_bytes: u64,
) -> Result<PathBuf, ConvertError> {
    let input = &candidate.path;
    let output = converted_path(input, suffix);

    encoder
        .encode(input, &output)
        .map_err(|e| ConvertError::Encode {
            path: input.clone(),
            source: e,
        })?;

    let size = validate_output(&output, min_size_bytes).map_err(|e| ConvertError::Validation {
        path: input.clone(),
        source: e,
    })?;
    tracing::debug!(output = %output.display(), size, "converted output validated");

    remove_original(input)?;
    Ok(output)
}
