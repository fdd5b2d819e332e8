//! HandBrake encoder module for handbraked
//!
//! Builds and runs `HandBrakeCLI` invocations for a single input file using
//! an imported preset.

use super::Encoder;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoder process could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The encoder exited unsuccessfully; `output` is everything it printed
    #[error("{program} errored ({status}):\n{output}")]
    Failed {
        program: String,
        status: String,
        output: String,
    },
}

/// Output path for a converted file: `<stem><suffix><ext>` next to the input.
///
/// `/watch/movie.mp4` with `-x265` -> `/watch/movie-x265.mp4`
///
/// The name is assembled as an `OsString`, so bytes that are not valid
/// UTF-8 survive unchanged. A trailing dot counts as an empty extension:
/// `movie.` -> `movie-x265.`
pub fn converted_path(input: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::new();
    if let Some(stem) = input.file_stem() {
        name.push(stem);
    }
    name.push(suffix);
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    input.with_file_name(name)
}

/// Parameters for one HandBrake invocation
#[derive(Debug, Clone)]
pub struct HandbrakeParams {
    /// Encoder executable
    pub program: PathBuf,
    /// Path to the input video file
    pub input_path: PathBuf,
    /// Path for the converted output file
    pub output_path: PathBuf,
    /// Preset export passed with `--preset-import-file`
    pub preset_file: PathBuf,
    /// Preset selected from the imported file
    pub preset_name: String,
}

/// Build a HandBrake command for one conversion
///
/// `<program> -i <input> -o <output> --preset-import-file <file> --preset <name>`
pub fn build_handbrake_command(params: &HandbrakeParams) -> Command {
    let mut cmd = Command::new(&params.program);

    cmd.arg("-i").arg(&params.input_path);
    cmd.arg("-o").arg(&params.output_path);
    cmd.arg("--preset-import-file").arg(&params.preset_file);
    cmd.arg("--preset").arg(&params.preset_name);

    cmd
}

/// Run HandBrake and wait for it to exit
///
/// stdout and stderr are both captured. On failure they are returned together
/// (stdout first) in [`EncodeError::Failed`] so the operator sees exactly what
/// the encoder reported.
pub fn run_handbrake(params: &HandbrakeParams) -> Result<(), EncodeError> {
    let output = build_handbrake_command(params)
        .output()
        .map_err(|e| EncodeError::Spawn {
            program: params.program.display().to_string(),
            source: e,
        })?;

    if output.status.success() {
        return Ok(());
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    Err(EncodeError::Failed {
        program: params.program.display().to_string(),
        status: output.status.to_string(),
        output: combined,
    })
}

/// [`Encoder`] backed by the HandBrake command line
#[derive(Debug, Clone)]
pub struct HandbrakeEncoder {
    program: PathBuf,
    preset_file: PathBuf,
    preset_name: String,
}

impl HandbrakeEncoder {
    pub fn new(
        program: impl Into<PathBuf>,
        preset_file: PathBuf,
        preset_name: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            preset_file,
            preset_name: preset_name.into(),
        }
    }

    pub fn preset_name(&self) -> &str {
        &self.preset_name
    }

    fn params(&self, input: &Path, output: &Path) -> HandbrakeParams {
        HandbrakeParams {
            program: self.program.clone(),
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            preset_file: self.preset_file.clone(),
            preset_name: self.preset_name.clone(),
        }
    }
}

impl Encoder for HandbrakeEncoder {
    fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError> {
        run_handbrake(&self.params(input, output))
    }
}
