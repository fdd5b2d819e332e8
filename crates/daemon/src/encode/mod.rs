//! Encoding modules for handbraked

pub mod handbrake;

use std::path::Path;

pub use handbrake::{
    build_handbrake_command, converted_path, run_handbrake, EncodeError, HandbrakeEncoder,
    HandbrakeParams,
};

/// Converts one input file into `output`.
///
/// Implementations block until the conversion has finished.
pub trait Encoder: Send + Sync {
    fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError>;
}
