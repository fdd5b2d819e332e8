//! handbraked
//!
//! Background service that polls a directory, holds back the newest arrivals,
//! converts the rest with HandBrake and removes originals once the converted
//! output checks out.

pub mod buffer;
pub mod cleanup;
pub mod convert;
pub mod cycle;
pub mod daemon;
pub mod encode;
pub mod preset;
pub mod retry;
pub mod scan;
pub mod startup;
pub mod validate;

pub use buffer::{select_batch, BatchDecision};
pub use cleanup::{remove_original, CleanupError};
pub use convert::convert_file;
pub use cycle::{ConvertError, CycleError, CycleReport};
pub use daemon::{Daemon, DaemonError, DaemonState};
pub use encode::{
    build_handbrake_command, converted_path, run_handbrake, EncodeError, Encoder,
    HandbrakeEncoder, HandbrakeParams,
};
pub use handbraked_config as config;
pub use handbraked_config::{PresetSelection, WatchConfig};
pub use preset::{resolve_preset_name, PresetError};
pub use retry::{policy_for, BoundedRetry, RetryPolicy, UnboundedRetry};
pub use scan::{filter_eligible, list_candidates, scan_eligible, CandidateFile, ScanError};
pub use startup::{run_startup_checks, StartupError, StartupReport};
pub use validate::{validate_output, ValidationError};
