//! Configuration module for handbraked
//!
//! Handles loading the watch configuration from TOML files and environment variable overrides.

pub mod config;

pub use config::*;
