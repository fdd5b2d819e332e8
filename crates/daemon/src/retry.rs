//! Retry policies for files that failed to convert.
//!
//! A failed file stays in the watch directory and is picked up again by the
//! next scan. The policy only decides whether a selected file is actually
//! attempted; it never changes what the scan or buffer select.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Decides whether a batch member is attempted this cycle.
pub trait RetryPolicy: Send {
    fn should_attempt(&self, path: &Path) -> bool;

    fn record_success(&mut self, path: &Path);

    fn record_failure(&mut self, path: &Path);

    /// Called once per cycle with the current eligible paths so per-file
    /// state for vanished files can be dropped.
    fn retain_eligible(&mut self, _eligible: &[&Path]) {}
}

/// Always retries. Keeps no state between cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundedRetry;

impl RetryPolicy for UnboundedRetry {
    fn should_attempt(&self, _path: &Path) -> bool {
        true
    }

    fn record_success(&mut self, _path: &Path) {}

    fn record_failure(&mut self, _path: &Path) {}
}

/// Gives up on a file after `max_attempts` consecutive failures.
#[derive(Debug, Clone)]
pub struct BoundedRetry {
    max_attempts: u32,
    failures: HashMap<PathBuf, u32>,
}

impl BoundedRetry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            failures: HashMap::new(),
        }
    }

    /// Consecutive failures recorded for `path`.
    pub fn failures(&self, path: &Path) -> u32 {
        self.failures.get(path).copied().unwrap_or(0)
    }
}

impl RetryPolicy for BoundedRetry {
    fn should_attempt(&self, path: &Path) -> bool {
        self.failures(path) < self.max_attempts
    }

    fn record_success(&mut self, path: &Path) {
        self.failures.remove(path);
    }

    fn record_failure(&mut self, path: &Path) {
        *self.failures.entry(path.to_path_buf()).or_insert(0) += 1;
    }

    fn retain_eligible(&mut self, eligible: &[&Path]) {
        self.failures.retain(|path, _| eligible.contains(&path.as_path()));
    }
}

/// Policy for an optional attempt limit; `None` never gives up.
pub fn policy_for(max_attempts: Option<u32>) -> Box<dyn RetryPolicy> {
    match max_attempts {
        Some(max) => Box::new(BoundedRetry::new(max)),
        None => Box::new(UnboundedRetry),
    }
}
