//! Daemon startup and main loop for handbraked
//!
//! Provides the daemon entry point, startup sequence and the polling loop
//! that scans, buffers and converts on a fixed interval.

use crate::buffer::{select_batch, BatchDecision};
use crate::config::{ConfigError, WatchConfig};
use crate::convert::convert_file;
use crate::cycle::{CycleError, CycleReport};
use crate::encode::{Encoder, HandbrakeEncoder};
use crate::retry::{policy_for, RetryPolicy};
use crate::scan::{scan_eligible, ScanError};
use crate::startup::{run_startup_checks, StartupError};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Startup check failed
    #[error("Startup check failed: {0}")]
    Startup(#[from] StartupError),
}

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Waiting for the interval timer
    Idle,
    /// Executing a cycle
    Running,
}

/// Daemon state containing all runtime components
///
/// Cloning is cheap; clones share the encoder, retry state and state channel.
#[derive(Clone)]
pub struct Daemon {
    /// Configuration fixed at startup
    config: Arc<WatchConfig>,
    /// Converts one file
    encoder: Arc<dyn Encoder>,
    /// Decides whether failed files are retried
    retry: Arc<Mutex<Box<dyn RetryPolicy>>>,
    /// Current scheduler state
    state: Arc<watch::Sender<DaemonState>>,
}

impl Daemon {
    /// Initialize the daemon from a configuration
    ///
    /// This performs the full startup sequence:
    /// 1. Validate the configuration
    /// 2. Run startup checks (watch dir, preset file, encoder, preset name)
    /// 3. Build the HandBrake encoder and the retry policy
    pub fn new(config: WatchConfig) -> Result<Self, DaemonError> {
        config.validate()?;
        let report = run_startup_checks(&config)?;
        info!(
            encoder = %report.encoder_path.display(),
            preset = %report.preset_name,
            "Startup checks passed"
        );

        let encoder = HandbrakeEncoder::new(
            report.encoder_path,
            config.preset_path.clone(),
            report.preset_name,
        );
        Ok(Self::with_encoder(config, Arc::new(encoder)))
    }

    /// Initialize the daemon with a given encoder and no startup checks
    ///
    /// Useful for testing when HandBrake is not available.
    pub fn with_encoder(config: WatchConfig, encoder: Arc<dyn Encoder>) -> Self {
        let retry = policy_for(config.max_attempts);
        let (state, _) = watch::channel(DaemonState::Idle);
        Self {
            config: Arc::new(config),
            encoder,
            retry: Arc::new(Mutex::new(retry)),
            state: Arc::new(state),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn state(&self) -> DaemonState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe_state(&self) -> watch::Receiver<DaemonState> {
        self.state.subscribe()
    }

    /// Run one full cycle: scan, buffer, convert each batch member.
    ///
    /// Blocks for as long as the encoder runs. A scan failure aborts the
    /// cycle; per-file failures are collected in the report's error.
    pub fn run_cycle(&self, now: SystemTime) -> Result<CycleReport, ScanError> {
        let cfg = &self.config;
        debug!(dir = %cfg.watch_dir.display(), "Checking watch directory");

        let eligible = scan_eligible(&cfg.watch_dir, &cfg.suffix, cfg.wait_time(), now)?;
        let eligible_count = eligible.len();

        let mut retry = self.lock_retry();
        let paths: Vec<&Path> = eligible.iter().map(|c| c.path.as_path()).collect();
        retry.retain_eligible(&paths);

        let batch = match select_batch(eligible, cfg.buffer_size) {
            BatchDecision::Idle { .. } => {
                debug!(eligible = eligible_count, "Nothing to process");
                return Ok(CycleReport::idle(eligible_count));
            }
            BatchDecision::Process(batch) => batch,
        };

        let mut report = CycleReport::idle(eligible_count);
        let mut errors = CycleError::default();

        for candidate in batch {
            if !retry.should_attempt(&candidate.path) {
                debug!(file = %candidate.name, "Retry limit reached, leaving file in place");
                report.withheld.push(candidate.path);
                continue;
            }

            info!("Processing {}", candidate.name);
            match convert_file(
                self.encoder.as_ref(),
                &candidate,
                &cfg.suffix,
                cfg.min_size_bytes,
            ) {
                Ok(output) => {
                    retry.record_success(&candidate.path);
                    report.converted.push(output);
                }
                Err(e) => {
                    retry.record_failure(&candidate.path);
                    errors.push(e);
                }
            }
            info!("Done processing");
        }

        report.error = errors.into_result().err();
        Ok(report)
    }

    /// Run the daemon main loop forever
    pub async fn run(&self) {
        self.run_until(std::future::pending()).await
    }

    /// Run the daemon main loop until `shutdown` completes
    ///
    /// The first cycle starts immediately; later cycles start `interval` after
    /// the previous one finished. Shutdown never interrupts a conversion: a
    /// request during a cycle takes effect once the cycle is done.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(dir = %self.config.watch_dir.display(), "Started daemon");

        loop {
            self.state.send_replace(DaemonState::Running);

            let daemon = self.clone();
            let mut cycle = tokio::task::spawn_blocking(move || {
                daemon.log_cycle(daemon.run_cycle(SystemTime::now()));
            });

            let mut shutdown_requested = false;
            let joined = tokio::select! {
                joined = &mut cycle => joined,
                _ = &mut shutdown => {
                    info!("Shutdown requested, waiting for the current cycle to finish");
                    shutdown_requested = true;
                    cycle.await
                }
            };
            if let Err(e) = joined {
                error!(error = %e, "Cycle task failed");
            }

            self.state.send_replace(DaemonState::Idle);
            if shutdown_requested {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval()) => {}
                _ = &mut shutdown => break,
            }
        }

        info!("Daemon stopped");
    }

    fn log_cycle(&self, result: Result<CycleReport, ScanError>) {
        match result {
            Ok(report) => {
                if let Some(err) = &report.error {
                    error!(failed = err.failures().len(), "ERROR: {}", err);
                }
            }
            Err(e) => error!("ERROR: {}", e),
        }
    }

    fn lock_retry(&self) -> MutexGuard<'_, Box<dyn RetryPolicy>> {
        // A panic mid-cycle leaves the retry counts usable
        self.retry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::ConvertError;
    use crate::encode::EncodeError;
    use crate::validate::ValidationError;
    use std::fs::{self, File};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records every call and writes `output_bytes` to the output unless the
    /// input name is listed in `fail`.
    struct FakeEncoder {
        output_bytes: usize,
        fail: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEncoder {
        fn new(output_bytes: usize) -> Self {
            Self {
                output_bytes,
                fail: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, name: &'static str) -> Self {
            self.fail.push(name);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Encoder for FakeEncoder {
        fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError> {
            let name = input.file_name().unwrap().to_string_lossy().into_owned();
            self.calls.lock().unwrap().push(name.clone());
            if self.fail.contains(&name.as_str()) {
                return Err(EncodeError::Failed {
                    program: "HandBrakeCLI".to_string(),
                    status: "exit status: 2".to_string(),
                    output: "ERROR: No title found.\n".to_string(),
                });
            }
            fs::write(output, vec![0u8; self.output_bytes]).unwrap();
            Ok(())
        }
    }

    fn test_config(dir: &Path) -> WatchConfig {
        WatchConfig {
            watch_dir: dir.to_path_buf(),
            preset_path: PathBuf::from("/unused/preset.json"),
            interval_secs: 3600,
            min_size_bytes: 100,
            buffer_size: 2,
            wait_time_secs: 10,
            ..WatchConfig::default()
        }
    }

    /// Creates `name` modified `age_secs` ago.
    fn video(dir: &Path, name: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
        path
    }

    #[test]
    fn test_buffer_holds_back_newest_two() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = video(dir, "a.mp4", 300);
        let b = video(dir, "b.mp4", 200);
        let c = video(dir, "c.mp4", 100);

        let encoder = Arc::new(FakeEncoder::new(500));
        let daemon = Daemon::with_encoder(test_config(dir), encoder.clone());
        let report = daemon.run_cycle(SystemTime::now()).unwrap();

        assert_eq!(encoder.calls(), vec!["a.mp4"]);
        assert_eq!(report.eligible, 3);
        assert_eq!(report.converted, vec![dir.join("a-x265.mp4")]);
        assert!(report.error.is_none());
        assert!(!a.exists());
        assert!(b.exists());
        assert!(c.exists());
    }

    #[test]
    fn test_at_or_below_buffer_does_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = video(dir, "a.mp4", 300);
        let b = video(dir, "b.mp4", 200);

        let encoder = Arc::new(FakeEncoder::new(500));
        let daemon = Daemon::with_encoder(test_config(dir), encoder.clone());
        let report = daemon.run_cycle(SystemTime::now()).unwrap();

        assert!(encoder.calls().is_empty());
        assert_eq!(report.eligible, 2);
        assert_eq!(report.attempted(), 0);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_batch_runs_least_stale_to_most_stale() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let files = [
            ("e.mkv", 100),
            ("d.mkv", 200),
            ("c.mkv", 300),
            ("b.mkv", 400),
            ("a.mkv", 500),
        ];
        for (name, age) in files {
            video(dir, name, age);
        }

        let encoder = Arc::new(FakeEncoder::new(500));
        let daemon = Daemon::with_encoder(test_config(dir), encoder.clone());
        daemon.run_cycle(SystemTime::now()).unwrap();

        assert_eq!(encoder.calls(), vec!["c.mkv", "b.mkv", "a.mkv"]);
    }

    #[test]
    fn test_recent_files_do_not_count_toward_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        video(dir, "a.mp4", 300);
        video(dir, "b.mp4", 200);
        video(dir, "still-copying.mp4", 1);

        let encoder = Arc::new(FakeEncoder::new(500));
        let daemon = Daemon::with_encoder(test_config(dir), encoder.clone());
        let report = daemon.run_cycle(SystemTime::now()).unwrap();

        assert_eq!(report.eligible, 2);
        assert!(encoder.calls().is_empty());
    }

    #[test]
    fn test_converted_file_is_never_selected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let converted = video(dir, "movie-x265.mp4", 1_000_000);

        let encoder = Arc::new(FakeEncoder::new(500));
        let config = WatchConfig {
            buffer_size: 0,
            ..test_config(dir)
        };
        let daemon = Daemon::with_encoder(config, encoder.clone());
        let report = daemon.run_cycle(SystemTime::now()).unwrap();

        assert_eq!(report.eligible, 0);
        assert!(encoder.calls().is_empty());
        assert!(converted.exists());
    }

    #[test]
    fn test_encoder_failure_is_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = video(dir, "a.mp4", 500);
        let b = video(dir, "b.mp4", 400);
        video(dir, "c.mp4", 300);
        video(dir, "d.mp4", 200);

        let encoder = Arc::new(FakeEncoder::new(500).failing("b.mp4"));
        let daemon = Daemon::with_encoder(test_config(dir), encoder.clone());
        let report = daemon.run_cycle(SystemTime::now()).unwrap();

        // b failed first but a was still attempted
        assert_eq!(encoder.calls(), vec!["b.mp4", "a.mp4"]);
        assert!(b.exists(), "original must survive an encoder failure");
        assert!(!a.exists());

        let err = report.error.expect("cycle should report b's failure");
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].path(), b.as_path());
        let message = err.to_string();
        assert!(message.contains("b.mp4"));
        assert!(message.contains("No title found"));
    }

    #[test]
    fn test_undersized_output_keeps_original() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = video(dir, "a.mp4", 300);
        video(dir, "b.mp4", 200);
        video(dir, "c.mp4", 100);

        let encoder = Arc::new(FakeEncoder::new(50));
        let daemon = Daemon::with_encoder(test_config(dir), encoder);
        let report = daemon.run_cycle(SystemTime::now()).unwrap();

        assert!(a.exists());
        let err = report.error.expect("undersized output must fail");
        assert!(matches!(
            err.failures()[0],
            ConvertError::Validation {
                source: ValidationError::OutputTooSmall { .. },
                ..
            }
        ));
        assert!(err.to_string().contains("too small"));
    }

    #[test]
    fn test_unbounded_retry_attempts_every_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        video(dir, "a.mp4", 300);
        video(dir, "b.mp4", 200);
        video(dir, "c.mp4", 100);

        let encoder = Arc::new(FakeEncoder::new(500).failing("a.mp4"));
        let daemon = Daemon::with_encoder(test_config(dir), encoder.clone());
        for _ in 0..3 {
            assert!(daemon.run_cycle(SystemTime::now()).unwrap().error.is_some());
        }

        assert_eq!(encoder.calls(), vec!["a.mp4", "a.mp4", "a.mp4"]);
    }

    #[test]
    fn test_bounded_retry_withholds_after_limit() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let a = video(dir, "a.mp4", 300);
        video(dir, "b.mp4", 200);
        video(dir, "c.mp4", 100);

        let encoder = Arc::new(FakeEncoder::new(500).failing("a.mp4"));
        let config = WatchConfig {
            max_attempts: Some(2),
            ..test_config(dir)
        };
        let daemon = Daemon::with_encoder(config, encoder.clone());

        daemon.run_cycle(SystemTime::now()).unwrap();
        daemon.run_cycle(SystemTime::now()).unwrap();
        let third = daemon.run_cycle(SystemTime::now()).unwrap();

        assert_eq!(encoder.calls().len(), 2);
        assert_eq!(third.withheld, vec![a.clone()]);
        assert!(third.error.is_none());
        assert!(a.exists());
    }

    #[test]
    fn test_scan_failure_aborts_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("incoming");
        fs::create_dir(&dir).unwrap();

        let daemon = Daemon::with_encoder(test_config(&dir), Arc::new(FakeEncoder::new(500)));
        fs::remove_dir(&dir).unwrap();

        assert!(daemon.run_cycle(SystemTime::now()).is_err());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Daemon::new(WatchConfig::default());
        assert!(matches!(result, Err(DaemonError::Config(_))));
    }

    #[test]
    fn test_new_fails_on_missing_watch_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir.path().join("missing"));
        let result = Daemon::new(config);
        assert!(matches!(
            result,
            Err(DaemonError::Startup(StartupError::WatchDirMissing(_)))
        ));
    }

    #[tokio::test]
    async fn test_run_until_finishes_cycle_before_stopping() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        video(dir, "a.mp4", 300);
        video(dir, "b.mp4", 200);
        video(dir, "c.mp4", 100);

        let encoder = Arc::new(FakeEncoder::new(500));
        let daemon = Daemon::with_encoder(test_config(dir), encoder.clone());

        // Shutdown is already requested; the first cycle still runs to completion
        tokio::time::timeout(Duration::from_secs(10), daemon.run_until(async {}))
            .await
            .expect("daemon should stop after the first cycle");

        assert_eq!(encoder.calls(), vec!["a.mp4"]);
        assert!(dir.join("a-x265.mp4").exists());
        assert_eq!(daemon.state(), DaemonState::Idle);
    }

    #[tokio::test]
    async fn test_run_until_stops_while_idle() {
        let temp_dir = TempDir::new().unwrap();
        let encoder = Arc::new(FakeEncoder::new(500));
        let daemon = Daemon::with_encoder(test_config(temp_dir.path()), encoder.clone());
        let mut states = daemon.subscribe_state();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let runner = daemon.clone();
        let handle = tokio::spawn(async move {
            runner
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        // The first cycle flips the state to Running and back
        states.changed().await.unwrap();
        states.wait_for(|s| *s == DaemonState::Idle).await.unwrap();

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("daemon should stop while sleeping")
            .unwrap();

        assert!(encoder.calls().is_empty());
    }
}
