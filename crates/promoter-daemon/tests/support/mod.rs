//! Shared helpers for daemon integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use nix::unistd::Pid;
use promoter::{LivenessProber, ProbeResult, Promoter, PromotionError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers the first `healthy` probes, then fails every probe
#[derive(Clone)]
pub struct FailingAfter {
    healthy: usize,
    calls: Arc<AtomicUsize>,
}

impl FailingAfter {
    pub fn new(healthy: usize) -> Self {
        Self {
            healthy,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProber for FailingAfter {
    async fn probe(&self, _conninfo: &str, _deadline: Duration) -> ProbeResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.healthy {
            ProbeResult::reachable(Duration::from_millis(1))
        } else {
            ProbeResult::unreachable(Duration::from_millis(1), "connection refused")
        }
    }

    fn name(&self) -> &str {
        "failing-after"
    }
}

/// Records promotions instead of touching the filesystem or signalling
#[derive(Clone, Default)]
pub struct RecordingPromoter {
    promoted: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingPromoter {
    pub fn promotions(&self) -> Vec<PathBuf> {
        self.promoted.lock().unwrap().clone()
    }
}

impl Promoter for RecordingPromoter {
    fn supervisor_pid(&self, _pid_file: &Path) -> Result<Pid, PromotionError> {
        Ok(Pid::this())
    }

    fn promote(&self, trigger_file: &Path, _supervisor: Pid) -> Result<(), PromotionError> {
        self.promoted.lock().unwrap().push(trigger_file.to_path_buf());
        Ok(())
    }
}

/// Write a configuration file into `dir` and return its path
pub fn write_config(
    dir: &Path,
    conninfo: &str,
    poll_interval: &str,
    failure_threshold: u32,
) -> PathBuf {
    let path = dir.join("pg-promoter.yaml");
    let yaml = format!(
        r#"
watchdog:
  poll_interval: {poll_interval}
  probe_timeout: 1s
  failure_threshold: {failure_threshold}

primary:
  conninfo: "{conninfo}"

promotion:
  data_directory: "{data_directory}"

supervisor:
  watch: parent
  poll_interval: 100ms
"#,
        data_directory = dir.display(),
    );
    std::fs::write(&path, yaml).unwrap();
    path
}
