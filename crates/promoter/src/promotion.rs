//! Trigger-file promotion.
//!
//! Promotion is strictly ordered: resolve the supervisor pid, create the
//! trigger file, make it durable and close it, then signal the supervisor.
//! The supervisor looks for the trigger file when the signal arrives, so the
//! file must exist first. Any failed step aborts the whole sequence.

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::{Pid, close};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Signal asking the supervisor to check for the trigger file
pub const PROMOTE_SIGNAL: Signal = Signal::SIGUSR1;

/// Promotion failure, one variant per step
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    #[error("could not determine supervisor pid from {}: {reason}", .path.display())]
    SupervisorPidUnavailable { path: PathBuf, reason: String },

    #[error("could not create trigger file {}: {source}", .path.display())]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not close trigger file {}: {source}", .path.display())]
    FileCloseFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to send SIGUSR1 to supervisor process {pid}: {source}")]
    SignalFailed {
        pid: i32,
        #[source]
        source: Errno,
    },
}

impl PromotionError {
    /// Name of the step that failed, for logs
    pub fn step(&self) -> &'static str {
        match self {
            PromotionError::SupervisorPidUnavailable { .. } => "resolve_supervisor_pid",
            PromotionError::FileCreateFailed { .. } => "create_trigger_file",
            PromotionError::FileCloseFailed { .. } => "close_trigger_file",
            PromotionError::SignalFailed { .. } => "signal_supervisor",
        }
    }
}

/// Promotion executor trait
#[cfg_attr(test, mockall::automock)]
pub trait Promoter: Send + Sync {
    /// Find the process to signal
    fn supervisor_pid(&self, pid_file: &Path) -> Result<Pid, PromotionError> {
        read_supervisor_pid(pid_file)
    }

    /// Write the trigger file and signal the supervisor
    fn promote(&self, trigger_file: &Path, supervisor: Pid) -> Result<(), PromotionError>;
}

/// Promotes by writing a trigger file and sending SIGUSR1
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerFilePromoter;

impl TriggerFilePromoter {
    /// Create a new trigger file promoter
    pub fn new() -> Self {
        Self
    }
}

impl Promoter for TriggerFilePromoter {
    fn promote(&self, trigger_file: &Path, supervisor: Pid) -> Result<(), PromotionError> {
        write_trigger_file(trigger_file)?;
        debug!(trigger_file = %trigger_file.display(), "Trigger file written");

        kill(supervisor, PROMOTE_SIGNAL).map_err(|source| PromotionError::SignalFailed {
            pid: supervisor.as_raw(),
            source,
        })?;

        info!(
            trigger_file = %trigger_file.display(),
            supervisor_pid = supervisor.as_raw(),
            "Promotion initiated"
        );
        Ok(())
    }
}

/// Read the supervisor pid from the first line of `pid_file`.
pub fn read_supervisor_pid(pid_file: &Path) -> Result<Pid, PromotionError> {
    let unavailable = |reason: String| PromotionError::SupervisorPidUnavailable {
        path: pid_file.to_path_buf(),
        reason,
    };

    let contents = std::fs::read_to_string(pid_file).map_err(|e| unavailable(e.to_string()))?;
    let first_line = contents.lines().next().unwrap_or("").trim();

    let pid: i32 = first_line
        .parse()
        .map_err(|_| unavailable(format!("first line {:?} is not a pid", first_line)))?;

    if pid <= 0 {
        return Err(unavailable(format!("pid {} is not positive", pid)));
    }

    Ok(Pid::from_raw(pid))
}

fn write_trigger_file(path: &Path) -> Result<(), PromotionError> {
    let file = File::create(path).map_err(|source| PromotionError::FileCreateFailed {
        path: path.to_path_buf(),
        source,
    })?;

    let close_failed = |source| PromotionError::FileCloseFailed {
        path: path.to_path_buf(),
        source,
    };

    file.sync_all().map_err(close_failed)?;
    close_checked(file).map_err(close_failed)
}

/// Close a file and report the result, which `Drop for File` discards.
fn close_checked(file: File) -> io::Result<()> {
    close(file).map_err(io::Error::from)
}
