//! Watchdog types and structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Default number of consecutive failed probes before promotion
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default spacing between liveness probes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default deadline for a single probe (connect + query)
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit code after a completed promotion
pub const EXIT_PROMOTED: i32 = 0;

/// Exit code for fatal errors, failed initialization and supervisor death
pub const EXIT_FATAL: i32 = 1;

/// Exit code for a requested shutdown without promotion
pub const EXIT_SHUTDOWN: i32 = 2;

/// Result of a single liveness probe against the primary
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Whether the primary accepted the connection and answered the query
    pub reachable: bool,

    /// When the probe finished
    pub timestamp: SystemTime,

    /// How long the probe took
    pub duration: Duration,

    /// Failure reason, if any
    pub reason: Option<String>,
}

impl ProbeResult {
    /// Create a successful result
    pub fn reachable(duration: Duration) -> Self {
        Self {
            reachable: true,
            timestamp: SystemTime::now(),
            duration,
            reason: None,
        }
    }

    /// Create a failed result
    pub fn unreachable(duration: Duration, reason: impl Into<String>) -> Self {
        Self {
            reachable: false,
            timestamp: SystemTime::now(),
            duration,
            reason: Some(reason.into()),
        }
    }

    /// Create a result for a probe that hit its deadline
    pub fn timed_out(duration: Duration) -> Self {
        Self::unreachable(duration, format!("probe timed out after {}ms", duration.as_millis()))
    }

    /// Failure reason, or "unknown" for failures without one
    pub fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("unknown")
    }
}

/// How a successful probe affects the failure counter.
///
/// `Sticky` keeps every failure counted for the lifetime of the process, so
/// scattered blips eventually add up to the threshold. `ResetOnSuccess`
/// requires the failures to be back-to-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountingPolicy {
    #[default]
    Sticky,
    ResetOnSuccess,
}

impl fmt::Display for CountingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountingPolicy::Sticky => write!(f, "sticky"),
            CountingPolicy::ResetOnSuccess => write!(f, "reset_on_success"),
        }
    }
}

/// Promotion progress. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromotionState {
    #[default]
    NotPromoted,
    Promoting,
    Promoted,
}

impl PromotionState {
    /// Advance to the next state. Returns false once `Promoted` is reached.
    pub fn advance(&mut self) -> bool {
        let next = match self {
            PromotionState::NotPromoted => PromotionState::Promoting,
            PromotionState::Promoting => PromotionState::Promoted,
            PromotionState::Promoted => return false,
        };
        *self = next;
        true
    }

    /// Numeric encoding used by the metrics gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            PromotionState::NotPromoted => 0,
            PromotionState::Promoting => 1,
            PromotionState::Promoted => 2,
        }
    }
}

impl fmt::Display for PromotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionState::NotPromoted => write!(f, "NOT_PROMOTED"),
            PromotionState::Promoting => write!(f, "PROMOTING"),
            PromotionState::Promoted => write!(f, "PROMOTED"),
        }
    }
}

/// Why the control loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Trigger file written and supervisor signalled
    Promoted,
    /// Shutdown requested before any promotion
    Shutdown,
    /// Supervisor went away; emergency exit
    SupervisorDied,
    /// Initialization or promotion failed
    Fatal,
}

impl Outcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Promoted => EXIT_PROMOTED,
            Outcome::Shutdown => EXIT_SHUTDOWN,
            Outcome::SupervisorDied | Outcome::Fatal => EXIT_FATAL,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Promoted => write!(f, "promoted"),
            Outcome::Shutdown => write!(f, "shutdown"),
            Outcome::SupervisorDied => write!(f, "supervisor_died"),
            Outcome::Fatal => write!(f, "fatal"),
        }
    }
}

/// Control loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Starting,
    Monitoring,
    Promoting,
    Terminated(Outcome),
}

impl WatchdogState {
    /// Numeric encoding used by the metrics gauge
    pub fn as_gauge(&self) -> i64 {
        match self {
            WatchdogState::Starting => 0,
            WatchdogState::Monitoring => 1,
            WatchdogState::Promoting => 2,
            WatchdogState::Terminated(_) => 3,
        }
    }
}

impl fmt::Display for WatchdogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchdogState::Starting => write!(f, "STARTING"),
            WatchdogState::Monitoring => write!(f, "MONITORING"),
            WatchdogState::Promoting => write!(f, "PROMOTING"),
            WatchdogState::Terminated(outcome) => write!(f, "TERMINATED({})", outcome),
        }
    }
}

/// Resolved watchdog settings. One snapshot is used for a whole tick.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogSettings {
    /// Time between liveness checks
    pub poll_interval: Duration,

    /// Deadline for one probe
    pub probe_timeout: Duration,

    /// Connection string for the primary
    pub primary_conninfo: String,

    /// Consecutive failures required before promotion
    pub failure_threshold: u32,

    /// Whether a success clears earlier failures
    pub counting_policy: CountingPolicy,

    /// Trigger file, already resolved under the data directory
    pub trigger_file: PathBuf,

    /// File holding the supervisor pid on its first line
    pub supervisor_pid_file: PathBuf,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            primary_conninfo: String::new(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            counting_policy: CountingPolicy::Sticky,
            trigger_file: PathBuf::from("promote"),
            supervisor_pid_file: PathBuf::from("postmaster.pid"),
        }
    }
}

impl WatchdogSettings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("Poll interval must be greater than zero".to_string());
        }

        if self.probe_timeout.is_zero() {
            return Err("Probe timeout must be greater than zero".to_string());
        }

        if self.primary_conninfo.trim().is_empty() {
            return Err("Primary connection info is required".to_string());
        }

        if self.failure_threshold == 0 {
            return Err("Failure threshold must be at least 1".to_string());
        }

        if self.trigger_file.as_os_str().is_empty() {
            return Err("Trigger file path is required".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> WatchdogSettings {
        WatchdogSettings {
            primary_conninfo: "postgres://replicator@primary:5432/postgres".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_promotion_state_only_moves_forward() {
        let mut state = PromotionState::default();
        assert_eq!(state, PromotionState::NotPromoted);

        assert!(state.advance());
        assert_eq!(state, PromotionState::Promoting);

        assert!(state.advance());
        assert_eq!(state, PromotionState::Promoted);

        assert!(!state.advance());
        assert_eq!(state, PromotionState::Promoted);
    }

    #[test]
    fn test_outcome_exit_codes() {
        assert_eq!(Outcome::Promoted.exit_code(), 0);
        assert_eq!(Outcome::Fatal.exit_code(), 1);
        assert_eq!(Outcome::SupervisorDied.exit_code(), 1);
        assert_eq!(Outcome::Shutdown.exit_code(), 2);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(WatchdogState::Monitoring.to_string(), "MONITORING");
        assert_eq!(
            WatchdogState::Terminated(Outcome::Promoted).to_string(),
            "TERMINATED(promoted)"
        );
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = valid_settings();
        assert!(settings.validate().is_ok());

        settings.failure_threshold = 0;
        assert!(settings.validate().is_err());

        let mut settings = valid_settings();
        settings.poll_interval = Duration::ZERO;
        assert!(settings.validate().is_err());

        let mut settings = valid_settings();
        settings.primary_conninfo = "   ".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_timed_out_result() {
        let result = ProbeResult::timed_out(Duration::from_millis(250));
        assert!(!result.reachable);
        assert_eq!(result.reason(), "probe timed out after 250ms");
    }
}
