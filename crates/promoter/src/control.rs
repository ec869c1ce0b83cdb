//! Watchdog control loop.
//!
//! State transitions:
//! - Starting → Monitoring (configuration loaded, primary answered once)
//! - Monitoring → Promoting (failure threshold reached)
//! - Promoting → Terminated (promotion done or failed, never retried)
//! - Starting/Monitoring → Terminated (shutdown, supervisor death, fatal error)

use crate::accumulator::FailureAccumulator;
use crate::events::{ControlEvents, Wake};
use crate::metrics::WatchdogMetrics;
use crate::prober::{LivenessProber, redact_conninfo};
use crate::promotion::Promoter;
use crate::types::{Outcome, ProbeResult, PromotionState, WatchdogSettings, WatchdogState};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of watchdog settings, read at startup and on every reload
pub trait ConfigSource: Send + Sync {
    /// Produce a complete settings snapshot
    fn load(&self) -> common::Result<WatchdogSettings>;
}

impl ConfigSource for WatchdogSettings {
    fn load(&self) -> common::Result<WatchdogSettings> {
        Ok(self.clone())
    }
}

/// Single-threaded watchdog state machine
pub struct ControlLoop<P, R, S> {
    prober: P,
    promoter: R,
    source: S,
    events: ControlEvents,
    settings: Option<WatchdogSettings>,
    accumulator: FailureAccumulator,
    state: WatchdogState,
    promotion: PromotionState,
    metrics: Option<Arc<WatchdogMetrics>>,
}

impl<P, R, S> ControlLoop<P, R, S>
where
    P: LivenessProber,
    R: Promoter,
    S: ConfigSource,
{
    /// Create a new control loop in the `Starting` state
    pub fn new(
        prober: P,
        promoter: R,
        source: S,
        events: ControlEvents,
        metrics: Option<Arc<WatchdogMetrics>>,
    ) -> Self {
        Self {
            prober,
            promoter,
            source,
            events,
            settings: None,
            accumulator: FailureAccumulator::default(),
            state: WatchdogState::Starting,
            promotion: PromotionState::NotPromoted,
            metrics,
        }
    }

    /// Current state
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Current promotion state
    pub fn promotion_state(&self) -> PromotionState {
        self.promotion
    }

    /// Failures counted so far
    pub fn failure_count(&self) -> u64 {
        self.accumulator.count()
    }

    /// Settings in effect, once started
    pub fn settings(&self) -> Option<&WatchdogSettings> {
        self.settings.as_ref()
    }

    /// Run until a terminal state is reached
    pub async fn run(mut self) -> Outcome {
        self.start().await;

        while self.state == WatchdogState::Monitoring {
            self.tick().await;
        }

        match self.state {
            WatchdogState::Terminated(outcome) => {
                info!(
                    outcome = %outcome,
                    exit_code = outcome.exit_code(),
                    "Watchdog stopped"
                );
                outcome
            }
            other => {
                error!(state = %other, "Control loop stopped outside a terminal state");
                Outcome::Fatal
            }
        }
    }

    /// Load configuration and check the primary once.
    ///
    /// An unreachable primary at this point is a configuration problem and
    /// terminates the watchdog rather than counting towards promotion.
    pub async fn start(&mut self) -> WatchdogState {
        if self.state != WatchdogState::Starting {
            debug!(state = %self.state, "Watchdog already started");
            return self.state;
        }

        let settings = match self.load_settings() {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "Failed to load configuration");
                return self.terminate(Outcome::Fatal);
            }
        };

        let primary = redact_conninfo(&settings.primary_conninfo);
        info!(
            primary = %primary,
            prober = self.prober.name(),
            poll_interval_ms = settings.poll_interval.as_millis(),
            probe_timeout_ms = settings.probe_timeout.as_millis(),
            failure_threshold = settings.failure_threshold,
            counting_policy = %settings.counting_policy,
            trigger_file = %settings.trigger_file.display(),
            "Starting standby watchdog"
        );

        let result = match self.probe_unless_terminated(&settings).await {
            Ok(result) => result,
            Err(wake) => return self.terminate_on(wake),
        };

        if !result.reachable {
            error!(
                primary = %primary,
                reason = result.reason(),
                "Could not establish connection to primary server, check primary_conninfo"
            );
            return self.terminate(Outcome::Fatal);
        }

        self.accumulator = FailureAccumulator::new(settings.counting_policy);
        if let Some(ref m) = self.metrics {
            m.update_settings(settings.failure_threshold, settings.poll_interval);
            m.set_promotion_state(self.promotion);
        }
        self.settings = Some(settings);
        self.enter(WatchdogState::Monitoring);

        info!(primary = %primary, "Primary reachable, monitoring");
        self.state
    }

    /// Run one monitoring step: wait, then react to whatever woke us.
    ///
    /// Outside `Monitoring` this does nothing and returns the current state.
    pub async fn tick(&mut self) -> WatchdogState {
        if self.state != WatchdogState::Monitoring {
            debug!(state = %self.state, "Ignoring tick outside Monitoring");
            return self.state;
        }

        // One snapshot for the whole tick; a reload only lands between ticks.
        let Some(settings) = self.settings.clone() else {
            error!("Monitoring without settings");
            return self.terminate(Outcome::Fatal);
        };

        let wake = self.events.wait(settings.poll_interval).await;
        if let Some(ref m) = self.metrics {
            m.record_wake(wake);
        }

        match wake {
            Wake::SupervisorDied | Wake::Shutdown => self.terminate_on(wake),
            Wake::Reload => {
                self.reload();
                self.state
            }
            Wake::Timer => self.check_primary(&settings).await,
        }
    }

    fn load_settings(&self) -> common::Result<WatchdogSettings> {
        let settings = self.source.load()?;
        settings.validate().map_err(common::Error::config)?;
        Ok(settings)
    }

    fn reload(&mut self) {
        match self.load_settings() {
            Ok(settings) => {
                info!(
                    poll_interval_ms = settings.poll_interval.as_millis(),
                    failure_threshold = settings.failure_threshold,
                    counting_policy = %settings.counting_policy,
                    failures = self.accumulator.count(),
                    "Configuration reloaded"
                );

                self.accumulator.set_policy(settings.counting_policy);
                if let Some(ref m) = self.metrics {
                    m.update_settings(settings.failure_threshold, settings.poll_interval);
                    m.record_reload(true);
                }
                self.settings = Some(settings);
            }
            Err(e) => {
                warn!(error = %e, "Configuration reload failed, keeping previous settings");
                if let Some(ref m) = self.metrics {
                    m.record_reload(false);
                }
            }
        }
    }

    async fn check_primary(&mut self, settings: &WatchdogSettings) -> WatchdogState {
        let result = match self.probe_unless_terminated(settings).await {
            Ok(result) => result,
            Err(wake) => return self.terminate_on(wake),
        };

        let failures = self.accumulator.record_result(&result);
        if let Some(ref m) = self.metrics {
            m.record_probe(&result, failures);
        }

        if result.reachable {
            debug!(
                duration_ms = result.duration.as_millis(),
                failures = failures,
                "Primary is alive"
            );
        } else {
            warn!(
                primary = %redact_conninfo(&settings.primary_conninfo),
                reason = result.reason(),
                consecutive_failures = failures,
                failure_threshold = settings.failure_threshold,
                "Primary probe failed"
            );
        }

        // A shutdown seen during the probe wins over starting a promotion.
        if let Some(wake) = self.events.terminal_pending() {
            return self.terminate_on(wake);
        }

        // Only a failed probe can trigger promotion. A sticky count left above
        // a threshold lowered by reload must not fire on a successful answer.
        if !result.reachable && self.accumulator.threshold_crossed(settings.failure_threshold) {
            warn!(
                consecutive_failures = failures,
                failure_threshold = settings.failure_threshold,
                "The primary server might have crashed, promoting standby"
            );
            return self.promote(settings);
        }

        self.state
    }

    /// Probe the primary, abandoning the probe if shutdown or supervisor
    /// death arrives first. Dropping the probe future closes its connection.
    async fn probe_unless_terminated(
        &self,
        settings: &WatchdogSettings,
    ) -> Result<ProbeResult, Wake> {
        let probe = self
            .prober
            .probe(&settings.primary_conninfo, settings.probe_timeout);

        tokio::select! {
            biased;
            wake = self.events.terminal() => Err(wake),
            result = probe => Ok(result),
        }
    }

    fn promote(&mut self, settings: &WatchdogSettings) -> WatchdogState {
        if self.promotion != PromotionState::NotPromoted {
            warn!(
                promotion_state = %self.promotion,
                "Promotion already attempted, refusing to promote again"
            );
            return self.state;
        }

        self.promotion.advance();
        self.enter(WatchdogState::Promoting);
        if let Some(ref m) = self.metrics {
            m.set_promotion_state(self.promotion);
        }

        info!(
            trigger_file = %settings.trigger_file.display(),
            pid_file = %settings.supervisor_pid_file.display(),
            "Promoting standby"
        );

        let attempt = self
            .promoter
            .supervisor_pid(&settings.supervisor_pid_file)
            .and_then(|pid| self.promoter.promote(&settings.trigger_file, pid));

        match attempt {
            Ok(()) => {
                self.promotion.advance();
                if let Some(ref m) = self.metrics {
                    m.set_promotion_state(self.promotion);
                }
                self.terminate(Outcome::Promoted)
            }
            Err(e) => {
                error!(
                    step = e.step(),
                    error = %e,
                    trigger_file = %settings.trigger_file.display(),
                    "Promotion failed, standby state must be checked by an operator"
                );
                self.terminate(Outcome::Fatal)
            }
        }
    }

    fn terminate_on(&mut self, wake: Wake) -> WatchdogState {
        match wake {
            Wake::SupervisorDied => {
                error!("Supervisor process died, exiting immediately");
                self.terminate(Outcome::SupervisorDied)
            }
            Wake::Shutdown => {
                info!("Shutdown requested, stopping without promotion");
                self.terminate(Outcome::Shutdown)
            }
            Wake::Reload | Wake::Timer => self.state,
        }
    }

    fn terminate(&mut self, outcome: Outcome) -> WatchdogState {
        self.enter(WatchdogState::Terminated(outcome));
        self.state
    }

    fn enter(&mut self, state: WatchdogState) {
        self.state = state;
        if let Some(ref m) = self.metrics {
            m.set_state(state);
        }
    }
}
