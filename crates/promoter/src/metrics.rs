//! Prometheus metrics for the watchdog.

use crate::events::Wake;
use crate::types::{PromotionState, ProbeResult, WatchdogState};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// Result (success, failure)
    pub result: String,
}

/// Labels for wake-up metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WakeLabels {
    /// Wake reason (timer, shutdown, reload, supervisor_died)
    pub reason: String,
}

/// Labels for config reload metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReloadLabels {
    /// Result (applied, rejected)
    pub result: String,
}

/// Metrics registry with all watchdog metrics
pub struct WatchdogMetrics {
    /// Prometheus registry
    pub registry: Registry,

    /// Probes performed by result
    probes_total: Family<ProbeLabels, Counter>,
    /// Probe duration
    probe_duration_seconds: Histogram,
    /// Current failure count
    consecutive_failures: Gauge,
    /// Configured failure threshold
    failure_threshold: Gauge,
    /// Configured poll interval
    poll_interval_seconds: Gauge,
    /// Promotion state (0=not promoted, 1=promoting, 2=promoted)
    promotion_state: Gauge,
    /// Control loop state (0=starting, 1=monitoring, 2=promoting, 3=terminated)
    watchdog_state: Gauge,
    /// Set once the loop has reached Monitoring
    monitoring_reached: AtomicBool,
    /// Control loop wake-ups by reason
    wakeups_total: Family<WakeLabels, Counter>,
    /// Configuration reloads by result
    config_reloads_total: Family<ReloadLabels, Counter>,
}

impl Default for WatchdogMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogMetrics {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "promoter_probes",
            "Liveness probes against the primary",
            probes_total.clone(),
        );

        // 1ms to ~16s
        let probe_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 15));
        registry.register(
            "promoter_probe_duration_seconds",
            "Liveness probe duration in seconds",
            probe_duration_seconds.clone(),
        );

        let consecutive_failures = Gauge::default();
        registry.register(
            "promoter_consecutive_failures",
            "Failed probes counted towards promotion",
            consecutive_failures.clone(),
        );

        let failure_threshold = Gauge::default();
        registry.register(
            "promoter_failure_threshold",
            "Failed probes required before promotion",
            failure_threshold.clone(),
        );

        let poll_interval_seconds = Gauge::default();
        registry.register(
            "promoter_poll_interval_seconds",
            "Seconds between liveness probes",
            poll_interval_seconds.clone(),
        );

        let promotion_state = Gauge::default();
        registry.register(
            "promoter_promotion_state",
            "Promotion state (0=not promoted, 1=promoting, 2=promoted)",
            promotion_state.clone(),
        );

        let watchdog_state = Gauge::default();
        registry.register(
            "promoter_watchdog_state",
            "Control loop state (0=starting, 1=monitoring, 2=promoting, 3=terminated)",
            watchdog_state.clone(),
        );

        let wakeups_total = Family::<WakeLabels, Counter>::default();
        registry.register(
            "promoter_wakeups",
            "Control loop wake-ups by reason",
            wakeups_total.clone(),
        );

        let config_reloads_total = Family::<ReloadLabels, Counter>::default();
        registry.register(
            "promoter_config_reloads",
            "Configuration reloads by result",
            config_reloads_total.clone(),
        );

        Self {
            registry,
            probes_total,
            probe_duration_seconds,
            consecutive_failures,
            failure_threshold,
            poll_interval_seconds,
            promotion_state,
            watchdog_state,
            monitoring_reached: AtomicBool::new(false),
            wakeups_total,
            config_reloads_total,
        }
    }

    /// Record a probe result and the failure count it produced
    pub fn record_probe(&self, result: &ProbeResult, failures: u64) {
        let label = if result.reachable { "success" } else { "failure" };
        self.probes_total
            .get_or_create(&ProbeLabels {
                result: label.to_string(),
            })
            .inc();

        self.probe_duration_seconds
            .observe(result.duration.as_secs_f64());
        self.consecutive_failures.set(failures as i64);
    }

    /// Publish the settings currently in effect
    pub fn update_settings(&self, failure_threshold: u32, poll_interval: Duration) {
        self.failure_threshold.set(i64::from(failure_threshold));
        self.poll_interval_seconds
            .set(poll_interval.as_secs() as i64);
    }

    /// Update promotion state gauge
    pub fn set_promotion_state(&self, state: PromotionState) {
        self.promotion_state.set(state.as_gauge());
    }

    /// Update control loop state gauge
    pub fn set_state(&self, state: WatchdogState) {
        self.watchdog_state.set(state.as_gauge());
        if state == WatchdogState::Monitoring {
            self.monitoring_reached.store(true, Ordering::SeqCst);
        }
    }

    /// Whether the primary has been confirmed reachable at least once
    pub fn monitoring_reached(&self) -> bool {
        self.monitoring_reached.load(Ordering::SeqCst)
    }

    /// Record why the control loop woke up
    pub fn record_wake(&self, wake: Wake) {
        self.wakeups_total
            .get_or_create(&WakeLabels {
                reason: wake.as_str().to_string(),
            })
            .inc();
    }

    /// Record a configuration reload
    pub fn record_reload(&self, applied: bool) {
        let result = if applied { "applied" } else { "rejected" };
        self.config_reloads_total
            .get_or_create(&ReloadLabels {
                result: result.to_string(),
            })
            .inc();
    }
}
