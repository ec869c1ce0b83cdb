//! Standby-side failover watchdog for PostgreSQL streaming replication.
//!
//! The watchdog runs next to a hot standby and repeatedly checks that the
//! primary still answers a trivial query. Once the configured number of
//! failures has been counted it promotes the standby exactly once, by
//! writing a trigger file in the data directory and sending SIGUSR1 to the
//! supervising server process.
//!
//! # Features
//!
//! - Cancellable, deadline-bounded liveness probes
//! - Sticky or reset-on-success failure counting
//! - Configuration reload between ticks (SIGHUP)
//! - Immediate exit when the supervisor dies
//! - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use promoter::{
//!     ControlEvents, ControlLoop, PostgresProber, TriggerFilePromoter, WatchdogSettings,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = WatchdogSettings {
//!     primary_conninfo: "postgres://replicator@primary:5432/postgres".to_string(),
//!     poll_interval: Duration::from_secs(3),
//!     failure_threshold: 5,
//!     trigger_file: "/var/lib/postgresql/data/promote".into(),
//!     supervisor_pid_file: "/var/lib/postgresql/data/postmaster.pid".into(),
//!     ..Default::default()
//! };
//!
//! let events = ControlEvents::new();
//! let _signals = promoter::events::spawn_signal_listener(events.clone())?;
//!
//! let prober = PostgresProber;
//! let watchdog = ControlLoop::new(prober, TriggerFilePromoter::new(), settings, events, None);
//! let outcome = watchdog.run().await;
//! std::process::exit(outcome.exit_code());
//! # }
//! ```

pub mod accumulator;
pub mod control;
pub mod events;
pub mod metrics;
pub mod prober;
pub mod promotion;
pub mod types;

pub use accumulator::FailureAccumulator;
pub use control::{ConfigSource, ControlLoop};
pub use events::{ControlEvents, SupervisorWatch, Wake};
pub use metrics::WatchdogMetrics;
pub use prober::{LivenessProber, PostgresProber};
pub use promotion::{Promoter, PromotionError, TriggerFilePromoter};
pub use types::{
    CountingPolicy, Outcome, ProbeResult, PromotionState, WatchdogSettings, WatchdogState,
};
