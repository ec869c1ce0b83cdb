//! Watchdog daemon wiring.

use crate::config::{Config, WatchMode};
use crate::http_server::MetricsServer;
use promoter::events::{spawn_signal_listener, spawn_supervisor_watch};
use promoter::promotion::read_supervisor_pid;
use promoter::{
    ConfigSource, ControlEvents, ControlLoop, LivenessProber, Outcome, PostgresProber, Promoter,
    SupervisorWatch, TriggerFilePromoter, WatchdogMetrics,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Standby watchdog daemon
pub struct WatchdogServer<S> {
    config: Config,
    source: S,
}

impl<S> WatchdogServer<S>
where
    S: ConfigSource + 'static,
{
    /// Create a new server. `config` supplies the startup-only settings,
    /// `source` the reloadable watchdog settings.
    pub fn new(config: Config, source: S) -> Self {
        Self { config, source }
    }

    /// Run with the PostgreSQL prober and trigger file promoter
    pub async fn run(self) -> anyhow::Result<Outcome> {
        self.run_with(PostgresProber, TriggerFilePromoter::new()).await
    }

    /// Run until the control loop terminates
    pub async fn run_with<P, R>(self, prober: P, promoter: R) -> anyhow::Result<Outcome>
    where
        P: LivenessProber,
        R: Promoter,
    {
        info!("Starting standby promoter");

        let events = ControlEvents::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        tasks.push(spawn_signal_listener(events.clone())?);

        let watch = match self.config.supervisor.watch {
            WatchMode::Parent => SupervisorWatch::current_parent(),
            WatchMode::PidFile => {
                let settings = self.config.to_settings()?;
                SupervisorWatch::Process(read_supervisor_pid(&settings.supervisor_pid_file)?)
            }
        };
        tasks.push(spawn_supervisor_watch(
            events.clone(),
            watch,
            self.config.supervisor.poll_interval,
        ));

        let metrics = if self.config.metrics.enabled {
            let metrics = Arc::new(WatchdogMetrics::new());
            let server =
                MetricsServer::new(metrics.clone(), self.config.metrics.listen_addr.clone());
            tasks.push(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    warn!(error = %e, "Metrics server error");
                }
            }));
            info!("Metrics enabled on {}", self.config.metrics.listen_addr);
            Some(metrics)
        } else {
            info!("Metrics disabled");
            None
        };

        let watchdog = ControlLoop::new(prober, promoter, self.source, events, metrics);
        let outcome = watchdog.run().await;

        for task in tasks {
            task.abort();
        }

        info!(outcome = %outcome, "Standby promoter stopped");
        Ok(outcome)
    }
}
