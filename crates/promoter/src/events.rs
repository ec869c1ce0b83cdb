//! Wake-up events for the control loop.
//!
//! Asynchronous sources (OS signals, the supervisor watcher) only raise flags
//! here; the control loop is the single consumer. Repeated requests of the
//! same kind before the loop looks collapse into one.

use common::{Error, Result};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{Pid, getppid};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval, timeout_at};
use tracing::{error, info};

/// Why the control loop woke up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Poll interval elapsed
    Timer,
    /// Shutdown requested
    Shutdown,
    /// Configuration reload requested
    Reload,
    /// Supervisor process is gone
    SupervisorDied,
}

impl Wake {
    /// Label used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Wake::Timer => "timer",
            Wake::Shutdown => "shutdown",
            Wake::Reload => "reload",
            Wake::SupervisorDied => "supervisor_died",
        }
    }
}

#[derive(Default)]
struct Flags {
    shutdown: AtomicBool,
    reload: AtomicBool,
    supervisor_died: AtomicBool,
    notify: Notify,
}

/// Cloneable handle shared by event sources and the control loop
#[derive(Clone, Default)]
pub struct ControlEvents {
    inner: Arc<Flags>,
}

impl ControlEvents {
    /// Create a new set of events with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop without promoting
    pub fn request_shutdown(&self) {
        self.raise(&self.inner.shutdown);
    }

    /// Ask the loop to reload its configuration
    pub fn request_reload(&self) {
        self.raise(&self.inner.reload);
    }

    /// Report that the supervisor has gone away
    pub fn notify_supervisor_death(&self) {
        self.raise(&self.inner.supervisor_died);
    }

    fn raise(&self, flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_one();
    }

    /// Pending terminal event, if any. Terminal events stay pending.
    pub fn terminal_pending(&self) -> Option<Wake> {
        if self.inner.supervisor_died.load(Ordering::SeqCst) {
            Some(Wake::SupervisorDied)
        } else if self.inner.shutdown.load(Ordering::SeqCst) {
            Some(Wake::Shutdown)
        } else {
            None
        }
    }

    /// Take the highest-priority pending event.
    ///
    /// Supervisor death beats shutdown, which beats reload.
    pub fn take_pending(&self) -> Option<Wake> {
        self.terminal_pending().or_else(|| {
            self.inner
                .reload
                .swap(false, Ordering::SeqCst)
                .then_some(Wake::Reload)
        })
    }

    /// Wait up to `timeout` for an event.
    ///
    /// Returns `Wake::Timer` only when the full timeout elapsed with nothing
    /// pending. An event raised at the same moment the timer fires wins.
    pub async fn wait(&self, timeout: Duration) -> Wake {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(wake) = self.take_pending() {
                return wake;
            }

            if timeout_at(deadline, self.inner.notify.notified()).await.is_err() {
                return self.take_pending().unwrap_or(Wake::Timer);
            }
        }
    }

    /// Resolve once shutdown or supervisor death is pending
    pub async fn terminal(&self) -> Wake {
        loop {
            if let Some(wake) = self.terminal_pending() {
                return wake;
            }
            self.inner.notify.notified().await;
        }
    }
}

/// Forward SIGTERM/SIGINT as shutdown and SIGHUP as reload.
pub fn spawn_signal_listener(events: ControlEvents) -> Result<JoinHandle<()>> {
    let install = |kind: SignalKind, name: &str| {
        signal(kind)
            .map_err(|e| Error::signal(format!("failed to install {} handler: {}", name, e)))
    };

    let mut terminate = install(SignalKind::terminate(), "SIGTERM")?;
    let mut interrupt = install(SignalKind::interrupt(), "SIGINT")?;
    let mut hangup = install(SignalKind::hangup(), "SIGHUP")?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(()) = terminate.recv() => {
                    info!("Received SIGTERM, requesting shutdown");
                    events.request_shutdown();
                }
                Some(()) = interrupt.recv() => {
                    info!("Received SIGINT, requesting shutdown");
                    events.request_shutdown();
                }
                Some(()) = hangup.recv() => {
                    info!("Received SIGHUP, requesting configuration reload");
                    events.request_reload();
                }
                else => break,
            }
        }
    }))
}

/// How supervisor liveness is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorWatch {
    /// Supervisor is our parent; death shows up as re-parenting
    Parent(Pid),
    /// Supervisor is an arbitrary process
    Process(Pid),
}

impl SupervisorWatch {
    /// Watch whatever process is our parent right now
    pub fn current_parent() -> Self {
        SupervisorWatch::Parent(getppid())
    }

    /// Pid being watched
    pub fn pid(&self) -> Pid {
        match self {
            SupervisorWatch::Parent(pid) | SupervisorWatch::Process(pid) => *pid,
        }
    }

    /// Whether the supervisor still exists
    pub fn is_alive(&self) -> bool {
        match self {
            SupervisorWatch::Parent(pid) => getppid() == *pid,
            // EPERM still means the process exists
            SupervisorWatch::Process(pid) => !matches!(kill(*pid, None), Err(Errno::ESRCH)),
        }
    }
}

/// Poll supervisor liveness and raise `SupervisorDied` once it is gone.
pub fn spawn_supervisor_watch(
    events: ControlEvents,
    watch: SupervisorWatch,
    poll: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            supervisor_pid = watch.pid().as_raw(),
            poll_ms = poll.as_millis(),
            "Watching supervisor process"
        );

        let mut ticker = interval(poll);
        loop {
            ticker.tick().await;
            if !watch.is_alive() {
                error!(
                    supervisor_pid = watch.pid().as_raw(),
                    "Supervisor process is gone"
                );
                events.notify_supervisor_death();
                break;
            }
        }
    })
}
