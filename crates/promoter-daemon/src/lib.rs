//! Standby promoter daemon
//!
//! Runs the failover watchdog as a long-lived process next to a hot
//! standby.
//!
//! # Components
//!
//! - **Config**: YAML configuration file, search paths and validation
//! - **FileConfigSource**: re-reads the file on SIGHUP
//! - **MetricsServer**: optional Prometheus `/metrics` endpoint
//! - **WatchdogServer**: signal handling, supervisor watch and control loop
//!
//! # Exit codes
//!
//! - 0: standby promoted
//! - 1: configuration error, promotion failure or supervisor death
//! - 2: shut down without promoting

pub mod config;
pub mod http_server;
pub mod server;
pub mod source;

pub use config::{Config, ConfigError};
pub use http_server::MetricsServer;
pub use server::WatchdogServer;
pub use source::FileConfigSource;
