//! Reload source backed by the configuration file.

use crate::config::Config;
use promoter::{ConfigSource, WatchdogSettings};
use std::path::PathBuf;

/// Re-reads the configuration file on every load.
///
/// Only the watchdog settings are reloadable; metrics, logging and
/// supervisor settings keep their startup values.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Create a source for the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> common::Result<WatchdogSettings> {
        Config::load_from_file(&self.path)
            .and_then(|config| config.to_settings())
            .map_err(|e| common::Error::config(format!("{}: {}", self.path.display(), e)))
    }
}
