//! Standby promoter binary

use common::LogFormat;
use promoter::types::EXIT_FATAL;
use promoter_daemon::{Config, FileConfigSource, WatchdogServer};

#[tokio::main]
async fn main() {
    // Logging depends on the configuration, so errors here go to stderr
    let (config, path) = match Config::locate().and_then(|path| {
        Config::load_from_file(&path).map(|config| (config, path))
    }) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(EXIT_FATAL);
        }
    };

    common::logging::init_with(
        LogFormat::from_name(config.logging.format.as_deref()),
        config.logging.level.as_deref().unwrap_or("info"),
    );

    tracing::info!(config = %path.display(), "Configuration loaded");

    let server = WatchdogServer::new(config, FileConfigSource::new(path));
    let code = match server.run().await {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            tracing::error!(error = %e, "Standby promoter failed to start");
            EXIT_FATAL
        }
    };

    std::process::exit(code);
}
