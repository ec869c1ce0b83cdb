//! Logging utilities for the standby promoter.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to text for anything unrecognised.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::to_ascii_lowercase).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize tracing with an explicit format and default level.
///
/// RUST_LOG still takes precedence over `default_level` when set.
pub fn init_with(format: LogFormat, default_level: &str) {
    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter(default_level))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter(default_level))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_name() {
        assert_eq!(LogFormat::from_name(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_name(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::from_name(Some("text")), LogFormat::Text);
        assert_eq!(LogFormat::from_name(None), LogFormat::Text);
    }
}
