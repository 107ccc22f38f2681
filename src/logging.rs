//! Console logging bootstrap.

use crate::ports::config_port::ConfigPort;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl LoggingConfig {
    /// `RUST_LOG`, else `[logging] level`, else `info`.
    pub fn resolve(rust_log: Option<String>, config: Option<&dyn ConfigPort>) -> Self {
        let log_level = rust_log
            .filter(|v| !v.trim().is_empty())
            .or_else(|| config.and_then(|c| c.get_string("logging", "level")))
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        Self { log_level }
    }

    pub fn from_env(config: Option<&dyn ConfigPort>) -> Self {
        Self::resolve(std::env::var("RUST_LOG").ok(), config)
    }
}

/// Install the global subscriber. Logs go to stderr; command output owns stdout.
///
/// A second call is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if installed.is_ok() {
        tracing::debug!(level = %config.log_level, "logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn rust_log_wins() {
        let file = FileConfigAdapter::from_string("[logging]\nlevel = warn\n").unwrap();
        let cfg = LoggingConfig::resolve(Some("debug".into()), Some(&file));
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn falls_back_to_config_then_default() {
        let file = FileConfigAdapter::from_string("[logging]\nlevel = warn\n").unwrap();
        assert_eq!(LoggingConfig::resolve(None, Some(&file)).log_level, "warn");
        assert_eq!(LoggingConfig::resolve(Some(" ".into()), None).log_level, "info");
    }

    #[test]
    fn init_twice_is_harmless() {
        let cfg = LoggingConfig::resolve(Some("stockmetrics=trace,bogus[".into()), None);
        init_logging(&cfg);
        init_logging(&cfg);
    }
}
