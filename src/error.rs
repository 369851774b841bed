use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(
        "invalid idle configuration: warning delay {warning_delay:?}, logout delay {logout_delay:?} ({reason})"
    )]
    InvalidConfiguration {
        warning_delay: Duration,
        logout_delay: Duration,
        reason: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}
