//! Logging setup shared by every binary and test harness that embeds the
//! supplier automation engine.

use serde::{Deserialize, Serialize};

/// Tracing subscriber initialisation.
pub mod tracing;

/// Log output settings.
///
/// `RUST_LOG`, when set, takes precedence over `filter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: true,
        }
    }
}

/// Initialize process-wide logging.
///
/// Safe to call multiple times; only the first call installs a subscriber.
pub fn init(config: &LoggingConfig) {
    tracing::init(config);
}
