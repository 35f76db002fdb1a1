use tracing_subscriber::EnvFilter;

use crate::LoggingConfig;

fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a global fmt subscriber. Returns `false` if one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        let config = LoggingConfig {
            filter: "debug".to_string(),
            json: false,
        };
        init(&config);
        assert!(!init(&config));
    }

    #[test]
    fn invalid_filter_falls_back() {
        let config = LoggingConfig {
            filter: "not a [valid filter".to_string(),
            json: true,
        };
        let _ = filter(&config);
    }
}
