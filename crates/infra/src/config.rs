//! Runtime settings for the automation engine.
//!
//! Sources, later overriding earlier:
//! 1. `partsupply.yaml` in the working directory (optional)
//! 2. the file passed to [`AutomationConfig::load`] (required when given)
//! 3. `PARTSUPPLY__*` environment variables, e.g. `PARTSUPPLY__PRICING__SKIP_UNCHANGED=false`

use anyhow::Context;
use serde::{Deserialize, Serialize};

use partsupply_observability::LoggingConfig;

pub const CONFIG_ENV_PREFIX: &str = "PARTSUPPLY";
const DEFAULT_CONFIG_FILE: &str = "partsupply";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Push derived prices to the catalog. When off, sweeps only compute.
    pub write_back_enabled: bool,
    /// Skip the catalog write when the derived price equals the listed one.
    pub skip_unchanged: bool,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            write_back_enabled: true,
            skip_unchanged: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// Run the reorder trigger for items created at or below their reorder point.
    pub check_on_create: bool,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self { check_on_create: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Extra attempts for a command that lost an optimistic concurrency race.
    pub concurrency_retries: u32,
    pub pricing: PricingConfig,
    pub reorder: ReorderConfig,
    pub logging: LoggingConfig,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            concurrency_retries: 3,
            pricing: PricingConfig::default(),
            reorder: ReorderConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AutomationConfig {
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder =
            Config::builder().add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read automation configuration")?;

        settings
            .try_deserialize()
            .context("invalid automation configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AutomationConfig::default();
        assert_eq!(config.concurrency_retries, 3);
        assert!(config.pricing.write_back_enabled);
        assert!(config.pricing.skip_unchanged);
        assert!(config.reorder.check_on_create);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn file_values_override_defaults() {
        let path = std::env::temp_dir().join(format!("partsupply-{}.yaml", uuid::Uuid::now_v7()));
        std::fs::write(
            &path,
            "concurrency_retries: 7\npricing:\n  skip_unchanged: false\nlogging:\n  json: false\n",
        )
        .unwrap();

        let config = AutomationConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.concurrency_retries, 7);
        assert!(!config.pricing.skip_unchanged);
        assert!(config.pricing.write_back_enabled);
        assert!(!config.logging.json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = AutomationConfig::load(Some("/nonexistent/partsupply-config.yaml")).unwrap_err();
        assert!(err.to_string().contains("automation configuration"));
    }
}
