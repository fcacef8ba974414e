use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerPolicy;
use crate::session::DEFAULT_MAX_SELECTION;

/// Application settings, read from an optional `buskerz.toml` and then from
/// `BUSKERZ_*` environment variables (nested keys use `__`, e.g.
/// `BUSKERZ_LEDGER__SINGLE_UPCOMING=false`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_workbook_path")]
    pub workbook_path: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub ledger: LedgerPolicy,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_max_selection")]
    pub max_selection: usize,
}

fn default_workbook_path() -> String {
    "database/buskerz.bin.gz".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_max_selection() -> usize {
    DEFAULT_MAX_SELECTION
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            max_selection: default_max_selection(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            workbook_path: default_workbook_path(),
            bind_addr: default_bind_addr(),
            ledger: LedgerPolicy::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("buskerz")
    }

    /// `file` is a path without extension; a missing file is not an error.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("BUSKERZ")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workbook_path.trim().is_empty() {
            return Err(ConfigError::Message("workbook_path is required".to_string()));
        }
        if self.performance.max_selection == 0 {
            return Err(ConfigError::Message(
                "performance.max_selection must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
