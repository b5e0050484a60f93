// Daemon configuration: defaults, optional TOML file, GARAGE_* environment

use config::{Config, Environment, File};
use garage_core::application::tick_loop::constants::{DEFAULT_SLOT_COUNT, DEFAULT_TICK_INTERVAL};
use garage_core::error::{AppError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "~/.garage/garage.db";
pub const DEFAULT_CONFIG_FILE: &str = "garage.toml";
const ENV_PREFIX: &str = "GARAGE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Development: pretty formatting with colors
    Pretty,
    /// Production: JSON structured logging
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DaemonConfig {
    /// SQLite file, `~` expanded; `:memory:` for a throwaway database
    pub db_path: String,
    pub slot_count: u32,
    pub tick_interval_ms: u64,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    /// Load from `GARAGE_CONFIG` (or `garage.toml`) and the process environment
    pub fn load() -> Result<Self> {
        let file = std::env::var("GARAGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_sources(Some(&file), None)
    }

    /// Layered load: defaults, then the optional file, then environment
    ///
    /// `env` replaces the process environment when given.
    pub fn from_sources(file: Option<&str>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)
            .and_then(|b| b.set_default("slot_count", DEFAULT_SLOT_COUNT as i64))
            .and_then(|b| {
                b.set_default("tick_interval_ms", DEFAULT_TICK_INTERVAL.as_millis() as i64)
            })
            .and_then(|b| b.set_default("log_format", "pretty"))
            .map_err(config_error)?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(env);

        let mut cfg: DaemonConfig = builder
            .add_source(environment)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        cfg.db_path = shellexpand::tilde(&cfg.db_path).into_owned();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 {
            return Err(AppError::Config("slot_count must be at least 1".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.db_path.trim().is_empty() {
            return Err(AppError::Config("db_path cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// sqlx connection URL for `db_path`
    pub fn database_url(&self) -> String {
        if self.db_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", self.db_path)
        }
    }
}

fn config_error(err: config::ConfigError) -> AppError {
    AppError::Config(err.to_string())
}
