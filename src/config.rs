//! Emulator configuration
//!
//! Settings come from `emudb.toml` in the working directory when present,
//! otherwise defaults apply.
//!
//! ## Environment Variables
//!
//! - `EMUDB_DATABASE` - Database name
//! - `EMUDB_HOST` - Sandbox listen host
//! - `EMUDB_PORT` - Sandbox listen port
//! - `EMUDB_MAX_ITEM_COUNT` - Default query page size
//!
//! These can also be set in a `.env` file next to the config file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::storage::DEFAULT_MAX_ITEM_COUNT;

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "emudb.toml";

pub const ENV_DATABASE: &str = "EMUDB_DATABASE";
pub const ENV_HOST: &str = "EMUDB_HOST";
pub const ENV_PORT: &str = "EMUDB_PORT";
pub const ENV_MAX_ITEM_COUNT: &str = "EMUDB_MAX_ITEM_COUNT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Page size used when a query does not set one.
    #[serde(default = "default_max_item_count")]
    pub max_item_count: usize,
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database() -> String {
    "emulator".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_max_item_count() -> usize {
    DEFAULT_MAX_ITEM_COUNT
}

fn default_log_filter() -> String {
    "emudb=info,tower_http=info".to_string()
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            host: default_host(),
            port: default_port(),
            max_item_count: default_max_item_count(),
            log_filter: default_log_filter(),
        }
    }
}

impl EmulatorConfig {
    /// Load configuration from a directory
    ///
    /// Loads `.env` from the directory if present, reads `emudb.toml` if
    /// present, then applies environment variable overrides.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let env_path = dir.join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides from `lookup`. Empty or unparsable values are
    /// ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database = database;
        }

        if let Some(host) = lookup(ENV_HOST).filter(|v| !v.is_empty()) {
            self.host = host;
        }

        if let Some(port) = lookup(ENV_PORT).and_then(|v| v.parse::<u16>().ok()) {
            self.port = port;
        }

        if let Some(count) = lookup(ENV_MAX_ITEM_COUNT)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            self.max_item_count = count;
        }
    }

    /// Save configuration to a directory
    pub fn save(&self, dir: &Path) -> anyhow::Result<()> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
