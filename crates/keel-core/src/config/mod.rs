mod database;
mod migration;

pub use database::DatabaseConfig;
pub use migration::MigrationConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{KeelError, Result};

/// Root configuration, usually read from `keel.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeelConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Migration options.
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl KeelConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| KeelError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;

        toml::from_str(&content)
            .map_err(|e| KeelError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Configuration with defaults and the given database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            migration: MigrationConfig::default(),
        }
    }
}

/// Replace `${VAR}` with the value of the environment variable. Unset variables are left as is.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| KeelError::Config(e.to_string()))?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    Ok(result)
}
