//! TOML-based configuration for db-enricher.
//!
//! Supports a config file (db-enricher.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connections.warehouse]
//! dialect = "postgres"
//! connection_string = "${WAREHOUSE_URL}"
//! schema = "analytics"
//!
//! [connections.crm]
//! dialect = "sqlserver"
//! connection_string = "sqlserver://crm-db?database=crm&trusted_connection=true"
//!
//! [enrichment]
//! concurrency = 8
//! update_mode = "append"
//! enrichments = ["examples", "null_count"]
//!
//! [retry]
//! max_attempts = 5
//! initial_backoff_ms = 200
//!
//! [genai]
//! api_key = "${GEMINI_API_KEY}"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::connection::{ConnectionTarget, Driver};
use crate::comment::{EnrichmentSet, UpdateMode};
use crate::dialect::DEFAULT_SAMPLE_SIZE;
use crate::retry::RetryOptions;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "DB_ENRICHER_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Unsupported dialect: {0}")]
    UnsupportedDriver(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    pub enrichment: EnrichmentSettings,

    /// Retry policy for catalog and statistics queries.
    pub retry: RetryOptions,

    /// sqlx pool settings (Postgres, MySQL).
    pub pool: PoolSettings,

    /// Worker process settings (SQL Server).
    pub worker: WorkerSettings,

    pub genai: GenAiSettings,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Backend dialect (postgres, mysql, sqlserver).
    pub dialect: String,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,

    /// Schema to enrich for this connection.
    #[serde(default)]
    pub schema: Option<String>,
}

impl ConnectionSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.dialect)
            .map_err(|_| SettingsError::UnsupportedDriver(self.dialect.clone()))
    }

    /// Get the connection string with environment variables expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }

    /// Resolve into a connection target.
    pub fn target(&self) -> Result<ConnectionTarget, SettingsError> {
        Ok(ConnectionTarget {
            driver: self.driver_type()?,
            url: self.resolved_connection_string()?,
            schema: self.schema.clone(),
        })
    }
}

/// Enrichment defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnrichmentSettings {
    /// Maximum number of concurrent table/column tasks.
    pub concurrency: usize,

    pub update_mode: UpdateMode,

    /// Requested enrichments; empty means all.
    pub enrichments: EnrichmentSet,

    /// Example values sampled per column.
    pub sample_size: usize,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            update_mode: UpdateMode::default(),
            enrichments: EnrichmentSet::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of open connections.
    pub max_connections: u32,

    /// Seconds to wait for a free connection.
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_secs: 30,
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to worker binary; searched for when unset.
    pub path: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            path: None,
            timeout_secs: 30,
        }
    }
}

/// Generative AI settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenAiSettings {
    /// API key (supports ${ENV_VAR} expansion).
    pub api_key: Option<String>,

    pub model: String,
}

impl Default for GenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: crate::genai::DEFAULT_MODEL.to_string(),
        }
    }
}

impl GenAiSettings {
    /// The API key with environment variables expanded, `None` when unset
    /// or empty.
    pub fn resolved_api_key(&self) -> Result<Option<String>, SettingsError> {
        match &self.api_key {
            Some(key) => {
                let key = expand_env_vars(key)?;
                Ok(Some(key).filter(|k| !k.trim().is_empty()))
            }
            None => Ok(None),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `DB_ENRICHER_CONFIG`
    /// 2. `./db-enricher.toml`
    /// 3. `~/.config/db-enricher/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("db-enricher.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("db-enricher").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get the default connection ("default" if it exists, otherwise the
    /// only one defined).
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        if let Some(conn) = self.connections.get("default") {
            return Some(("default", conn));
        }
        if self.connections.len() == 1 {
            return self.connections.iter().next().map(|(k, v)| (k.as_str(), v));
        }
        None
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
