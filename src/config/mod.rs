//! Configuration module for db-enricher.
//!
//! Handles connection configuration, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, ConnectionTarget, Driver};
pub use settings::{
    expand_env_vars, ConnectionSettings, EnrichmentSettings, GenAiSettings, PoolSettings, Settings,
    SettingsError, WorkerSettings, CONFIG_ENV_VAR,
};
