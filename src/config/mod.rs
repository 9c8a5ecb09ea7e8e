//! Configuration management for lumaflow
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `.env` file
//! 4. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use lumaflow::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Service: {}", config.api.base_url);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `LUMAFLOW__<section>__<key>`:
//! - `LUMAFLOW__API__BASE_URL=http://localhost:9000/v1`
//! - `LUMAFLOW__BACKOFF__MAX_ATTEMPTS=5`
//! - `LUMAFLOW__LIMITS__VIDEO_MAX_BYTES=50MB`
//!
//! The API key is read from `LUMAAI_API_KEY` only; it is never accepted from
//! the TOML file.
//!
//! # Configuration File
//!
//! Loaded from `config/lumaflow.toml` unless `LUMAFLOW_CONFIG` points elsewhere.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    ApiConfig, BackoffConfig, Config, FetchConfig, LimitsConfig, PollProfile, PollingConfig,
    StorageConfig, StorageProvider,
};
pub use sources::API_KEY_ENV_VAR;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, without reading secrets
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Attach the API key from `LUMAAI_API_KEY`, if set
    pub fn with_env_api_key(mut self) -> Self {
        let _ = dotenvy::dotenv();
        sources::load_secrets(&mut self);
        self
    }

    /// Attach the API key explicitly (tests, embedding hosts)
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api.api_key = Some(key.into());
        self
    }
}
