use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LUMAFLOW_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/lumaflow.toml";
const ENV_PREFIX: &str = "LUMAFLOW";
const ENV_SEPARATOR: &str = "__";

/// Environment variable holding the service API key
pub const API_KEY_ENV_VAR: &str = "LUMAAI_API_KEY";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets come from the environment only
pub(super) fn load_secrets(config: &mut Config) {
    config.api.api_key = env::var(API_KEY_ENV_VAR)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());
}

/// Load configuration from a specific path and environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // LUMAFLOW__BACKOFF__BASE_DELAY_MS -> backoff.base_delay_ms
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.backoff.base_delay_ms, 2000);
        assert_eq!(config.fetch.max_attempts, 3);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[api]
base_url = "http://127.0.0.1:9100/v1"
request_timeout_secs = 5

[backoff]
base_delay_ms = 500
multiplier = 1.5
max_delay_ms = 4000
jitter_ms = 100
max_attempts = 4

[polling.video]
max_attempts = 60
max_duration_secs = 900

[limits]
image_max_bytes = "8MB"

[storage]
provider = "local"
root = "/var/lib/lumaflow"
prefix = "renders"
            "#,
        )
        .unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:9100/v1");
        assert_eq!(config.api.request_timeout_secs, 5);
        assert_eq!(config.backoff.multiplier, 1.5);
        assert_eq!(config.backoff.max_attempts, 4);
        assert_eq!(config.polling.video.max_attempts, 60);
        assert_eq!(config.polling.image.max_attempts, 120);
        assert_eq!(config.limits.image_max_bytes.as_u64(), 8 * 1024 * 1024);
        assert_eq!(config.limits.video_max_bytes.as_u64(), 100 * 1024 * 1024);
        assert_eq!(config.storage.provider, StorageProvider::Local);
        assert_eq!(config.storage.prefix, "renders");
    }
}
