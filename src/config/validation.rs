use super::models::{Config, PollProfile, StorageProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("api.base_url must be an http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("{field} must be positive")]
    NotPositive { field: String },

    #[error("backoff.multiplier must be >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("backoff.max_delay_ms ({max}) is below backoff.base_delay_ms ({base})")]
    DelayCeilingBelowBase { base: u64, max: u64 },

    #[error("storage provider is local but storage.root is not set")]
    MissingStorageRoot,

    #[error("storage.public_base_url must be an http(s) URL, got '{0}'")]
    InvalidPublicBaseUrl(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_api(config)?;
    validate_backoff(config)?;
    validate_profile("polling.image", &config.polling.image)?;
    validate_profile("polling.video", &config.polling.video)?;
    validate_profile("polling.generate_video", &config.polling.generate_video)?;
    validate_limits(config)?;
    validate_storage(config)?;
    Ok(())
}

fn positive(field: &str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::NotPositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn validate_api(config: &Config) -> Result<(), ValidationError> {
    let url = &config.api.base_url;
    if !is_http_url(url) {
        return Err(ValidationError::InvalidBaseUrl(url.clone()));
    }
    positive("api.connect_timeout_secs", config.api.connect_timeout_secs)?;
    positive("api.request_timeout_secs", config.api.request_timeout_secs)
}

fn validate_backoff(config: &Config) -> Result<(), ValidationError> {
    let backoff = &config.backoff;

    if backoff.multiplier.is_nan() || backoff.multiplier < 1.0 {
        return Err(ValidationError::InvalidMultiplier(backoff.multiplier));
    }
    positive("backoff.base_delay_ms", backoff.base_delay_ms)?;
    positive("backoff.max_attempts", u64::from(backoff.max_attempts))?;
    positive("fetch.max_attempts", u64::from(config.fetch.max_attempts))?;

    if backoff.max_delay_ms < backoff.base_delay_ms {
        return Err(ValidationError::DelayCeilingBelowBase {
            base: backoff.base_delay_ms,
            max: backoff.max_delay_ms,
        });
    }

    Ok(())
}

fn validate_profile(name: &str, profile: &PollProfile) -> Result<(), ValidationError> {
    positive(&format!("{name}.max_attempts"), u64::from(profile.max_attempts))?;
    positive(&format!("{name}.max_duration_secs"), profile.max_duration_secs)
}

fn validate_limits(config: &Config) -> Result<(), ValidationError> {
    positive("limits.image_max_bytes", config.limits.image_max_bytes.as_u64())?;
    positive("limits.video_max_bytes", config.limits.video_max_bytes.as_u64())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::Local && config.storage.root.is_none() {
        return Err(ValidationError::MissingStorageRoot);
    }
    if let Some(url) = &config.storage.public_base_url {
        if !is_http_url(url) {
            return Err(ValidationError::InvalidPublicBaseUrl(url.clone()));
        }
    }
    Ok(())
}
