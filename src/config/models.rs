use crate::humanize::ByteSize;
use crate::request::{JobKind, MediaFamily};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote generation service connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bearer token (loaded from environment, never from the config file)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            api_key: None,
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://api.lumalabs.ai/dream-machine/v1".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    concat!("lumaflow/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Exponential backoff tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackoffConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Consecutive transient failures tolerated before `RetryExhausted`
    #[serde(default = "default_backoff_max_attempts")]
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_attempts: default_backoff_max_attempts(),
        }
    }
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_backoff_max_attempts() -> u32 {
    8
}

/// Poll budget for one family of job kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PollProfile {
    pub max_attempts: u32,
    pub max_duration_secs: u64,
}

impl PollProfile {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

/// Poll budgets per media family.
///
/// Text-to-video generation runs longer than reframe and modify, so it has
/// its own budget; every other kind uses its family's.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_image_profile")]
    pub image: PollProfile,
    #[serde(default = "default_video_profile")]
    pub video: PollProfile,
    #[serde(default = "default_generate_video_profile")]
    pub generate_video: PollProfile,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            image: default_image_profile(),
            video: default_video_profile(),
            generate_video: default_generate_video_profile(),
        }
    }
}

impl PollingConfig {
    pub fn profile(&self, kind: JobKind) -> &PollProfile {
        match (kind, kind.family()) {
            (JobKind::GenerateVideo, _) => &self.generate_video,
            (_, MediaFamily::Image) => &self.image,
            (_, MediaFamily::Video) => &self.video,
        }
    }

    /// Longest wall-clock budget across all kinds
    pub fn longest(&self) -> Duration {
        [self.image, self.video, self.generate_video]
            .iter()
            .map(PollProfile::max_duration)
            .max()
            .unwrap_or_default()
    }
}

fn default_image_profile() -> PollProfile {
    PollProfile {
        max_attempts: 120,
        max_duration_secs: 10 * 60,
    }
}

fn default_video_profile() -> PollProfile {
    PollProfile {
        max_attempts: 180,
        max_duration_secs: 30 * 60,
    }
}

fn default_generate_video_profile() -> PollProfile {
    PollProfile {
        max_attempts: 200,
        max_duration_secs: 30 * 60,
    }
}

/// Input media size ceilings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_image_max_bytes")]
    pub image_max_bytes: ByteSize,
    #[serde(default = "default_video_max_bytes")]
    pub video_max_bytes: ByteSize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            image_max_bytes: default_image_max_bytes(),
            video_max_bytes: default_video_max_bytes(),
        }
    }
}

fn default_image_max_bytes() -> ByteSize {
    ByteSize::mib(10)
}

fn default_video_max_bytes() -> ByteSize {
    ByteSize::mib(100)
}

/// Artifact download retries
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_max_attempts")]
    pub max_attempts: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_fetch_max_attempts(),
        }
    }
}

fn default_fetch_max_attempts() -> u32 {
    3
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Memory,
    Local,
}

/// Where fetched artifacts and published inputs are persisted
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory for the `local` provider
    pub root: Option<PathBuf>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Public URL the storage root is served under; stored keys are appended.
    /// Without it, in-memory and loopback inputs cannot be published.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Memory,
            root: None,
            prefix: default_prefix(),
            public_base_url: None,
        }
    }
}

fn default_prefix() -> String {
    "lumaflow".to_string()
}
