//! Job Client: the remote generation service boundary.
//!
//! [`GenerationService`] is the seam the orchestrator drives; [`LumaClient`]
//! is the HTTP implementation. Calls are stateless, all job state lives in the
//! orchestrator's job record.

mod http;
pub mod wire;

pub use http::LumaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backoff::FailureClass;
use crate::request::{MediaFamily, ValidatedRequest};

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("generation {0} completed without an asset")]
    MissingAsset(String),
}

impl ServiceError {
    /// Network trouble, 5xx and rate limiting are worth retrying; everything
    /// else means the request itself is wrong.
    pub fn class(&self) -> FailureClass {
        match self {
            ServiceError::Status { status, .. } => {
                if *status >= 500 || *status == 429 || *status == 408 {
                    FailureClass::Transient
                } else {
                    FailureClass::Permanent
                }
            }
            ServiceError::Timeout | ServiceError::Connect(_) | ServiceError::Request(_) => {
                FailureClass::Transient
            }
            ServiceError::Decode(_) | ServiceError::MissingAsset(_) => FailureClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

/// Remote job status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    Queued,
    Dreaming,
    Completed,
    Failed,
}

impl RemoteState {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, RemoteState::Queued | RemoteState::Dreaming)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    pub image: Option<String>,
    pub video: Option<String>,
}

/// One poll observation of a remote generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub id: String,
    pub state: RemoteState,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub assets: Option<Assets>,
}

impl GenerationStatus {
    pub fn asset_for(&self, family: MediaFamily) -> Option<&str> {
        let assets = self.assets.as_ref()?;
        match family {
            MediaFamily::Image => assets.image.as_deref(),
            MediaFamily::Video => assets.video.as_deref(),
        }
        .filter(|url| !url.is_empty())
    }
}

/// Remote generation service
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit a validated request, returning the remote generation id
    async fn submit(&self, request: &ValidatedRequest) -> Result<String, ServiceError>;

    /// Fetch the current status of a generation
    async fn poll(&self, generation_id: &str) -> Result<GenerationStatus, ServiceError>;

    async fn list_concepts(&self) -> Result<Vec<String>, ServiceError>;

    async fn list_camera_motions(&self) -> Result<Vec<String>, ServiceError>;
}
