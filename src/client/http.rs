//! HTTP client for the generation service

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::wire::{self, Created, SubmitBody};
use super::{GenerationService, GenerationStatus, ServiceError};
use crate::cache::ArtifactSource;
use crate::config::{API_KEY_ENV_VAR, ApiConfig};
use crate::error::{Error, Result};
use crate::request::ValidatedRequest;

/// reqwest-backed [`GenerationService`]
#[derive(Clone)]
pub struct LumaClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for LumaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LumaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LumaClient {
    /// Create a client; fails before any network call when no API key is set
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(Error::MissingCredential(API_KEY_ENV_VAR))?
            .to_string();

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| Error::PermanentService(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> std::result::Result<T, ServiceError> {
        let response = request
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify)?;
        let body = checked_body(response).await?;
        serde_json::from_slice(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GenerationService for LumaClient {
    async fn submit(&self, request: &ValidatedRequest) -> std::result::Result<String, ServiceError> {
        let path = wire::submit_path(request.kind());
        debug!(kind = %request.kind(), path, "Submitting generation");

        let body = SubmitBody::from(request);
        let created: Created = self.send(self.client.post(self.url(path)).json(&body)).await?;
        Ok(created.id)
    }

    async fn poll(&self, generation_id: &str) -> std::result::Result<GenerationStatus, ServiceError> {
        self.send(self.client.get(self.url(&wire::status_path(generation_id))))
            .await
    }

    async fn list_concepts(&self) -> std::result::Result<Vec<String>, ServiceError> {
        self.send(self.client.get(self.url(wire::CONCEPTS_PATH))).await
    }

    async fn list_camera_motions(&self) -> std::result::Result<Vec<String>, ServiceError> {
        self.send(self.client.get(self.url(wire::CAMERA_MOTIONS_PATH)))
            .await
    }
}

#[async_trait]
impl ArtifactSource for LumaClient {
    /// Result URLs point at a CDN; the API key is not sent there
    async fn download(&self, url: &str) -> std::result::Result<Bytes, ServiceError> {
        debug!(url, "Starting download");
        let response = self.client.get(url).send().await.map_err(classify)?;
        let bytes = checked_body(response).await?;
        debug!(url, size = bytes.len(), "Download completed");
        Ok(bytes)
    }
}

async fn checked_body(response: Response) -> std::result::Result<Bytes, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let body = if body.is_empty() {
            status.canonical_reason().unwrap_or("Unknown").to_string()
        } else {
            body
        };
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .bytes()
        .await
        .map_err(|e| ServiceError::Request(format!("failed to read body: {e}")))
}

fn classify(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else if e.is_connect() {
        ServiceError::Connect(e.to_string())
    } else if e.is_decode() {
        ServiceError::Decode(e.to_string())
    } else {
        ServiceError::Request(e.to_string())
    }
}
