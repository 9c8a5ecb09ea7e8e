//! Node operations for a host workflow: one call per operation, returning
//! either the stored artifact or a structured error.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::backoff::{BackoffPolicy, FailureClass, RetryState};
use crate::cache::{ArtifactCache, LocalRef};
use crate::client::{LumaClient, ServiceError};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::observability::Metrics;
use crate::orchestrator::{Job, Orchestrator};
use crate::publish::MediaPublisher;
use crate::request::{
    GenerationRequest, ImageGeneration, ImageModel, Reframe, VideoGeneration, VideoModel,
    VideoModify,
};
use crate::storage::ObjectBlobStore;

/// Result of a generation node
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutput {
    pub job: Job,
    pub artifact: LocalRef,
}

/// Camera motion phrases accepted inside prompts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CameraMotions(Vec<String>);

impl CameraMotions {
    pub fn new(motions: Vec<String>) -> Self {
        Self(motions)
    }

    /// Exact, case-sensitive lookup
    pub fn contains(&self, motion: &str) -> bool {
        self.0.iter().any(|m| m == motion)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

pub struct Nodes {
    orchestrator: Orchestrator,
    cache: Arc<ArtifactCache>,
    publisher: MediaPublisher,
    await_timeout: Duration,
}

impl Nodes {
    /// Inputs are published through the cache's source and blob store
    pub fn new(orchestrator: Orchestrator, cache: Arc<ArtifactCache>, config: &Config) -> Self {
        let publisher = MediaPublisher::new(cache.source(), cache.blobs(), config)
            .with_metrics(cache.metrics());
        Self {
            orchestrator,
            cache,
            publisher,
            await_timeout: config.polling.longest() + Duration::from_secs(60),
        }
    }

    /// Wire the HTTP client, blob store and shared metrics from configuration.
    ///
    /// Fails with `MissingCredential` when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(LumaClient::new(&config.api)?);
        let blobs = Arc::new(ObjectBlobStore::from_config(&config.storage)?);
        let metrics = Arc::new(Metrics::new());

        let orchestrator = Orchestrator::new(client.clone(), config).with_metrics(metrics.clone());
        let cache = ArtifactCache::new(client, blobs, config).with_metrics(metrics);

        Ok(Self::new(orchestrator, Arc::new(cache), config))
    }

    pub fn with_await_timeout(mut self, timeout: Duration) -> Self {
        self.await_timeout = timeout;
        self
    }

    pub fn with_publisher(mut self, publisher: MediaPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    pub fn publisher(&self) -> &MediaPublisher {
        &self.publisher
    }

    /// Publish local inputs, submit, wait for a terminal state, then fetch
    /// the artifact
    pub async fn run(&self, request: GenerationRequest) -> Result<NodeOutput> {
        let kind = request.kind();
        let request = self.publisher.publish(request).await?;
        let handle = self.orchestrator.submit(request)?;
        let job = self
            .orchestrator
            .await_completion(&handle, self.await_timeout)
            .await?;

        if let Err(err) = job.outcome() {
            warn!(job = %job.handle_id, %kind, error = %err, "Node failed");
            return Err(err);
        }

        let artifact = self.cache.fetch(&job).await?;
        info!(job = %job.handle_id, %kind, location = %artifact.location, "Node completed");
        Ok(NodeOutput { job, artifact })
    }

    pub async fn generate_image(&self, request: ImageGeneration) -> Result<NodeOutput> {
        self.run(GenerationRequest::GenerateImage(request)).await
    }

    pub async fn generate_video(&self, request: VideoGeneration) -> Result<NodeOutput> {
        self.run(GenerationRequest::GenerateVideo(request)).await
    }

    pub async fn reframe_image(&self, request: Reframe<ImageModel>) -> Result<NodeOutput> {
        self.run(GenerationRequest::ReframeImage(request)).await
    }

    pub async fn reframe_video(&self, request: Reframe<VideoModel>) -> Result<NodeOutput> {
        self.run(GenerationRequest::ReframeVideo(request)).await
    }

    pub async fn modify_video(&self, request: VideoModify) -> Result<NodeOutput> {
        self.run(GenerationRequest::ModifyVideo(request)).await
    }

    pub async fn list_concepts(&self) -> Result<Vec<String>> {
        let service = self.orchestrator.service().clone();
        retrying(self.orchestrator.policy(), "list_concepts", || {
            let service = service.clone();
            async move { service.list_concepts().await }
        })
        .await
    }

    pub async fn list_camera_motions(&self) -> Result<CameraMotions> {
        let service = self.orchestrator.service().clone();
        let motions = retrying(self.orchestrator.policy(), "list_camera_motions", || {
            let service = service.clone();
            async move { service.list_camera_motions().await }
        })
        .await?;
        Ok(CameraMotions::new(motions))
    }
}

/// Run a one-shot service call under the transient retry policy
async fn retrying<T, F, Fut>(policy: &BackoffPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, ServiceError>>,
{
    let mut retry = RetryState::default();
    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(err.into()),
        };

        match retry.record_failure(policy, FailureClass::Transient) {
            Some(delay) => {
                warn!(operation, attempt = retry.attempt_count, error = %err, "Transient service error, retrying");
                tokio::time::sleep(delay).await;
            }
            None => {
                return Err(Error::RetryExhausted {
                    attempts: retry.attempt_count,
                    last_error: err.to_string(),
                });
            }
        }
    }
}
