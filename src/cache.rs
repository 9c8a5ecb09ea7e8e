//! Artifact Cache: turns a succeeded job's result URL into a stored, local
//! reference, downloading each generation's artifact at most once.
//!
//! Concurrent `fetch` calls for the same generation share one in-flight
//! future. Successful results stay in the map so later calls return the same
//! [`LocalRef`]; a failed fetch is evicted so a later call may try again.
//!
//! The map holds one small entry per fetched generation for the life of the
//! cache. Long-running owners call [`ArtifactCache::forget`] once they are
//! done with a generation; a later `fetch` then resolves from the blob store
//! without downloading again.

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffPolicy, RetryState};
use crate::client::ServiceError;
use crate::config::Config;
use crate::observability::Metrics;
use crate::orchestrator::{Job, JobState};
use crate::request::{JobKind, MediaFamily};
use crate::storage::{BlobStore, StorageError, StoredObject};

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("job {0} has no artifact to fetch (state: {1})")]
    NotSucceeded(uuid::Uuid, JobState),

    #[error("artifact fetch failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("artifact fetch failed: {0}")]
    Rejected(String),

    #[error("failed to store artifact: {0}")]
    Storage(String),
}

impl From<StorageError> for FetchError {
    fn from(err: StorageError) -> Self {
        FetchError::Storage(err.to_string())
    }
}

/// Downloads a remote artifact
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn download(&self, url: &str) -> Result<Bytes, ServiceError>;
}

/// Stable local handle to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRef {
    pub generation_id: String,
    pub key: String,
    pub location: String,
    pub size: u64,
    pub content_type: String,
}

impl LocalRef {
    fn new(generation_id: &str, family: MediaFamily, stored: StoredObject) -> Self {
        Self {
            generation_id: generation_id.to_string(),
            key: stored.key,
            location: stored.location,
            size: stored.size,
            content_type: content_type(family).to_string(),
        }
    }

    pub fn mime(&self) -> Option<mime::Mime> {
        self.content_type.parse().ok()
    }
}

fn content_type(family: MediaFamily) -> &'static str {
    match family {
        MediaFamily::Image => "image/jpeg",
        MediaFamily::Video => "video/mp4",
    }
}

fn extension(family: MediaFamily) -> &'static str {
    match family {
        MediaFamily::Image => "jpg",
        MediaFamily::Video => "mp4",
    }
}

/// Storage key for a generation's artifact
pub fn artifact_key(prefix: &str, kind: JobKind, generation_id: &str) -> String {
    prefixed_key(
        prefix,
        &format!("{kind}/{generation_id}.{}", extension(kind.family())),
    )
}

pub(crate) fn prefixed_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

type FetchFuture = Shared<BoxFuture<'static, Result<LocalRef, FetchError>>>;

pub struct ArtifactCache {
    source: Arc<dyn ArtifactSource>,
    blobs: Arc<dyn BlobStore>,
    policy: BackoffPolicy,
    prefix: String,
    metrics: Arc<Metrics>,
    /// Keyed by generation id; succeeded entries stay until `forget`
    inflight: Mutex<HashMap<String, FetchFuture>>,
}

impl ArtifactCache {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        blobs: Arc<dyn BlobStore>,
        config: &Config,
    ) -> Self {
        Self {
            source,
            blobs,
            policy: BackoffPolicy::from_config(&config.backoff)
                .with_max_attempts(config.fetch.max_attempts),
            prefix: config.storage.prefix.clone(),
            metrics: Arc::new(Metrics::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Local reference for a succeeded job's artifact.
    ///
    /// The first call downloads and stores; concurrent and later calls for
    /// the same generation receive the same result.
    pub async fn fetch(&self, job: &Job) -> Result<LocalRef, FetchError> {
        let (generation_id, url) = match (job.state, job.id.as_deref(), job.result_ref.as_deref()) {
            (JobState::Succeeded, Some(id), Some(url)) => (id.to_string(), url.to_string()),
            _ => return Err(FetchError::NotSucceeded(job.handle_id, job.state)),
        };

        let future = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            match inflight.get(&generation_id) {
                Some(existing) => {
                    self.metrics.artifact_cache_hit();
                    debug!(generation_id, "Joining existing artifact fetch");
                    existing.clone()
                }
                None => {
                    let future = self.start(job.kind, &generation_id, url);
                    inflight.insert(generation_id.clone(), future.clone());
                    future
                }
            }
        };

        let result = future.clone().await;
        if result.is_err() {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if inflight
                .get(&generation_id)
                .is_some_and(|current| current.ptr_eq(&future))
            {
                inflight.remove(&generation_id);
            }
        }
        result
    }

    /// Read back the bytes behind a local reference
    pub async fn read(&self, local: &LocalRef) -> Result<Bytes, StorageError> {
        self.blobs.retrieve(&local.location).await
    }

    /// Drop the remembered fetch for a generation.
    ///
    /// The stored artifact is kept, so a later `fetch` finds it in the blob
    /// store. Returns whether an entry was held.
    pub fn forget(&self, generation_id: &str) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(generation_id)
            .is_some()
    }

    /// Number of generations currently remembered
    pub fn tracked(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn source(&self) -> Arc<dyn ArtifactSource> {
        self.source.clone()
    }

    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    fn start(&self, kind: JobKind, generation_id: &str, url: String) -> FetchFuture {
        let source = self.source.clone();
        let blobs = self.blobs.clone();
        let metrics = self.metrics.clone();
        let policy = self.policy.seeded(generation_id);
        let key = artifact_key(&self.prefix, kind, generation_id);
        let generation_id = generation_id.to_string();

        async move {
            let family = kind.family();
            if let Some(stored) = blobs.head(&key).await? {
                debug!(generation_id, key, "Artifact already stored");
                return Ok(LocalRef::new(&generation_id, family, stored));
            }

            let bytes = download(source.as_ref(), &url, &policy).await?;
            metrics.artifact_downloaded();

            let stored = blobs.store(&key, bytes).await?;
            info!(generation_id, key, size = stored.size, "Artifact stored");
            Ok(LocalRef::new(&generation_id, family, stored))
        }
        .boxed()
        .shared()
    }
}

pub(crate) async fn download(
    source: &dyn ArtifactSource,
    url: &str,
    policy: &BackoffPolicy,
) -> Result<Bytes, FetchError> {
    let mut retry = RetryState::default();

    loop {
        let err = match source.download(url).await {
            Ok(bytes) => return Ok(bytes),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(FetchError::Rejected(err.to_string())),
        };

        match retry.record_failure(policy, err.class()) {
            Some(delay) => {
                warn!(
                    url,
                    attempt = retry.attempt_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Artifact download failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                warn!(url, attempts = retry.attempt_count, error = %err, "Artifact download failed after retries");
                return Err(FetchError::Exhausted {
                    attempts: retry.attempt_count,
                    last_error: err.to_string(),
                });
            }
        }
    }
}
