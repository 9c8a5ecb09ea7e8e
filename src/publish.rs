//! Input publishing: the service fetches every input by URL, so in-memory
//! media and URLs that only resolve on this machine are copied into blob
//! storage and replaced with their public URL before submission.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backoff::BackoffPolicy;
use crate::cache::{self, ArtifactSource};
use crate::config::Config;
use crate::error::Result;
use crate::observability::Metrics;
use crate::request::{GenerationRequest, MediaSource, RequestError};
use crate::storage::BlobStore;

pub struct MediaPublisher {
    source: Arc<dyn ArtifactSource>,
    blobs: Arc<dyn BlobStore>,
    policy: BackoffPolicy,
    prefix: String,
    public_base_url: Option<String>,
    metrics: Arc<Metrics>,
}

impl MediaPublisher {
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
            public_base_url: config
                .storage
                .public_base_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string()),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    /// Replace every unreachable input of `request` with a published URL.
    ///
    /// Public URLs pass through untouched. Without a public base URL any
    /// input that needs publishing is rejected as a validation error.
    pub async fn publish(&self, mut request: GenerationRequest) -> Result<GenerationRequest> {
        for (field, slot) in request.sources_mut() {
            if !slot.needs_publishing() {
                continue;
            }
            let url = self.publish_one(field, slot).await?;
            *slot = MediaSource::Url(url);
        }
        Ok(request)
    }

    async fn publish_one(&self, field: &'static str, media: &MediaSource) -> Result<String> {
        let Some(base) = &self.public_base_url else {
            return Err(RequestError::UnpublishedMedia {
                field,
                media: media.clone(),
            }
            .into());
        };

        let (data, ext): (Bytes, String) = match media {
            MediaSource::Bytes { data, content_type } => {
                (data.clone(), extension_for_type(content_type))
            }
            MediaSource::Url(url) => {
                debug!(field, url = %url, "Re-hosting local input");
                let data = cache::download(self.source.as_ref(), url, &self.policy.seeded(url)).await?;
                (data, extension_for_url(url))
            }
        };

        let key = cache::prefixed_key(&self.prefix, &format!("inputs/{}.{ext}", Uuid::now_v7()));
        let stored = self.blobs.store(&key, data).await?;
        self.metrics.input_published();

        let url = format!("{base}/{}", stored.key);
        info!(field, key = %stored.key, size = stored.size, url = %url, "Input published");
        Ok(url)
    }
}

fn extension_for_type(content_type: &str) -> String {
    let Ok(parsed) = content_type.parse::<mime::Mime>() else {
        return "bin".to_string();
    };
    match parsed.subtype().as_str() {
        "jpeg" => "jpg".to_string(),
        "quicktime" => "mov".to_string(),
        sub if !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()) => sub.to_string(),
        _ => "bin".to_string(),
    }
}

fn extension_for_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let name = parsed.path_segments()?.last()?.to_string();
            let (_, ext) = name.rsplit_once('.')?;
            let valid = !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| "bin".to_string())
}
