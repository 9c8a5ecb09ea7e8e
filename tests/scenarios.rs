//! Lifecycle scenarios against a scripted in-process generation service
//!
//! All tests run on tokio's paused clock, so backoff delays elapse instantly
//! while still being observable through `Instant` timestamps.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use lumaflow::cache::{ArtifactCache, ArtifactSource, FetchError};
use lumaflow::client::{Assets, GenerationService, GenerationStatus, RemoteState, ServiceError};
use lumaflow::config::Config;
use lumaflow::error::ErrorKind;
use lumaflow::nodes::Nodes;
use lumaflow::orchestrator::{JobState, Orchestrator};
use lumaflow::placement::PlacementOverrides;
use lumaflow::request::{
    AspectRatio, GenerationRequest, ImageGeneration, ImageModel, MediaRef, Reframe,
    ValidatedRequest, VideoGeneration, VideoModel, VideoModify,
};
use lumaflow::storage::{BlobStore, ObjectBlobStore, StoredObject};

const WAIT: Duration = Duration::from_secs(24 * 3600);

fn status(state: RemoteState) -> Result<GenerationStatus, ServiceError> {
    Ok(GenerationStatus {
        id: "gen-1".into(),
        state,
        failure_reason: None,
        assets: None,
    })
}

fn completed_image(url: &str) -> Result<GenerationStatus, ServiceError> {
    Ok(GenerationStatus {
        id: "gen-1".into(),
        state: RemoteState::Completed,
        failure_reason: None,
        assets: Some(Assets {
            image: Some(url.into()),
            video: None,
        }),
    })
}

fn completed_video(url: &str) -> Result<GenerationStatus, ServiceError> {
    Ok(GenerationStatus {
        id: "gen-1".into(),
        state: RemoteState::Completed,
        failure_reason: None,
        assets: Some(Assets {
            image: None,
            video: Some(url.into()),
        }),
    })
}

fn http_error(status: u16) -> ServiceError {
    ServiceError::Status {
        status,
        body: "scripted".into(),
    }
}

/// Plays back scripted submit/poll responses; once a script runs out, submits
/// succeed and polls report `dreaming`.
#[derive(Default)]
struct ScriptedService {
    submits: Mutex<VecDeque<Result<String, ServiceError>>>,
    polls: Mutex<VecDeque<Result<GenerationStatus, ServiceError>>>,
    submit_calls: AtomicU32,
    poll_times: Mutex<Vec<Instant>>,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    last_request: Mutex<Option<ValidatedRequest>>,
}

impl ScriptedService {
    fn with_polls(polls: Vec<Result<GenerationStatus, ServiceError>>) -> Arc<Self> {
        Arc::new(Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        })
    }

    fn poll_count(&self) -> usize {
        self.poll_times.lock().unwrap().len()
    }

    /// Number of non-zero waits between consecutive polls
    fn delays(&self) -> usize {
        let times = self.poll_times.lock().unwrap();
        times.windows(2).filter(|w| w[1] > w[0]).count()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn submit(&self, request: &ValidatedRequest) -> Result<String, ServiceError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        let next = self.submits.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("gen-1".into()))
    }

    async fn poll(&self, _generation_id: &str) -> Result<GenerationStatus, ServiceError> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        self.poll_times.lock().unwrap().push(Instant::now());

        tokio::time::sleep(Duration::from_millis(5)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        next.unwrap_or_else(|| status(RemoteState::Dreaming))
    }

    async fn list_concepts(&self) -> Result<Vec<String>, ServiceError> {
        Ok(vec!["dolly_zoom".into()])
    }

    async fn list_camera_motions(&self) -> Result<Vec<String>, ServiceError> {
        Ok(vec!["camera orbit left".into()])
    }
}

/// Serves artifact bytes, failing transiently a configured number of times
#[derive(Default)]
struct CountingSource {
    downloads: AtomicU32,
    failures_left: AtomicU32,
}

#[async_trait]
impl ArtifactSource for CountingSource {
    async fn download(&self, url: &str) -> Result<Bytes, ServiceError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(http_error(502));
        }
        Ok(Bytes::from(format!("artifact from {url}")))
    }
}

/// Blob store that counts writes
struct CountingBlobs {
    inner: ObjectBlobStore,
    stores: AtomicU32,
}

impl CountingBlobs {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: ObjectBlobStore::in_memory(),
            stores: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl BlobStore for CountingBlobs {
    async fn store(&self, key: &str, data: Bytes) -> lumaflow::storage::Result<StoredObject> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.inner.store(key, data).await
    }

    async fn retrieve(&self, location: &str) -> lumaflow::storage::Result<Bytes> {
        self.inner.retrieve(location).await
    }

    async fn head(&self, key: &str) -> lumaflow::storage::Result<Option<StoredObject>> {
        self.inner.head(key).await
    }
}

fn image_request() -> GenerationRequest {
    GenerationRequest::GenerateImage(
        ImageGeneration::builder()
            .prompt("a lighthouse at dusk")
            .model(ImageModel::Photon1)
            .aspect_ratio(AspectRatio::Landscape16x9)
            .build(),
    )
}

#[tokio::test(start_paused = true)]
async fn queued_twice_then_completed_applies_two_delays() {
    let service = ScriptedService::with_polls(vec![
        status(RemoteState::Queued),
        status(RemoteState::Queued),
        completed_image("https://cdn.example.com/out.jpg"),
    ]);
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.id.as_deref(), Some("gen-1"));
    assert_eq!(job.result_ref.as_deref(), Some("https://cdn.example.com/out.jpg"));
    assert!(job.last_error.is_none());
    assert_eq!(service.poll_count(), 3);
    assert_eq!(service.delays(), 2);
}

#[tokio::test(start_paused = true)]
async fn video_reframe_resolves_centered_placement() {
    let service = ScriptedService::with_polls(vec![completed_video("https://cdn.example.com/out.mp4")]);
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let request = Reframe::builder()
        .media(MediaRef::new("https://cdn.example.com/in.mp4"))
        .model(VideoModel::Ray2)
        .aspect_ratio(AspectRatio::Portrait9x16)
        .source_width(1920)
        .source_height(1080)
        .build();
    let handle = orchestrator
        .submit(GenerationRequest::ReframeVideo(request))
        .unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();
    assert_eq!(job.state, JobState::Succeeded);

    let submitted = service.last_request.lock().unwrap().clone().unwrap();
    let placement = submitted.placement.unwrap();
    assert_eq!(placement.canvas.width, 1080);
    assert_eq!(placement.canvas.height, 1920);
    // 16:9 source scaled to the canvas width keeps its aspect ratio
    assert_eq!((placement.resized_width, placement.resized_height), (1080, 608));
    assert_eq!((placement.grid_position_x, placement.grid_position_y), (0, 656));
    assert_eq!(placement.crop_bounds.x_start, 0);
    assert_eq!(placement.crop_bounds.x_end, 1080);
    assert_eq!(placement.crop_bounds.y_start, 0);
    assert_eq!(placement.crop_bounds.y_end, 608);
}

#[tokio::test(start_paused = true)]
async fn inverted_crop_fails_before_any_network_call() {
    let service = Arc::new(ScriptedService::default());
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let request = Reframe::builder()
        .media(MediaRef::new("https://cdn.example.com/in.jpg"))
        .model(ImageModel::Photon1)
        .aspect_ratio(AspectRatio::Square)
        .source_width(1024)
        .source_height(768)
        .overrides(PlacementOverrides::builder().x_start(500).x_end(100).build())
        .build();
    let err = orchestrator
        .submit(GenerationRequest::ReframeImage(request))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Placement);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.submit_calls.load(Ordering::SeqCst), 0);
    assert_eq!(service.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_then_success_record_attempts() {
    let mut polls: Vec<_> = (0..5).map(|_| Err(http_error(503))).collect();
    polls.push(completed_image("https://cdn.example.com/out.jpg"));
    let service = ScriptedService::with_polls(polls);

    let mut config = Config::default();
    config.backoff.max_attempts = 10;
    let orchestrator = Orchestrator::new(service.clone(), &config);

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.attempt_count, 5);
    assert_eq!(service.poll_count(), 6);
    assert_eq!(orchestrator.metrics().snapshot().transient_errors, 5);
}

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_exhaust_retries() {
    let polls = (0..10).map(|_| Err(http_error(500))).collect();
    let service = ScriptedService::with_polls(polls);

    let mut config = Config::default();
    config.backoff.max_attempts = 3;
    let orchestrator = Orchestrator::new(service.clone(), &config);

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error.as_ref().unwrap().kind, ErrorKind::RetryExhausted);
    assert!(job.result_ref.is_none());
    assert_eq!(service.poll_count(), 3);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(service.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_submit_failure_never_polls() {
    let service = Arc::new(ScriptedService::default());
    service.submits.lock().unwrap().push_back(Err(http_error(400)));
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error.unwrap().kind, ErrorKind::PermanentService);
    assert!(job.id.is_none());
    assert_eq!(service.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.poll_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_submit_failure_is_retried() {
    let service = ScriptedService::with_polls(vec![completed_image("https://cdn.example.com/out.jpg")]);
    {
        let mut submits = service.submits.lock().unwrap();
        submits.push_back(Err(http_error(429)));
        submits.push_back(Err(ServiceError::Timeout));
    }
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(service.submit_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn permanent_poll_failure_stops_immediately() {
    let service = ScriptedService::with_polls(vec![Err(http_error(404))]);
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error.unwrap().kind, ErrorKind::PermanentService);
    assert_eq!(service.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn remote_failure_carries_reason() {
    let service = ScriptedService::with_polls(vec![
        status(RemoteState::Dreaming),
        Ok(GenerationStatus {
            id: "gen-1".into(),
            state: RemoteState::Failed,
            failure_reason: Some("prompt rejected by moderation".into()),
            assets: None,
        }),
    ]);
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Failed);
    let err = job.last_error.unwrap();
    assert_eq!(err.kind, ErrorKind::GenerationFailed);
    assert!(err.message.contains("prompt rejected by moderation"));
}

#[tokio::test(start_paused = true)]
async fn completed_without_asset_is_a_permanent_failure() {
    let service = ScriptedService::with_polls(vec![status(RemoteState::Completed)]);
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.last_error.unwrap().kind, ErrorKind::PermanentService);
}

#[tokio::test(start_paused = true)]
async fn polls_for_a_job_never_overlap() {
    let service = ScriptedService::with_polls(
        (0..20)
            .map(|_| status(RemoteState::Dreaming))
            .chain([completed_image("https://cdn.example.com/out.jpg")])
            .collect(),
    );
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    // several concurrent waiters on the same job
    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            let handle = handle.clone();
            tokio::spawn(async move { orchestrator.await_completion(&handle, WAIT).await })
        })
        .collect();

    for waiter in waiters {
        let job = waiter.await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Succeeded);
    }
    assert_eq!(service.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(service.poll_count(), 21);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_poll_discards_response() {
    let service = ScriptedService::with_polls(vec![completed_image("https://cdn.example.com/out.jpg")]);
    let orchestrator = Orchestrator::new(service.clone(), &Config::default());

    let handle = orchestrator.submit(image_request()).unwrap();
    // let the driver reach its first (5 ms) poll call, then cancel mid-flight
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(service.poll_count(), 1);
    assert!(handle.cancel());

    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.job().state, JobState::Cancelled);
    assert!(handle.job().result_ref.is_none());
}

#[tokio::test(start_paused = true)]
async fn fetch_is_idempotent_and_coalesced() {
    let service = ScriptedService::with_polls(vec![completed_image("https://cdn.example.com/out.jpg")]);
    let config = Config::default();
    let orchestrator = Orchestrator::new(service, &config);
    let source = Arc::new(CountingSource::default());
    let blobs = CountingBlobs::new();
    let cache = Arc::new(ArtifactCache::new(source.clone(), blobs.clone(), &config));

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    let concurrent: Vec<_> = (0..5)
        .map(|_| {
            let cache = cache.clone();
            let job = job.clone();
            tokio::spawn(async move { cache.fetch(&job).await })
        })
        .collect();
    let mut refs = Vec::new();
    for task in concurrent {
        refs.push(task.await.unwrap().unwrap());
    }
    let again = cache.fetch(&job).await.unwrap();

    assert!(refs.iter().all(|r| *r == again));
    assert_eq!(again.key, "lumaflow/generate-image/gen-1.jpg");
    assert_eq!(again.content_type, "image/jpeg");
    assert_eq!(source.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(blobs.stores.load(Ordering::SeqCst), 1);

    let bytes = cache.read(&again).await.unwrap();
    assert_eq!(bytes.as_ref(), b"artifact from https://cdn.example.com/out.jpg");
}

#[tokio::test(start_paused = true)]
async fn forgotten_fetch_resolves_from_storage() {
    let service = ScriptedService::with_polls(vec![completed_image("https://cdn.example.com/out.jpg")]);
    let config = Config::default();
    let orchestrator = Orchestrator::new(service, &config);
    let source = Arc::new(CountingSource::default());
    let blobs = CountingBlobs::new();
    let cache = ArtifactCache::new(source.clone(), blobs.clone(), &config);

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    let first = cache.fetch(&job).await.unwrap();
    assert_eq!(cache.tracked(), 1);
    assert!(cache.forget("gen-1"));
    assert!(!cache.forget("gen-1"));
    assert_eq!(cache.tracked(), 0);

    let second = cache.fetch(&job).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(source.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(blobs.stores.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_retries_then_reports_failure() {
    let service = ScriptedService::with_polls(vec![completed_image("https://cdn.example.com/out.jpg")]);
    let config = Config::default();
    let orchestrator = Orchestrator::new(service, &config);

    let source = Arc::new(CountingSource {
        failures_left: AtomicU32::new(3),
        ..CountingSource::default()
    });
    let blobs = CountingBlobs::new();
    let cache = ArtifactCache::new(source.clone(), blobs.clone(), &config);

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    // default fetch budget is three downloads
    let err = cache.fetch(&job).await.unwrap_err();
    assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
    assert_eq!(source.downloads.load(Ordering::SeqCst), 3);
    assert_eq!(blobs.stores.load(Ordering::SeqCst), 0);

    // a failed fetch is not cached; the next call downloads again
    let local = cache.fetch(&job).await.unwrap();
    assert_eq!(source.downloads.load(Ordering::SeqCst), 4);
    assert_eq!(local.size as usize, "artifact from https://cdn.example.com/out.jpg".len());
}

#[tokio::test(start_paused = true)]
async fn fetch_requires_succeeded_job() {
    let service = ScriptedService::with_polls(vec![Err(http_error(400))]);
    let config = Config::default();
    let orchestrator = Orchestrator::new(service, &config);
    let source = Arc::new(CountingSource::default());
    let cache = ArtifactCache::new(source.clone(), CountingBlobs::new(), &config);

    let handle = orchestrator.submit(image_request()).unwrap();
    let job = orchestrator.await_completion(&handle, WAIT).await.unwrap();

    assert!(matches!(
        cache.fetch(&job).await,
        Err(FetchError::NotSucceeded(_, JobState::Failed))
    ));
    assert_eq!(source.downloads.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn node_runs_submit_await_and_fetch() {
    let service = ScriptedService::with_polls(vec![
        status(RemoteState::Queued),
        status(RemoteState::Dreaming),
        completed_video("https://cdn.example.com/out.mp4"),
    ]);
    let config = Config::default();
    let orchestrator = Orchestrator::new(service.clone(), &config);
    let cache = ArtifactCache::new(Arc::new(CountingSource::default()), CountingBlobs::new(), &config);
    let nodes = Nodes::new(orchestrator, Arc::new(cache), &config);

    let output = nodes
        .generate_video(VideoGeneration::builder().prompt("waves at night").build())
        .await
        .unwrap();
    assert_eq!(output.job.state, JobState::Succeeded);
    assert_eq!(output.artifact.key, "lumaflow/generate-video/gen-1.mp4");
    assert_eq!(output.artifact.content_type, "video/mp4");

    let concepts = nodes.list_concepts().await.unwrap();
    assert_eq!(concepts, vec!["dolly_zoom".to_string()]);
    let motions = nodes.list_camera_motions().await.unwrap();
    assert!(motions.contains("camera orbit left"));
}

#[tokio::test(start_paused = true)]
async fn node_surfaces_job_failure_kind() {
    let service = ScriptedService::with_polls(vec![Ok(GenerationStatus {
        id: "gen-1".into(),
        state: RemoteState::Failed,
        failure_reason: Some("unsafe content".into()),
        assets: None,
    })]);
    let config = Config::default();
    let orchestrator = Orchestrator::new(service, &config);
    let cache = ArtifactCache::new(Arc::new(CountingSource::default()), CountingBlobs::new(), &config);
    let nodes = Nodes::new(orchestrator, Arc::new(cache), &config);

    let err = nodes
        .generate_image(ImageGeneration::builder().prompt("anything").build())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GenerationFailed);
}

fn local_inputs_modify() -> VideoModify {
    VideoModify::builder()
        .media(MediaRef::bytes(Bytes::from_static(b"raw mp4"), "video/mp4"))
        .prompt("make it snow")
        .first_frame("http://localhost:8188/view?filename=frame.png")
        .build()
}

#[tokio::test(start_paused = true)]
async fn node_publishes_local_inputs_before_submit() {
    let service = ScriptedService::with_polls(vec![completed_video("https://cdn.example.com/out.mp4")]);
    let mut config = Config::default();
    config.storage.public_base_url = Some("https://media.example.com".into());
    let orchestrator = Orchestrator::new(service.clone(), &config);
    let source = Arc::new(CountingSource::default());
    let blobs = CountingBlobs::new();
    let cache = ArtifactCache::new(source.clone(), blobs.clone(), &config);
    let nodes = Nodes::new(orchestrator, Arc::new(cache), &config);

    let output = nodes.modify_video(local_inputs_modify()).await.unwrap();
    assert_eq!(output.artifact.key, "lumaflow/modify-video/gen-1.mp4");

    let submitted = service.last_request.lock().unwrap().clone().unwrap();
    let GenerationRequest::ModifyVideo(modify) = submitted.request else {
        panic!("submitted a different kind");
    };
    let media = modify.media.source.as_url().unwrap();
    let frame = modify.first_frame.as_ref().and_then(|f| f.as_url()).unwrap();
    for url in [media, frame] {
        assert!(url.starts_with("https://media.example.com/lumaflow/inputs/"), "{url}");
    }
    assert!(media.ends_with(".mp4"));

    // one download re-hosts the frame, one fetches the artifact
    assert_eq!(source.downloads.load(Ordering::SeqCst), 2);
    assert_eq!(blobs.stores.load(Ordering::SeqCst), 3);
    assert_eq!(nodes.orchestrator().metrics().snapshot().jobs_succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn node_without_public_base_rejects_local_inputs() {
    let service = ScriptedService::with_polls(vec![]);
    let config = Config::default();
    let orchestrator = Orchestrator::new(service.clone(), &config);
    let source = Arc::new(CountingSource::default());
    let cache = ArtifactCache::new(source.clone(), CountingBlobs::new(), &config);
    let nodes = Nodes::new(orchestrator, Arc::new(cache), &config);

    let err = nodes.modify_video(local_inputs_modify()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.submit_calls.load(Ordering::SeqCst), 0);
    assert_eq!(source.downloads.load(Ordering::SeqCst), 0);
}
