//! Job Orchestrator: drives each job from submission to a terminal state.
//!
//! Every accepted request gets one driver task. The driver is the only thing
//! that talks to the service for its job, so polls for a job are strictly
//! sequential and never overlap. State is published through a `watch`
//! channel; callers hold a [`JobHandle`] to observe, await or cancel.
//!
//! Cancellation is cooperative. `cancel` marks the job `Cancelled` at once and
//! trips a token; the driver notices at its next suspension point and drops
//! whatever the in-flight call returns.

mod job;

pub use job::{Job, JobState};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backoff::{BackoffPolicy, FailureClass, RetryState};
use crate::client::{GenerationService, RemoteState, ServiceError};
use crate::config::{Config, LimitsConfig, PollProfile, PollingConfig};
use crate::error::{Error, Result};
use crate::observability::Metrics;
use crate::request::{GenerationRequest, JobKind, ValidatedRequest};

/// Shared cell behind a job: its published state plus the cancel switch
struct JobCell {
    state: watch::Sender<Job>,
    cancel: CancellationToken,
}

impl JobCell {
    /// Apply `f` and notify watchers only if it changed something
    fn update(&self, f: impl FnOnce(&mut Job) -> bool) -> bool {
        self.state.send_if_modified(f)
    }

    fn snapshot(&self) -> Job {
        self.state.borrow().clone()
    }
}

/// Caller's handle on an accepted job
#[derive(Clone)]
pub struct JobHandle {
    id: Uuid,
    cell: Arc<JobCell>,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle").field("id", &self.id).finish()
    }
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current snapshot of the job
    pub fn job(&self) -> Job {
        self.cell.snapshot()
    }

    pub fn state(&self) -> JobState {
        self.cell.state.borrow().state
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<Job> {
        self.cell.state.subscribe()
    }

    /// Stop tracking the job. Returns false if it had already finished.
    pub fn cancel(&self) -> bool {
        let cancelled = self.cell.update(Job::cancel);
        self.cell.cancel.cancel();
        cancelled
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    service: Arc<dyn GenerationService>,
    policy: BackoffPolicy,
    polling: PollingConfig,
    limits: LimitsConfig,
    metrics: Arc<Metrics>,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn GenerationService>, config: &Config) -> Self {
        Self {
            service,
            policy: BackoffPolicy::from_config(&config.backoff),
            polling: config.polling.clone(),
            limits: config.limits.clone(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn service(&self) -> &Arc<dyn GenerationService> {
        &self.service
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Poll budget applied to jobs of `kind`
    pub fn profile(&self, kind: JobKind) -> &PollProfile {
        self.polling.profile(kind)
    }

    /// Validate and accept a request, then drive it in the background.
    ///
    /// Validation and placement errors are returned here, before anything is
    /// sent. Must be called from within a tokio runtime.
    pub fn submit(&self, request: GenerationRequest) -> Result<JobHandle> {
        let validated = ValidatedRequest::prepare(request, &self.limits)?;
        let profile = *self.profile(validated.kind());

        let job = Job::new(validated.kind(), profile.max_duration());
        let id = job.handle_id;
        let (state, _) = watch::channel(job);
        let cell = Arc::new(JobCell {
            state,
            cancel: CancellationToken::new(),
        });

        let now = Instant::now();
        let deadline = now
            .checked_add(profile.max_duration())
            .unwrap_or_else(|| now + Duration::from_secs(30 * 24 * 3600));

        let driver = Driver {
            id,
            cell: cell.clone(),
            service: self.service.clone(),
            policy: self.policy.seeded(&id.to_string()),
            profile,
            deadline,
            metrics: self.metrics.clone(),
            request: validated,
        };

        self.metrics.job_submitted();
        debug!(job = %id, kind = %driver.request.kind(), "Job accepted");
        tokio::spawn(driver.run());

        Ok(JobHandle { id, cell })
    }

    /// Wait until the job is terminal or `timeout` elapses.
    ///
    /// A caller timeout does not touch the job; it keeps running under its
    /// own deadline.
    pub async fn await_completion(&self, handle: &JobHandle, timeout: Duration) -> Result<Job> {
        let mut rx = handle.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|job| job.is_terminal())).await {
            Ok(Ok(job)) => Ok(job.clone()),
            // the sender lives as long as the handle, so this is unreachable in practice
            Ok(Err(_)) => Ok(handle.job()),
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    pub fn cancel(&self, handle: &JobHandle) -> bool {
        handle.cancel()
    }
}

/// Background task owning one job's network conversation
struct Driver {
    id: Uuid,
    cell: Arc<JobCell>,
    service: Arc<dyn GenerationService>,
    request: ValidatedRequest,
    policy: BackoffPolicy,
    profile: PollProfile,
    deadline: Instant,
    metrics: Arc<Metrics>,
}

impl Driver {
    async fn run(self) {
        if let Some(generation_id) = self.submit().await {
            self.poll(&generation_id).await;
        }

        let job = self.cell.snapshot();
        match job.state {
            JobState::Succeeded => self.metrics.job_succeeded(),
            JobState::Failed => self.metrics.job_failed(),
            JobState::TimedOut => self.metrics.job_timed_out(),
            JobState::Cancelled => self.metrics.job_cancelled(),
            _ => {}
        }
    }

    /// True once the job must not be advanced any further
    fn stopped(&self) -> bool {
        if self.cell.cancel.is_cancelled() {
            self.cell.update(Job::cancel);
            return true;
        }
        self.cell.state.borrow().is_terminal()
    }

    fn attempts(&self) -> u32 {
        self.cell.state.borrow().attempt_count
    }

    fn fail(&self, err: Error) {
        warn!(job = %self.id, error = %err, "Job failed");
        self.cell.update(|job| job.fail(&err));
    }

    fn time_out(&self) {
        let elapsed = self.profile.max_duration();
        self.cell.update(|job| job.time_out(&Error::Timeout(elapsed)));
    }

    /// Sleep for `delay` but never past the deadline; false if cancelled
    async fn pause(&self, delay: Duration) -> bool {
        let wake = Instant::now()
            .checked_add(delay)
            .map_or(self.deadline, |at| at.min(self.deadline));
        tokio::select! {
            _ = self.cell.cancel.cancelled() => {
                self.cell.update(Job::cancel);
                false
            }
            _ = tokio::time::sleep_until(wake) => true,
        }
    }

    /// Book a transient failure; returns the retry delay or `None` when the
    /// retry budget is spent (the job is failed in that case).
    fn transient(&self, retry: &mut RetryState, err: &ServiceError) -> Option<Duration> {
        self.metrics.transient_error();
        self.cell.update(Job::record_transient);

        let delay = retry.record_failure(&self.policy, FailureClass::Transient);
        match delay {
            Some(delay) => {
                warn!(
                    job = %self.id,
                    attempt = retry.attempt_count,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient service error, retrying"
                );
            }
            None => self.fail(Error::RetryExhausted {
                attempts: retry.attempt_count,
                last_error: err.to_string(),
            }),
        }
        delay
    }

    async fn submit(&self) -> Option<String> {
        let mut retry = RetryState::default();

        loop {
            if self.stopped() {
                return None;
            }
            if Instant::now() >= self.deadline {
                self.time_out();
                return None;
            }

            let outcome = self.service.submit(&self.request).await;
            if self.stopped() {
                return None;
            }

            match outcome {
                Ok(generation_id) => {
                    return self
                        .cell
                        .update(|job| job.mark_submitted(&generation_id))
                        .then_some(generation_id);
                }
                Err(err) if err.is_transient() => {
                    let delay = self.transient(&mut retry, &err)?;
                    if !self.pause(delay).await {
                        return None;
                    }
                }
                Err(err) => {
                    self.fail(err.into());
                    return None;
                }
            }
        }
    }

    async fn poll(&self, generation_id: &str) {
        let family = self.request.kind().family();
        let mut retry = RetryState::default();

        loop {
            if self.stopped() {
                return;
            }
            if Instant::now() >= self.deadline {
                self.time_out();
                return;
            }

            self.metrics.poll_sent();
            let outcome = self.service.poll(generation_id).await;
            // a cancel that landed while the call was in flight wins
            if self.stopped() {
                return;
            }

            let delay = match outcome {
                Ok(status) => {
                    retry = RetryState::default();
                    debug!(job = %self.id, generation_id, state = ?status.state, "Polled generation");

                    match status.state {
                        RemoteState::Completed => {
                            match status.asset_for(family) {
                                Some(url) => {
                                    self.cell.update(|job| job.succeed(url));
                                }
                                None => {
                                    self.fail(ServiceError::MissingAsset(generation_id.to_string()).into());
                                }
                            }
                            return;
                        }
                        RemoteState::Failed => {
                            let reason = status
                                .failure_reason
                                .unwrap_or_else(|| "no reason given".to_string());
                            self.fail(Error::GenerationFailed(reason));
                            return;
                        }
                        RemoteState::Queued | RemoteState::Dreaming => {
                            self.cell.update(Job::record_in_progress);
                            self.policy
                                .delay(self.attempts(), FailureClass::Transient)
                                .unwrap_or(self.policy.base_delay)
                        }
                    }
                }
                Err(err) if err.is_transient() => match self.transient(&mut retry, &err) {
                    Some(delay) => delay,
                    None => return,
                },
                Err(err) => {
                    self.fail(err.into());
                    return;
                }
            };

            if self.attempts() >= self.profile.max_attempts {
                self.time_out();
                return;
            }
            if !self.pause(delay).await {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GenerationStatus;
    use crate::error::ErrorKind;
    use crate::request::{ImageGeneration, VideoGeneration};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Accepts everything and never finishes
    #[derive(Default)]
    struct Forever {
        polls: AtomicU32,
    }

    #[async_trait]
    impl GenerationService for Forever {
        async fn submit(&self, _: &ValidatedRequest) -> std::result::Result<String, ServiceError> {
            Ok("g-forever".into())
        }

        async fn poll(&self, id: &str) -> std::result::Result<GenerationStatus, ServiceError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerationStatus {
                id: id.to_string(),
                state: RemoteState::Dreaming,
                failure_reason: None,
                assets: None,
            })
        }

        async fn list_concepts(&self) -> std::result::Result<Vec<String>, ServiceError> {
            Ok(vec![])
        }

        async fn list_camera_motions(&self) -> std::result::Result<Vec<String>, ServiceError> {
            Ok(vec![])
        }
    }

    fn image_request() -> GenerationRequest {
        GenerationRequest::GenerateImage(ImageGeneration::builder().prompt("a fox").build())
    }

    #[tokio::test(start_paused = true)]
    async fn never_finishing_job_times_out_not_fails() {
        let service = Arc::new(Forever::default());
        let mut config = Config::default();
        config.polling.image.max_attempts = 1000;
        config.polling.image.max_duration_secs = 60;
        let orchestrator = Orchestrator::new(service.clone(), &config);

        let handle = orchestrator.submit(image_request()).unwrap();
        let job = orchestrator
            .await_completion(&handle, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(job.state, JobState::TimedOut);
        assert_eq!(job.last_error.unwrap().kind, ErrorKind::Timeout);
        assert!(job.result_ref.is_none());
        assert!(service.polls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_budget_times_out() {
        let service = Arc::new(Forever::default());
        let mut config = Config::default();
        config.polling.image.max_attempts = 4;
        let orchestrator = Orchestrator::new(service.clone(), &config);

        let handle = orchestrator.submit(image_request()).unwrap();
        let job = orchestrator
            .await_completion(&handle, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(job.state, JobState::TimedOut);
        assert_eq!(job.attempt_count, 4);
        // first poll moves to Polling, four more exhaust the budget
        assert_eq!(service.polls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn text_to_video_uses_its_own_budget() {
        let service = Arc::new(Forever::default());
        let mut config = Config::default();
        config.polling.video.max_attempts = 1000;
        config.polling.generate_video.max_attempts = 3;
        let orchestrator = Orchestrator::new(service.clone(), &config);
        assert_eq!(orchestrator.profile(JobKind::GenerateVideo).max_attempts, 3);
        assert_eq!(orchestrator.profile(JobKind::ModifyVideo).max_attempts, 1000);

        let request =
            GenerationRequest::GenerateVideo(VideoGeneration::builder().prompt("waves").build());
        let handle = orchestrator.submit(request).unwrap();
        let job = orchestrator
            .await_completion(&handle, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(job.state, JobState::TimedOut);
        assert_eq!(job.attempt_count, 3);
        assert_eq!(service.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_delay_sleeps_until_deadline() {
        let service = Arc::new(Forever::default());
        let mut config = Config::default();
        config.backoff.base_delay_ms = u64::MAX;
        config.backoff.max_delay_ms = u64::MAX;
        config.backoff.jitter_ms = 0;
        config.polling.image.max_duration_secs = 60;
        let orchestrator = Orchestrator::new(service.clone(), &config);

        let handle = orchestrator.submit(image_request()).unwrap();
        let job = orchestrator
            .await_completion(&handle, Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(job.state, JobState::TimedOut);
        assert_eq!(service.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_timeout_leaves_job_running() {
        let service = Arc::new(Forever::default());
        let orchestrator = Orchestrator::new(service, &Config::default());

        let handle = orchestrator.submit(image_request()).unwrap();
        let err = orchestrator
            .await_completion(&handle, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(!handle.job().is_terminal());
        assert_eq!(handle.job().kind, JobKind::GenerateImage);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling() {
        let service = Arc::new(Forever::default());
        let orchestrator = Orchestrator::new(service.clone(), &Config::default());

        let handle = orchestrator.submit(image_request()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(orchestrator.cancel(&handle));
        assert!(!handle.cancel());
        let job = orchestrator
            .await_completion(&handle, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Cancelled);

        let polls = service.polls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(service.polls.load(Ordering::SeqCst), polls);
        assert_eq!(orchestrator.metrics().snapshot().jobs_cancelled, 1);
    }

    #[tokio::test]
    async fn invalid_request_rejected_synchronously() {
        let service = Arc::new(Forever::default());
        let orchestrator = Orchestrator::new(service.clone(), &Config::default());

        let request =
            GenerationRequest::GenerateImage(ImageGeneration::builder().prompt(" ").build());
        let err = orchestrator.submit(request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(service.polls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.metrics().snapshot().jobs_submitted, 0);
    }
}
