//! In-process counters for jobs, polls, artifact fetches and published inputs

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_submitted: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_timed_out: AtomicU64,
    jobs_cancelled: AtomicU64,
    polls: AtomicU64,
    transient_errors: AtomicU64,
    artifact_downloads: AtomicU64,
    artifact_cache_hits: AtomicU64,
    inputs_published: AtomicU64,
}

macro_rules! counter {
    ($method:ident, $field:ident) => {
        pub fn $method(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(counter = stringify!($field), "Metric incremented");
        }
    };
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(job_submitted, jobs_submitted);
    counter!(job_succeeded, jobs_succeeded);
    counter!(job_failed, jobs_failed);
    counter!(job_timed_out, jobs_timed_out);
    counter!(job_cancelled, jobs_cancelled);
    counter!(poll_sent, polls);
    counter!(transient_error, transient_errors);
    counter!(artifact_downloaded, artifact_downloads);
    counter!(artifact_cache_hit, artifact_cache_hits);
    counter!(input_published, inputs_published);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_timed_out: self.jobs_timed_out.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
            artifact_downloads: self.artifact_downloads.load(Ordering::Relaxed),
            artifact_cache_hits: self.artifact_cache_hits.load(Ordering::Relaxed),
            inputs_published: self.inputs_published.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_submitted: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_timed_out: u64,
    pub jobs_cancelled: u64,
    pub polls: u64,
    pub transient_errors: u64,
    pub artifact_downloads: u64,
    pub artifact_cache_hits: u64,
    pub inputs_published: u64,
}
