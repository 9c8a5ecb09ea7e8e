//! The job record and its state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, ErrorKind, JobError, Result};
use crate::request::JobKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Submitted,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::TimedOut | JobState::Cancelled
        )
    }

    /// Legal edges of the lifecycle; terminal states have none
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match self {
            Pending => matches!(next, Submitted | Failed | TimedOut | Cancelled),
            Submitted => matches!(next, Polling | Succeeded | Failed | TimedOut | Cancelled),
            Polling => matches!(next, Polling | Succeeded | Failed | TimedOut | Cancelled),
            Succeeded | Failed | TimedOut | Cancelled => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Submitted => "submitted",
            JobState::Polling => "polling",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One generation request in flight.
///
/// Only the orchestrator mutates a job; callers see snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Local handle, assigned at acceptance
    pub handle_id: Uuid,
    /// Remote generation id, known once submitted
    pub id: Option<String>,
    pub kind: JobKind,
    pub state: JobState,
    /// Polls since the last state change
    pub attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Artifact URL, only when succeeded
    pub result_ref: Option<String>,
    /// Only when failed, timed out or cancelled
    pub last_error: Option<JobError>,
}

impl Job {
    pub(crate) fn new(kind: JobKind, max_duration: Duration) -> Self {
        let created_at = Utc::now();
        let deadline = chrono::Duration::from_std(max_duration)
            .ok()
            .and_then(|d| created_at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            handle_id: Uuid::now_v7(),
            id: None,
            kind,
            state: JobState::Pending,
            attempt_count: 0,
            created_at,
            deadline,
            result_ref: None,
            last_error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Artifact URL of a succeeded job, or the recorded error otherwise
    pub fn outcome(&self) -> Result<&str> {
        match (self.state, self.result_ref.as_deref(), &self.last_error) {
            (JobState::Succeeded, Some(url), _) => Ok(url),
            (_, _, Some(err)) => Err(Error::Job(err.clone())),
            (state, _, None) => Err(Error::Job(JobError::new(
                ErrorKind::Timeout,
                format!("job is still {state}"),
            ))),
        }
    }

    fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        if next != self.state {
            info!(
                job = %self.handle_id,
                generation_id = self.id.as_deref().unwrap_or("-"),
                kind = %self.kind,
                from = %self.state,
                to = %next,
                attempt = self.attempt_count,
                "Job state changed"
            );
        }
        self.state = next;
        true
    }

    pub(crate) fn mark_submitted(&mut self, generation_id: &str) -> bool {
        if !self.transition(JobState::Submitted) {
            return false;
        }
        self.id = Some(generation_id.to_string());
        self.attempt_count = 0;
        true
    }

    /// Record an in-progress poll: the first moves the job into `Polling`
    pub(crate) fn record_in_progress(&mut self) -> bool {
        match self.state {
            JobState::Submitted => {
                let moved = self.transition(JobState::Polling);
                if moved {
                    self.attempt_count = 0;
                }
                moved
            }
            JobState::Polling => {
                self.attempt_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Count a poll or submit that failed in transit; state is unchanged
    pub(crate) fn record_transient(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.attempt_count += 1;
        true
    }

    pub(crate) fn succeed(&mut self, result_ref: &str) -> bool {
        if !self.transition(JobState::Succeeded) {
            return false;
        }
        self.result_ref = Some(result_ref.to_string());
        true
    }

    pub(crate) fn fail(&mut self, err: &Error) -> bool {
        self.finish(JobState::Failed, err)
    }

    pub(crate) fn time_out(&mut self, err: &Error) -> bool {
        self.finish(JobState::TimedOut, err)
    }

    pub(crate) fn cancel(&mut self) -> bool {
        self.finish(JobState::Cancelled, &Error::Cancelled)
    }

    fn finish(&mut self, state: JobState, err: &Error) -> bool {
        if !self.transition(state) {
            return false;
        }
        self.last_error = Some(JobError::from(err));
        true
    }
}
