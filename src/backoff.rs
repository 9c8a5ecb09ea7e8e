//! Retry delay policy shared by the poll loop and artifact downloads.
//!
//! Delays grow exponentially from `base_delay` and are capped at `max_delay`.
//! Jitter is derived from a per-job seed instead of a random source, so the
//! same `(seed, attempt)` pair always yields the same delay while concurrent
//! jobs still spread out.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::BackoffConfig;

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Network timeout, 5xx, rate limiting
    Transient,
    /// 4xx validation, malformed request
    Permanent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter: Duration,
    pub max_attempts: u32,
    seed: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            max_attempts: config.max_attempts,
            seed: 0,
        }
    }

    /// Same policy with jitter keyed on `key` (usually the job id)
    pub fn seeded(&self, key: &str) -> Self {
        Self {
            seed: fnv1a(key.as_bytes()),
            ..self.clone()
        }
    }

    pub fn with_max_attempts(&self, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..self.clone()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// Returns `None` for permanent failures: those are terminal and must not
    /// be retried.
    pub fn delay(&self, attempt: u32, class: FailureClass) -> Option<Duration> {
        if class == FailureClass::Permanent {
            return None;
        }

        let base_ms = self.base_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;

        let grown = base_ms as f64 * self.multiplier.powi(attempt.min(64) as i32);
        let exp_ms = grown.min(max_ms as f64) as u64;

        // Jitter never exceeds the growth between two consecutive steps, which
        // keeps the sequence non-decreasing.
        let step_ms = (base_ms as f64 * (self.multiplier - 1.0)).max(0.0) as u64;
        let bound = (self.jitter.as_millis() as u64).min(step_ms);
        let jitter_ms = if bound == 0 {
            0
        } else {
            splitmix64(self.seed ^ u64::from(attempt)) % (bound + 1)
        };

        Some(Duration::from_millis(exp_ms.saturating_add(jitter_ms).min(max_ms)))
    }

    /// True once `attempt_count` retries have used up the budget
    pub fn exhausted(&self, attempt_count: u32) -> bool {
        attempt_count >= self.max_attempts
    }
}

/// Retry bookkeeping for one job while it is being polled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    pub attempt_count: u32,
    pub next_delay: Option<Duration>,
    pub failure_class: Option<FailureClass>,
}

impl RetryState {
    /// Record a transient failure and compute the wait before the next try.
    ///
    /// Returns `None` when the policy's attempt budget is spent.
    pub fn record_failure(&mut self, policy: &BackoffPolicy, class: FailureClass) -> Option<Duration> {
        self.attempt_count += 1;
        self.failure_class = Some(class);
        self.next_delay = if policy.exhausted(self.attempt_count) {
            None
        } else {
            policy.delay(self.attempt_count - 1, class)
        };
        self.next_delay
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
