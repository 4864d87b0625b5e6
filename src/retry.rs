use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::{Error, ErrorCode};
use crate::request::Method;
use crate::transport::TransportErrorKind;

pub(crate) const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryState {
    Attempting,
    Waiting,
    Succeeded,
    Exhausted,
    Aborted,
}

impl RetryState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted | Self::Aborted)
    }
}

/// Outcome of one failed attempt, handed to a [`RetryClassifier`].
#[derive(Clone, Debug)]
pub struct RetryDecision {
    pub attempt: usize,
    pub max_attempts: usize,
    pub method: Method,
    pub url: String,
    pub error_code: ErrorCode,
    pub transport_error_kind: Option<TransportErrorKind>,
    pub transient: bool,
}

impl RetryDecision {
    pub(crate) fn for_error(
        attempt: usize,
        max_attempts: usize,
        method: Method,
        url: &str,
        error: &Error,
    ) -> Self {
        let transport_error_kind = match error {
            Error::Transport { source, .. } => Some(source.kind()),
            _ => None,
        };
        Self {
            attempt,
            max_attempts,
            method,
            url: url.to_owned(),
            error_code: error.code(),
            transport_error_kind,
            transient: error.is_transient(),
        }
    }
}

/// Replaces the default transient/non-transient classification.
pub trait RetryClassifier: Send + Sync {
    fn should_retry(&self, decision: &RetryDecision) -> bool;
}

#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_backoff: Duration,
    max_backoff: Duration,
    jitter_ratio: f64,
    retry_classifier: Option<Arc<dyn RetryClassifier>>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_backoff", &self.base_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("jitter_ratio", &self.jitter_ratio)
            .field("retry_classifier", &self.retry_classifier.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Three attempts, 1s base backoff doubling per retry, no jitter.
    pub fn standard() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter_ratio: 0.0,
            retry_classifier: None,
        }
    }

    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff.max(Duration::from_millis(1));
        if self.max_backoff < self.base_backoff {
            self.max_backoff = self.base_backoff;
        }
        self
    }

    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff.max(self.base_backoff);
        self
    }

    /// Adds up to `jitter_ratio * base_backoff` on top of each delay.
    ///
    /// The added amount stays below one base interval, so delays keep growing
    /// across retries until `max_backoff` caps them.
    pub fn jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio.clamp(0.0, 1.0);
        self
    }

    pub fn retry_classifier(mut self, retry_classifier: Arc<dyn RetryClassifier>) -> Self {
        self.retry_classifier = Some(retry_classifier);
        self
    }

    pub(crate) fn configured_max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub(crate) fn should_retry_decision(&self, decision: &RetryDecision) -> bool {
        match &self.retry_classifier {
            Some(retry_classifier) => retry_classifier.should_retry(decision),
            None => decision.transient,
        }
    }

    /// Delay before retry `retry_index` (1-indexed): `base * 2^(retry_index - 1)`.
    pub(crate) fn backoff_for_retry(&self, retry_index: usize) -> Duration {
        let capped_exponent = retry_index.saturating_sub(1).min(31) as u32;
        let multiplier = 1_u128 << capped_exponent;
        let base_ms = self.base_backoff.as_millis().max(1);
        let max_ms = self.max_backoff.as_millis().max(base_ms);
        let delay_ms = base_ms
            .saturating_mul(multiplier)
            .saturating_add(self.sample_jitter_ms(base_ms))
            .min(max_ms)
            .min(u64::MAX as u128) as u64;
        Duration::from_millis(delay_ms)
    }

    fn sample_jitter_ms(&self, base_ms: u128) -> u128 {
        if self.jitter_ratio <= f64::EPSILON {
            return 0;
        }
        let span = ((base_ms as f64) * self.jitter_ratio).floor() as u64;
        if span == 0 {
            return 0;
        }
        let mut rng = rand::rng();
        u128::from(rng.random_range(0..span))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Retry bookkeeping for a single execution.
pub(crate) struct RetryTracker<'a> {
    policy: &'a RetryPolicy,
    enabled: bool,
    attempt: usize,
    max_attempts: usize,
    state: RetryState,
    total_wait: Duration,
}

impl<'a> RetryTracker<'a> {
    pub(crate) fn new(policy: &'a RetryPolicy, enabled: bool) -> Self {
        let max_attempts = if enabled {
            policy.configured_max_attempts()
        } else {
            1
        };
        Self {
            policy,
            enabled,
            attempt: 1,
            max_attempts,
            state: RetryState::Attempting,
            total_wait: Duration::ZERO,
        }
    }

    pub(crate) fn attempt(&self) -> usize {
        self.attempt
    }

    pub(crate) fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub(crate) fn state(&self) -> RetryState {
        self.state
    }

    pub(crate) fn total_wait(&self) -> Duration {
        self.total_wait
    }

    pub(crate) fn record_success(&mut self) {
        self.state = RetryState::Succeeded;
    }

    pub(crate) fn record_failure(&mut self, decision: &RetryDecision) -> RetryState {
        self.state = if !self.enabled || !self.policy.should_retry_decision(decision) {
            RetryState::Aborted
        } else if self.attempt < self.max_attempts {
            RetryState::Waiting
        } else {
            RetryState::Exhausted
        };
        self.state
    }

    /// Moves from `Waiting` back to `Attempting`, returning the delay to wait first.
    pub(crate) fn schedule_next_attempt(&mut self) -> Duration {
        let delay = self.policy.backoff_for_retry(self.attempt);
        self.total_wait = self.total_wait.saturating_add(delay);
        self.attempt += 1;
        self.state = RetryState::Attempting;
        delay
    }
}
