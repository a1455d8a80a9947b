//! Retry and failure-propagation policies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default deadline for a single oracle call
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;

/// Retry policy for oracle calls
///
/// Timeouts and other transient oracle errors share `transient_retries`.
/// Invalid replies have their own budget. Permanent errors are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline for one oracle call
    pub call_timeout: Duration,
    /// Extra attempts after a timeout or transient failure
    pub transient_retries: u32,
    /// Extra attempts after a reply that fails validation
    pub invalid_output_retries: u32,
    /// Pause before each retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            transient_retries: 2,
            invalid_output_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            transient_retries: 0,
            invalid_output_retries: 0,
            ..Self::default()
        }
    }

    /// Set the per-call deadline
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the transient retry budget
    #[must_use]
    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    /// Set the invalid-output retry budget
    #[must_use]
    pub fn with_invalid_output_retries(mut self, retries: u32) -> Self {
        self.invalid_output_retries = retries;
        self
    }

    /// Set the pause between attempts
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Upper bound on attempts for one call
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        1u32.saturating_add(self.transient_retries)
            .saturating_add(self.invalid_output_retries)
    }
}

/// What to do when the aggregate node cannot run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialPolicy {
    /// Fail the evaluation, naming the incomplete groups
    #[default]
    Fail,
    /// Aggregate whatever was recorded
    Tolerate,
}

/// What a Stage-2 failure does to its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingFailurePolicy {
    /// Resolve the sibling as skipped; verification sees the others
    #[default]
    Skip,
    /// Fail the sibling and cancel the group's verification
    CancelGroup,
}
