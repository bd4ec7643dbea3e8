//! Retry predicates

use crate::fetch::{FailureCause, FetchTarget};

/// Decides whether a failed attempt is re-enqueued
///
/// `attempt` counts the attempts made so far, starting at 1. Every retry goes
/// back through admission control like a fresh request.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, target: &FetchTarget, cause: &FailureCause, attempt: u32) -> bool;
}

/// Retries timed-out attempts until `max_attempts` have been made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimeouts {
    pub max_attempts: u32,
}

impl RetryTimeouts {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for RetryTimeouts {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl RetryPolicy for RetryTimeouts {
    fn should_retry(&self, _target: &FetchTarget, cause: &FailureCause, attempt: u32) -> bool {
        matches!(cause, FailureCause::Timeout) && attempt < self.max_attempts
    }
}

/// Never retries
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _target: &FetchTarget, _cause: &FailureCause, _attempt: u32) -> bool {
        false
    }
}
