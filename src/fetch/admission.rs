//! Admission control for in-flight requests
//!
//! This module handles:
//! - A FIFO-fair concurrency limit (tokio's semaphore queues waiters in arrival order)
//! - Counting timeouts and shrinking the limit once they pile up
//! - Retiring permits that were already handed out when the limit shrinks

use std::sync::{Arc, Mutex};
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
struct ThrottleState {
    limit: usize,
    timeouts: usize,
    /// Permits to forget on release instead of returning
    debt: usize,
}

/// Shared concurrency limiter
#[derive(Debug)]
pub struct Admission {
    semaphore: Arc<Semaphore>,
    state: Mutex<ThrottleState>,
    throttle_threshold: usize,
    throttle_divisor: usize,
}

/// Proof of admission; releasing it lets the next waiter in
#[derive(Debug)]
pub struct AdmissionPermit {
    permit: Option<OwnedSemaphorePermit>,
    admission: Arc<Admission>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            if self.admission.take_debt() {
                permit.forget();
            }
        }
    }
}

impl Admission {
    /// Creates a limiter
    ///
    /// # Arguments
    ///
    /// * `limit` - Initial number of concurrent requests, at least 1
    /// * `throttle_threshold` - Timeouts that trigger a limit reduction; 0 disables throttling
    /// * `throttle_divisor` - The limit shrinks by `limit / divisor`
    pub fn new(limit: usize, throttle_threshold: usize, throttle_divisor: usize) -> Arc<Self> {
        let limit = limit.max(1);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            state: Mutex::new(ThrottleState {
                limit,
                timeouts: 0,
                debt: 0,
            }),
            throttle_threshold,
            throttle_divisor: throttle_divisor.max(2),
        })
    }

    /// Waits for a free slot in arrival order
    pub async fn acquire(self: &Arc<Self>) -> Result<AdmissionPermit, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        Ok(AdmissionPermit {
            permit: Some(permit),
            admission: Arc::clone(self),
        })
    }

    /// Current concurrency limit
    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    /// Number of requests that could start right now without waiting
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Records a timed-out attempt, shrinking the limit once the threshold is reached
    pub fn record_timeout(&self) {
        if self.throttle_threshold == 0 {
            return;
        }

        let mut state = self.lock();
        state.timeouts += 1;
        if state.timeouts < self.throttle_threshold {
            return;
        }
        state.timeouts = 0;

        let reduced = (state.limit - state.limit / self.throttle_divisor).max(1);
        let retire = state.limit - reduced;
        if retire == 0 {
            return;
        }

        let forgotten = self.semaphore.forget_permits(retire);
        state.debt += retire - forgotten;
        tracing::warn!(
            "Too many timeouts, reducing concurrency from {} to {}",
            state.limit,
            reduced
        );
        state.limit = reduced;
    }

    fn take_debt(&self) -> bool {
        let mut state = self.lock();
        if state.debt > 0 {
            state.debt -= 1;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        // Counters stay consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
