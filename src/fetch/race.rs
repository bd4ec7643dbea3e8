//! Racing and fallback fetches
//!
//! Both operations run candidates as concurrent futures and return as soon as
//! one succeeds. Dropping the remaining futures aborts their requests.

use crate::fetch::{FailureCause, FetchResponse, FetchTarget, Fetcher};
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;

impl Fetcher {
    /// Fetches every target concurrently and returns the first success
    ///
    /// Losing requests still in flight are aborted and reported to the abort
    /// observer. If every target fails, the result aggregates their causes.
    pub async fn fetch_racing(&self, targets: &[FetchTarget]) -> FetchResponse {
        let label = targets
            .first()
            .map(|t| t.url.to_string())
            .unwrap_or_default();

        let mut pending: FuturesUnordered<_> = targets.iter().map(|t| self.fetch(t)).collect();
        let mut failures = Vec::with_capacity(targets.len());

        while let Some(response) = pending.next().await {
            if response.is_success() {
                tracing::debug!("Race won by {}", response.url);
                return response;
            }
            failures.extend(response.cause());
        }

        FetchResponse::failed(label, FailureCause::AllFailed(failures))
    }

    /// Fetches `primary`, racing the fallback ladder once it is slow or failing
    ///
    /// # Flow
    ///
    /// 1. Start the primary request and a `grace` timer
    /// 2. Primary succeeds first: return it
    /// 3. Timer expires or primary fails: race every ladder target alongside
    ///    the still-pending primary
    /// 4. Everything failed: aggregate failure
    pub async fn fetch_with_fallback(
        &self,
        primary: &FetchTarget,
        ladder: &[FetchTarget],
        grace: Duration,
    ) -> FetchResponse {
        let primary_fut = self.fetch(primary);
        tokio::pin!(primary_fut);

        let mut failures = Vec::new();
        let mut primary_done = tokio::select! {
            response = &mut primary_fut => {
                if response.is_success() || ladder.is_empty() {
                    return response;
                }
                tracing::debug!("Primary {} failed early, trying fallbacks", primary.url);
                failures.extend(response.cause());
                true
            }
            _ = tokio::time::sleep(grace) => {
                tracing::debug!(
                    "Primary {} slower than {:?}, trying fallbacks",
                    primary.url,
                    grace
                );
                false
            }
        };

        if ladder.is_empty() {
            return primary_fut.await;
        }

        let mut fallbacks: FuturesUnordered<_> = ladder.iter().map(|t| self.fetch(t)).collect();

        loop {
            tokio::select! {
                response = &mut primary_fut, if !primary_done => {
                    primary_done = true;
                    if response.is_success() {
                        return response;
                    }
                    failures.extend(response.cause());
                }
                Some(response) = fallbacks.next(), if !fallbacks.is_empty() => {
                    if response.is_success() {
                        tracing::debug!("Fallback {} used for {}", response.url, primary.url);
                        return response;
                    }
                    failures.extend(response.cause());
                }
                else => break,
            }
        }

        FetchResponse::failed(primary.url.as_str(), FailureCause::AllFailed(failures))
    }
}
