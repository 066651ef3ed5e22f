//! Fetch coordination
//!
//! Drives the per-key state machine on top of the cache store:
//!
//! ```text
//! idle -> loading -> success | error
//! success -> loading   (invalidated or stale)
//! error   -> loading   (manual retry)
//! ```
//!
//! A fetch runs under a [`FetchTicket`]; its result is written only while the
//! ticket's generation is still current. Transient network failures are
//! retried with capped exponential backoff; every other failure settles
//! immediately.

use cache_system::{FetchTicket, QueryError};
use config::RetryConfig;
use futures::future::BoxFuture;
use query_types::QueryKey;
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::QueryClient;

/// Produces the current server value for one key
pub type Fetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<serde_json::Value, QueryError>> + Send + Sync>;

/// Wrap a typed async function as a [`Fetcher`]
pub fn fetcher<T, F, Fut>(f: F) -> Fetcher
where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
{
    Arc::new(move || {
        let fut = f();
        Box::pin(async move {
            let value = fut.await?;
            Ok(serde_json::to_value(value)?)
        })
    })
}

/// What a call to [`QueryClient::request`] or [`QueryClient::refetch`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// This call fetched and its result was written
    Committed,
    /// This call fetched and the failure was recorded on the entry
    Failed(QueryError),
    /// A newer fetch started meanwhile; this result was discarded
    Superseded,
    /// A fetch for the key was already in flight; no call was made
    Joined,
    /// No fetcher is registered for the key
    NoFetcher,
}

impl QueryClient {
    /// Fetch `key` unless a fetch for it is already in flight
    ///
    /// The fetcher is remembered for later invalidation refetches.
    pub async fn request(&self, key: &QueryKey, fetcher: Fetcher) -> FetchOutcome {
        self.register_fetcher(key, fetcher.clone());
        match self.inner.store.begin_fetch(key) {
            Some(ticket) => self.run_ticket(ticket, fetcher).await,
            None => {
                trace_log!(key = %key, "Joined fetch in flight");
                FetchOutcome::Joined
            }
        }
    }

    /// Start a new fetch for `key` with its registered fetcher, superseding
    /// any fetch in flight. Used for manual retry after an error.
    pub async fn refetch(&self, key: &QueryKey) -> FetchOutcome {
        let Some(fetcher) = self.fetcher_for(key) else {
            return FetchOutcome::NoFetcher;
        };
        let ticket = self.inner.store.restart_fetch(key);
        self.run_ticket(ticket, fetcher).await
    }

    /// Run a ticket to completion on the current task
    pub(crate) async fn run_ticket(&self, ticket: FetchTicket, fetcher: Fetcher) -> FetchOutcome {
        let FetchTicket { key, generation } = ticket;
        let store = &self.inner.store;
        let retry = &self.inner.retry;
        let timeout = self.inner.request_timeout;
        let mut attempt: u32 = 0;

        debug_log!(key = %key, generation, "Fetch started");

        loop {
            let result = match tokio::time::timeout(timeout, fetcher()).await {
                Ok(result) => result,
                Err(_) => Err(QueryError::Network(format!(
                    "request timed out after {} ms",
                    timeout.as_millis()
                ))),
            };

            match result {
                Ok(value) => {
                    return if store.commit(&key, generation, value) {
                        debug_log!(key = %key, generation, "Fetch committed");
                        FetchOutcome::Committed
                    } else {
                        FetchOutcome::Superseded
                    };
                }
                Err(err) if err.is_retryable() && attempt < retry.max_retries => {
                    let delay = retry_delay(retry, attempt);
                    tracing::debug!(
                        key = %key,
                        generation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying fetch"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;

                    if store.current_generation(&key) != Some(generation) {
                        return FetchOutcome::Superseded;
                    }
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::warn!(key = %key, attempts = attempt + 1, error = %err, "Fetch failed after retries");
                    }
                    return if store.fail(&key, generation, err.clone()) {
                        FetchOutcome::Failed(err)
                    } else {
                        FetchOutcome::Superseded
                    };
                }
            }
        }
    }

    /// Run a ticket in the background with the key's registered fetcher
    ///
    /// A ticket that cannot run is failed rather than left loading forever.
    pub(crate) fn spawn_ticket(&self, ticket: FetchTicket) {
        let Some(fetcher) = self.fetcher_for(&ticket.key) else {
            tracing::warn!(key = %ticket.key, "No fetcher registered for refetch");
            self.inner.store.fail(
                &ticket.key,
                ticket.generation,
                QueryError::Unknown(format!("no fetcher registered for {}", ticket.key)),
            );
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.clone();
                handle.spawn(async move {
                    client.run_ticket(ticket, fetcher).await;
                });
            }
            Err(_) => {
                tracing::warn!(key = %ticket.key, "No async runtime available for refetch");
                self.inner.store.fail(
                    &ticket.key,
                    ticket.generation,
                    QueryError::Unknown("no async runtime available to run the fetch".to_string()),
                );
            }
        }
    }
}

/// Backoff for retry `attempt` plus random jitter
fn retry_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let jitter = if retry.jitter_ms > 0 {
        rand::rng().random_range(0..=retry.jitter_ms)
    } else {
        0
    };
    retry.backoff(attempt) + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::AppConfig;
    use query_types::{QueryStatus, query_key};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client_with_retry(retry: RetryConfig) -> QueryClient {
        let mut config = AppConfig::default();
        config.retry = retry;
        QueryClient::new(&config)
    }

    fn flaky(failures: usize, calls: Arc<AtomicUsize>, error: QueryError) -> Fetcher {
        fetcher(move || {
            let calls = Arc::clone(&calls);
            let error = error.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < failures { Err(error) } else { Ok(json!("ok")) }
            }
        })
    }

    #[test]
    fn retry_delay_stays_within_jitter() {
        let retry = RetryConfig::new(3, 100, 1_000, 50);
        for attempt in 0..6 {
            let delay = retry_delay(&retry, attempt);
            let base = retry.backoff(attempt);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_millis(50));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_retry_then_succeed() {
        let client = client_with_retry(RetryConfig::new(3, 100, 1_000, 0));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!("posts", 0, "");

        let outcome = client
            .request(&key, flaky(2, Arc::clone(&calls), QueryError::Network("down".into())))
            .await;

        assert_eq!(outcome, FetchOutcome::Committed);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.entry(&key).unwrap().status(), QueryStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let client = client_with_retry(RetryConfig::new(2, 100, 1_000, 0));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!("post", 1);

        let outcome = client
            .request(&key, flaky(usize::MAX, Arc::clone(&calls), QueryError::Network("down".into())))
            .await;

        assert!(matches!(outcome, FetchOutcome::Failed(QueryError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.entry(&key).unwrap().status(), QueryStatus::Error);
    }

    #[tokio::test]
    async fn client_errors_settle_without_retry() {
        let client = client_with_retry(RetryConfig::new(5, 100, 1_000, 0));
        let key = query_key!("post", 1);

        for error in [
            QueryError::Auth("login".into()),
            QueryError::validation("bad"),
            QueryError::NotFound("gone".into()),
            QueryError::Conflict("race".into()),
            QueryError::Unknown("?".into()),
        ] {
            let calls = Arc::new(AtomicUsize::new(0));
            let outcome = client
                .request(&key, flaky(usize::MAX, Arc::clone(&calls), error.clone()))
                .await;
            assert_eq!(outcome, FetchOutcome::Failed(error));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn manual_refetch_recovers_from_error() {
        let client = client_with_retry(RetryConfig::disabled());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = query_key!("post", 1);

        let outcome = client
            .request(&key, flaky(1, Arc::clone(&calls), QueryError::NotFound("not yet".into())))
            .await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));

        assert_eq!(client.refetch(&key).await, FetchOutcome::Committed);
        let entry = client.entry(&key).unwrap();
        assert_eq!(entry.status(), QueryStatus::Success);
        assert!(entry.error().is_none());
    }

    #[tokio::test]
    async fn refetch_without_fetcher_is_reported() {
        let client = QueryClient::default();
        assert_eq!(client.refetch(&query_key!("post", 9)).await, FetchOutcome::NoFetcher);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out_as_network_error() {
        let mut config = AppConfig::default();
        config.client.request_timeout_ms = 50;
        config.retry = RetryConfig::disabled();
        let client = QueryClient::new(&config);
        let key = query_key!("post", 1);

        let slow = fetcher(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1u32)
        });

        let outcome = client.request(&key, slow).await;
        assert!(matches!(outcome, FetchOutcome::Failed(QueryError::Network(_))));
    }
}
