//! Core QueryClient functionality
//!
//! This module contains the QueryClient handle: the explicitly passed
//! context that owns the cache store, the signal manager, and the fetcher
//! last registered for every key.

use cache_system::{CacheEntry, CacheStore, QueryError};
use config::{AppConfig, CacheConfig, RetryConfig};
use query_types::{QueryKey, QueryStatus};
use serde::Serialize;
use serde::de::DeserializeOwned;
use signal_system::lock::{rw_read, rw_write};
use signal_system::{CacheEvent, KeyFilter, SignalManager};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::fetch::Fetcher;
use crate::mutation::MutationExecutor;

const SOURCE: &str = "queryhaus::core";

pub(crate) struct ClientInner {
    pub(crate) store: Arc<CacheStore>,
    pub(crate) signals: Arc<SignalManager>,
    pub(crate) fetchers: RwLock<HashMap<QueryKey, Fetcher>>,
    pub(crate) retry: RetryConfig,
    pub(crate) request_timeout: Duration,
    pub(crate) cache_config: CacheConfig,
}

/// Handle to one client's query cache
///
/// Cloning is cheap and every clone shares the same cache. Create one per
/// process (or per test) and pass it to whatever needs cached data.
#[derive(Clone)]
pub struct QueryClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("store", &self.inner.store)
            .field("retry", &self.inner.retry)
            .field("request_timeout", &self.inner.request_timeout)
            .finish()
    }
}

impl QueryClient {
    /// Create a new client from application configuration
    pub fn new(config: &AppConfig) -> Self {
        let signals = Arc::new(SignalManager::new(config.signal.clone()));
        let store = Arc::new(CacheStore::new(config.cache.clone(), Arc::clone(&signals)));

        Self {
            inner: Arc::new(ClientInner {
                store,
                signals,
                fetchers: RwLock::new(HashMap::new()),
                retry: config.retry.clone(),
                request_timeout: config.client.request_timeout(),
                cache_config: config.cache.clone(),
            }),
        }
    }

    /// Create a client from the configuration file named by the environment
    pub fn from_env() -> Result<Self, crate::QueryhausError> {
        let config = AppConfig::load()?;
        Ok(Self::new(&config))
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.inner.store
    }

    pub fn signals(&self) -> &Arc<SignalManager> {
        &self.inner.signals
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.inner.cache_config
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.inner.retry
    }

    /// Snapshot of the entry for `key`
    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.inner.store.get(key)
    }

    /// Executor for write operations against this cache
    pub fn mutations(&self) -> MutationExecutor {
        MutationExecutor::new(self.clone())
    }

    /// Remember how to fetch `key`; invalidation refetches use the latest one
    pub fn register_fetcher(&self, key: &QueryKey, fetcher: Fetcher) {
        rw_write(&self.inner.fetchers, SOURCE, "register_fetcher").insert(key.clone(), fetcher);
    }

    pub(crate) fn fetcher_for(&self, key: &QueryKey) -> Option<Fetcher> {
        rw_read(&self.inner.fetchers, SOURCE, "fetcher_for").get(key).cloned()
    }

    /// Mark every entry under `prefix` stale
    ///
    /// Observed entries are moved to `Loading` before this returns and their
    /// refetches are spawned; unobserved ones go idle until next observed.
    /// Returns the keys being refetched.
    pub fn invalidate(&self, prefix: &QueryKey) -> Vec<QueryKey> {
        let tickets = self.inner.store.mark_stale(prefix);
        let keys = tickets.iter().map(|t| t.key.clone()).collect();
        for ticket in tickets {
            self.spawn_ticket(ticket);
        }
        keys
    }

    /// Write data for `key` directly, as if it had just been fetched
    pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<(), QueryError> {
        let value = serde_json::to_value(value)?;
        self.inner.store.set_data(key, value);
        Ok(())
    }

    /// Cached data for `key` decoded as `T`, without fetching
    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>, QueryError> {
        match self.inner.store.get(key) {
            Some(entry) => entry.data_as(),
            None => Ok(None),
        }
    }

    /// Data for `key`, fetching only when the cache cannot answer
    ///
    /// Fresh successful data is returned as is. Otherwise a fetch is started,
    /// or the one already in flight is awaited; either way the outcome is
    /// read back from the entry, so concurrent callers see the same result.
    pub async fn fetch_query<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
        fetcher: Fetcher,
    ) -> Result<T, QueryError> {
        self.register_fetcher(key, fetcher.clone());
        let stale_time = self.inner.cache_config.stale_time();

        loop {
            let entry = self.inner.store.ensure(key);
            if entry.status() == QueryStatus::Success && !entry.needs_fetch(stale_time) {
                return decode_success(&entry);
            }

            match self.inner.store.begin_fetch(key) {
                Some(ticket) => {
                    self.run_ticket(ticket, fetcher.clone()).await;
                }
                None => {
                    self.wait_until_settled(key).await;
                }
            }

            if let Some(entry) = self.inner.store.get(key) {
                match entry.status() {
                    QueryStatus::Success => return decode_success(&entry),
                    QueryStatus::Error => {
                        return Err(entry
                            .error()
                            .cloned()
                            .unwrap_or_else(|| QueryError::Unknown("fetch failed".to_string())));
                    }
                    // Superseded or fenced by an invalidation; go again
                    QueryStatus::Loading | QueryStatus::Idle => continue,
                }
            }
        }
    }

    /// Wait until `key` is no longer loading and return its entry
    pub async fn wait_until_settled(&self, key: &QueryKey) -> Option<CacheEntry> {
        let (tx, mut rx) = mpsc::unbounded_channel::<CacheEvent>();
        // Registered before the status check so no transition can slip between them
        let handle = match self.inner.signals.add_callback(KeyFilter::Exact(key.clone()), move |event| {
            let _ = tx.send(event.clone());
        }) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Falling back to polling for settle");
                None
            }
        };

        loop {
            let entry = self.inner.store.get(key);
            match &entry {
                Some(e) if e.is_loading() => {}
                _ => return entry,
            }

            if handle.is_some() {
                if rx.recv().await.is_none() {
                    return self.inner.store.get(key);
                }
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(&AppConfig::default())
    }
}

fn decode_success<T: DeserializeOwned>(entry: &CacheEntry) -> Result<T, QueryError> {
    let value = entry.data().cloned().unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(value)?)
}
