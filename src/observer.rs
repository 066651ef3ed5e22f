//! Query observers
//!
//! A [`QueryObserver`] is a view's handle on one cached query. It holds a
//! subscription for as long as it lives, starting a fetch when the entry
//! needs one, and drops the subscription on `Drop`. Switching keys with
//! `keep_previous_data` reports the old key's data as a placeholder until
//! the new key has data of its own.

use cache_system::{QueryError, QueryOptions};
use query_types::{QueryKey, QueryStatus};
use serde::de::DeserializeOwned;
use serde_json::Value;
use signal_system::{CacheEvent, CallbackHandle, EventCallback, KeyFilter, SignalError};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::QueryClient;
use crate::fetch::{FetchOutcome, Fetcher};

/// What a view renders for one query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<QueryError>,
    /// `data` belongs to the previous key, shown while this one loads
    pub is_placeholder: bool,
}

impl<T> QueryState<T> {
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    fetcher: Fetcher,
    options: QueryOptions,
    subscribed: bool,
    previous: Option<Value>,
    listener: Option<EventCallback>,
    handle: Option<CallbackHandle>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for QueryObserver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryObserver")
            .field("key", &self.key)
            .field("options", &self.options)
            .field("subscribed", &self.subscribed)
            .finish()
    }
}

impl<T: DeserializeOwned> QueryObserver<T> {
    pub fn new(client: QueryClient, key: QueryKey, fetcher: Fetcher, options: QueryOptions) -> Self {
        client.register_fetcher(&key, fetcher.clone());
        let mut observer = Self {
            client,
            key,
            fetcher,
            options,
            subscribed: false,
            previous: None,
            listener: None,
            handle: None,
            _marker: PhantomData,
        };
        if observer.options.enabled {
            observer.attach();
        }
        observer
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    fn attach(&mut self) {
        if self.subscribed {
            return;
        }
        self.subscribed = true;
        let ticket = self
            .client
            .store()
            .subscribe_with(&self.key, self.options.stale_time);
        trace_log!(key = %self.key, fetching = ticket.is_some(), "Observer subscribed");
        if let Some(ticket) = ticket {
            self.client.spawn_ticket(ticket);
        }
    }

    fn detach(&mut self) {
        if self.subscribed {
            self.client.store().unsubscribe(&self.key);
            self.subscribed = false;
        }
    }

    /// Current state of the query, decoded as `T`
    pub fn state(&self) -> QueryState<T> {
        let (mut status, raw, mut error) = match self.client.entry(&self.key) {
            Some(entry) => (entry.status(), entry.data().cloned(), entry.error().cloned()),
            None => (QueryStatus::Idle, None, None),
        };

        let mut is_placeholder = false;
        let raw = match raw {
            Some(value) => Some(value),
            None if self.subscribed
                && self.options.keep_previous_data
                && matches!(status, QueryStatus::Loading | QueryStatus::Idle) =>
            {
                is_placeholder = self.previous.is_some();
                if is_placeholder {
                    status = QueryStatus::Loading;
                }
                self.previous.clone()
            }
            None => None,
        };

        let data = match raw.map(serde_json::from_value::<T>).transpose() {
            Ok(data) => data,
            Err(e) => {
                error = Some(QueryError::from(e));
                status = QueryStatus::Error;
                is_placeholder = false;
                None
            }
        };

        QueryState {
            status,
            data,
            error,
            is_placeholder,
        }
    }

    /// Point the observer at another key
    ///
    /// With `keep_previous_data`, the data on screen for the old key is kept
    /// as a placeholder until the new key has data.
    pub fn set_key(&mut self, key: QueryKey, fetcher: Fetcher) {
        if key == self.key {
            self.client.register_fetcher(&key, fetcher.clone());
            self.fetcher = fetcher;
            return;
        }

        self.previous = if self.options.keep_previous_data {
            self.client
                .entry(&self.key)
                .and_then(|e| e.data().cloned())
                .or_else(|| self.previous.take())
        } else {
            None
        };

        self.detach();
        self.handle = None;

        self.key = key;
        self.client.register_fetcher(&self.key, fetcher.clone());
        self.fetcher = fetcher;

        if let Some(listener) = self.listener.clone() {
            if let Err(e) = self.register_listener(listener) {
                tracing::warn!(key = %self.key, error = %e, "Failed to move observer callback");
            }
        }
        if self.options.enabled {
            self.attach();
        }
    }

    /// Enable or disable the observer; enabling may start a fetch
    pub fn set_enabled(&mut self, enabled: bool) {
        self.options.enabled = enabled;
        if enabled {
            self.attach();
        } else {
            self.detach();
        }
    }

    /// Call `callback` on every transition of the observed key
    ///
    /// Replaces any callback registered earlier; follows the observer
    /// across [`set_key`](Self::set_key).
    pub fn on_change<F>(&mut self, callback: F) -> Result<(), SignalError>
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let listener: EventCallback = Arc::new(callback);
        self.register_listener(Arc::clone(&listener))?;
        self.listener = Some(listener);
        Ok(())
    }

    fn register_listener(&mut self, listener: EventCallback) -> Result<(), SignalError> {
        self.handle = None;
        let handle = self
            .client
            .signals()
            .add_callback(KeyFilter::Exact(self.key.clone()), move |event| listener(event))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Fetch the key again now, superseding any fetch in flight
    pub async fn refetch(&self) -> FetchOutcome {
        self.client.register_fetcher(&self.key, self.fetcher.clone());
        self.client.refetch(&self.key).await
    }

    /// Wait until the key is no longer loading, then return the state
    pub async fn settled(&self) -> QueryState<T> {
        self.client.wait_until_settled(&self.key).await;
        self.state()
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        if self.subscribed {
            self.client.store().unsubscribe(&self.key);
        }
    }
}

impl QueryClient {
    /// Observe `key` with options taken from the cache configuration
    pub fn watch<T: DeserializeOwned>(&self, key: QueryKey, fetcher: Fetcher) -> QueryObserver<T> {
        let options = QueryOptions::from_config(self.cache_config()).keep_previous_data(false);
        QueryObserver::new(self.clone(), key, fetcher, options)
    }

    /// Observe `key` with explicit options
    pub fn watch_with<T: DeserializeOwned>(
        &self,
        key: QueryKey,
        fetcher: Fetcher,
        options: QueryOptions,
    ) -> QueryObserver<T> {
        QueryObserver::new(self.clone(), key, fetcher, options)
    }
}
