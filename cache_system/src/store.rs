//! Cache store implementation
//!
//! The store is the only shared mutable state of the client. Every entry
//! transition goes through one of its operations, which is what keeps the
//! single-flight and fencing rules enforceable:
//!
//! - at most one fetch per key is in flight (`Loading` + current generation)
//! - a result is written only under the generation it was started with
//!
//! Each operation applies its transition under the write lock, releases the
//! lock, and then notifies the signal manager, so observer callbacks are free
//! to read the store again.

use crate::entry::{CacheEntry, FetchTicket};
use crate::errors::QueryError;
use config::CacheConfig;
use query_types::{QueryKey, QueryStatus};
use serde_json::Value;
use signal_system::lock::{rw_read, rw_write};
use signal_system::{CacheEvent, EventType, SignalManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

const SOURCE: &str = "cache_system::store";

/// In-memory query cache
pub struct CacheStore {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    clock: AtomicU64,
    signals: Arc<SignalManager>,
    config: CacheConfig,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("config", &self.config)
            .finish()
    }
}

impl CacheStore {
    /// Create a new cache store notifying through `signals`
    pub fn new(config: CacheConfig, signals: Arc<SignalManager>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            signals,
            config,
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn event(entry: &CacheEntry, event_type: EventType) -> CacheEvent {
        CacheEvent::new(entry.key.clone(), event_type, entry.status, entry.generation)
            .with_subscriber_count(entry.subscriber_count)
    }

    /// Read an entry without side effects
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntry> {
        rw_read(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// Return the entry for `key`, creating it idle if absent
    pub fn ensure(&self, key: &QueryKey) -> CacheEntry {
        let mut entries = rw_write(&self.entries, SOURCE, "ensure");
        entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone()))
            .clone()
    }

    /// Start a fetch unless one is already in flight
    ///
    /// Returns `None` when the key is loading; the caller then shares the
    /// outcome of the fetch already running.
    pub fn begin_fetch(&self, key: &QueryKey) -> Option<FetchTicket> {
        let (ticket, event) = {
            let mut entries = rw_write(&self.entries, SOURCE, "begin_fetch");
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone()));
            if entry.is_loading() {
                return None;
            }
            let ticket = entry.start_fetch();
            (ticket, Self::event(entry, EventType::StatusChanged))
        };

        self.signals.emit(event);
        Some(ticket)
    }

    /// Start a fetch even if one is in flight, superseding it
    pub fn restart_fetch(&self, key: &QueryKey) -> FetchTicket {
        let (ticket, event) = {
            let mut entries = rw_write(&self.entries, SOURCE, "restart_fetch");
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone()));
            let ticket = entry.start_fetch();
            (ticket, Self::event(entry, EventType::StatusChanged))
        };

        self.signals.emit(event);
        ticket
    }

    /// Invalidate every entry under `prefix`
    ///
    /// Observed entries go straight back to `Loading` with their data kept and
    /// a ticket is returned for each; the caller runs those refetches.
    /// Unobserved entries drop to `Idle` and are refetched lazily on their
    /// next subscription. Any response still in flight for a matching key
    /// is fenced, since it may predate the write that caused the invalidation.
    pub fn mark_stale(&self, prefix: &QueryKey) -> Vec<FetchTicket> {
        let mut tickets = Vec::new();
        let mut events = Vec::new();
        {
            let mut entries = rw_write(&self.entries, SOURCE, "mark_stale");
            for entry in entries.values_mut().filter(|e| e.key.matches(prefix)) {
                entry.is_invalidated = true;
                if entry.subscriber_count > 0 {
                    tickets.push(entry.start_fetch());
                } else {
                    if entry.is_loading() {
                        entry.generation += 1;
                    }
                    entry.status = QueryStatus::Idle;
                }
                events.push(Self::event(entry, EventType::Invalidated));
            }
        }

        debug!(
            prefix = %prefix,
            invalidated = events.len(),
            refetching = tickets.len(),
            "Marked cache entries stale"
        );
        self.signals.emit_all(events);
        tickets
    }

    /// Register an observer of `key` using the configured stale time
    pub fn subscribe(&self, key: &QueryKey) -> Option<FetchTicket> {
        self.subscribe_with(key, self.config.stale_time())
    }

    /// Register an observer of `key`
    ///
    /// The first observer starts a fetch when the entry has never succeeded,
    /// was invalidated, failed, or is older than `stale_time`.
    pub fn subscribe_with(&self, key: &QueryKey, stale_time: Option<Duration>) -> Option<FetchTicket> {
        let (ticket, event) = {
            let mut entries = rw_write(&self.entries, SOURCE, "subscribe");
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone()));
            entry.subscriber_count += 1;
            if entry.subscriber_count == 1 && entry.needs_fetch(stale_time) {
                let ticket = entry.start_fetch();
                (Some(ticket), Some(Self::event(entry, EventType::StatusChanged)))
            } else {
                (None, None)
            }
        };

        if let Some(event) = event {
            self.signals.emit(event);
        }
        ticket
    }

    /// Drop an observer; never aborts a fetch in flight
    pub fn unsubscribe(&self, key: &QueryKey) {
        let mut entries = rw_write(&self.entries, SOURCE, "unsubscribe");
        if let Some(entry) = entries.get_mut(key) {
            entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
        }
    }

    /// Write a fetch result if `generation` is still current
    ///
    /// Returns false when the result was fenced.
    pub fn commit(&self, key: &QueryKey, generation: u64, value: Value) -> bool {
        let now = self.tick();
        let event = {
            let mut entries = rw_write(&self.entries, SOURCE, "commit");
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            if entry.generation != generation {
                debug!(key = %key, generation, current = entry.generation, "Discarded superseded response");
                return false;
            }
            entry.status = QueryStatus::Success;
            entry.data = Some(value);
            entry.error = None;
            entry.is_invalidated = false;
            entry.last_fetched_at = Some(now);
            entry.fetched_at = Some(chrono::Utc::now());
            entry.fetched_instant = Some(tokio::time::Instant::now());
            Self::event(entry, EventType::StatusChanged)
        };

        self.signals.emit(event);
        true
    }

    /// Record a fetch failure if `generation` is still current; data is kept
    pub fn fail(&self, key: &QueryKey, generation: u64, error: QueryError) -> bool {
        let now = self.tick();
        let event = {
            let mut entries = rw_write(&self.entries, SOURCE, "fail");
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            if entry.generation != generation {
                debug!(key = %key, generation, current = entry.generation, "Discarded superseded failure");
                return false;
            }
            entry.status = QueryStatus::Error;
            entry.error = Some(error);
            entry.last_fetched_at = Some(now);
            Self::event(entry, EventType::StatusChanged)
        };

        self.signals.emit(event);
        true
    }

    /// Write data directly, outside any fetch
    ///
    /// The generation is bumped so a response already in flight cannot
    /// overwrite the value written here.
    pub fn set_data(&self, key: &QueryKey, value: Value) {
        let now = self.tick();
        let event = {
            let mut entries = rw_write(&self.entries, SOURCE, "set_data");
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone()));
            entry.generation += 1;
            entry.status = QueryStatus::Success;
            entry.data = Some(value);
            entry.error = None;
            entry.is_invalidated = false;
            entry.last_fetched_at = Some(now);
            entry.fetched_at = Some(chrono::Utc::now());
            entry.fetched_instant = Some(tokio::time::Instant::now());
            Self::event(entry, EventType::DataSet)
        };

        self.signals.emit(event);
    }

    pub fn current_generation(&self, key: &QueryKey) -> Option<u64> {
        rw_read(&self.entries, SOURCE, "current_generation")
            .get(key)
            .map(|e| e.generation)
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        rw_read(&self.entries, SOURCE, "keys").keys().cloned().collect()
    }

    /// Snapshot of every entry under `prefix`
    pub fn entries_matching(&self, prefix: &QueryKey) -> Vec<CacheEntry> {
        rw_read(&self.entries, SOURCE, "entries_matching")
            .values()
            .filter(|e| e.key.matches(prefix))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn signals(&self) -> &Arc<SignalManager> {
        &self.signals
    }

    /// Get current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default(), Arc::new(SignalManager::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::query_key;
    use serde_json::json;
    use signal_system::KeyFilter;
    use std::sync::Mutex;

    #[test]
    fn ensure_creates_idle_entry_once() {
        let store = CacheStore::default();
        let key = query_key!("post", 1);

        assert!(store.get(&key).is_none());
        let entry = store.ensure(&key);
        assert_eq!(entry.status(), QueryStatus::Idle);
        assert_eq!(entry.generation(), 0);
        store.ensure(&key);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn begin_fetch_dedups_while_loading() {
        let store = CacheStore::default();
        let key = query_key!("post", 1);

        let ticket = store.begin_fetch(&key).unwrap();
        assert_eq!(ticket.generation, 1);
        assert!(store.begin_fetch(&key).is_none());

        assert!(store.commit(&key, 1, json!({"id": 1})));
        assert_eq!(store.begin_fetch(&key).unwrap().generation, 2);
    }

    #[test]
    fn commit_is_fenced_by_generation() {
        let store = CacheStore::default();
        let key = query_key!("post", 1);

        let first = store.begin_fetch(&key).unwrap();
        let second = store.restart_fetch(&key);

        assert!(store.commit(&key, second.generation, json!("new")));
        assert!(!store.commit(&key, first.generation, json!("old")));
        assert!(!store.fail(&key, first.generation, QueryError::Network("late".into())));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.data(), Some(&json!("new")));
        assert_eq!(entry.status(), QueryStatus::Success);
    }

    #[test]
    fn fail_keeps_previous_data() {
        let store = CacheStore::default();
        let key = query_key!("post", 1);

        let t = store.begin_fetch(&key).unwrap();
        store.commit(&key, t.generation, json!(1));
        let t = store.begin_fetch(&key).unwrap();
        store.fail(&key, t.generation, QueryError::Unknown("boom".into()));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status(), QueryStatus::Error);
        assert_eq!(entry.data(), Some(&json!(1)));
        assert_eq!(entry.error(), Some(&QueryError::Unknown("boom".into())));
    }

    #[test]
    fn first_subscriber_triggers_fetch() {
        let store = CacheStore::default();
        let key = query_key!("comments", 1);

        let ticket = store.subscribe(&key);
        assert_eq!(ticket.map(|t| t.generation), Some(1));
        // Second observer shares the fetch in flight
        assert!(store.subscribe(&key).is_none());
        assert_eq!(store.get(&key).unwrap().subscriber_count(), 2);
    }

    #[test]
    fn subscriber_on_fresh_success_does_not_fetch() {
        let store = CacheStore::default();
        let key = query_key!("post", 1);
        let t = store.begin_fetch(&key).unwrap();
        store.commit(&key, t.generation, json!(1));

        assert!(store.subscribe(&key).is_none());
        store.unsubscribe(&key);
        store.unsubscribe(&key);
        assert_eq!(store.get(&key).unwrap().subscriber_count(), 0);
    }

    #[test]
    fn mark_stale_refetches_observed_and_idles_unobserved() {
        let store = CacheStore::default();
        let observed = query_key!("posts", 0, "");
        let unobserved = query_key!("posts", 1, "");
        let other = query_key!("post", 1);

        for key in [&observed, &unobserved, &other] {
            let t = store.begin_fetch(key).unwrap();
            store.commit(key, t.generation, json!([1]));
        }
        assert!(store.subscribe(&observed).is_none());

        let tickets = store.mark_stale(&query_key!("posts"));
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].key, observed);

        let observed_entry = store.get(&observed).unwrap();
        assert_eq!(observed_entry.status(), QueryStatus::Loading);
        assert_eq!(observed_entry.data(), Some(&json!([1])));

        let unobserved_entry = store.get(&unobserved).unwrap();
        assert_eq!(unobserved_entry.status(), QueryStatus::Idle);
        assert_eq!(unobserved_entry.data(), Some(&json!([1])));
        assert!(unobserved_entry.is_invalidated());

        assert_eq!(store.get(&other).unwrap().status(), QueryStatus::Success);
    }

    #[test]
    fn mark_stale_fences_unobserved_fetch_in_flight() {
        let store = CacheStore::default();
        let key = query_key!("post", 1);

        let ticket = store.begin_fetch(&key).unwrap();
        store.mark_stale(&query_key!("post"));

        assert!(!store.commit(&key, ticket.generation, json!("pre-write")));
        assert_eq!(store.get(&key).unwrap().status(), QueryStatus::Idle);
        // Next subscription refetches
        assert!(store.subscribe(&key).is_some());
    }

    #[test]
    fn set_data_fences_fetch_in_flight() {
        let store = CacheStore::default();
        let key = query_key!("me");

        let ticket = store.begin_fetch(&key).unwrap();
        store.set_data(&key, Value::Null);
        assert!(!store.commit(&key, ticket.generation, json!({"id": 1})));

        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status(), QueryStatus::Success);
        assert_eq!(entry.data(), Some(&Value::Null));
    }

    #[test]
    fn stale_time_expires_success() {
        let store = CacheStore::new(
            CacheConfig::new(Some(0), true),
            Arc::new(SignalManager::default()),
        );
        let key = query_key!("post", 1);
        let t = store.begin_fetch(&key).unwrap();
        store.commit(&key, t.generation, json!(1));

        assert!(store.subscribe(&key).is_some());
    }

    #[test]
    fn last_fetched_at_is_logical_and_monotonic() {
        let store = CacheStore::default();
        let a = query_key!("post", 1);
        let b = query_key!("post", 2);

        let t = store.begin_fetch(&a).unwrap();
        store.commit(&a, t.generation, json!(1));
        let t = store.begin_fetch(&b).unwrap();
        store.commit(&b, t.generation, json!(2));

        let at_a = store.get(&a).unwrap().last_fetched_at().unwrap();
        let at_b = store.get(&b).unwrap().last_fetched_at().unwrap();
        assert!(at_b > at_a);
    }

    #[test]
    fn transitions_notify_after_lock_release() {
        let signals = Arc::new(SignalManager::default());
        let store = Arc::new(CacheStore::new(CacheConfig::default(), Arc::clone(&signals)));
        let key = query_key!("post", 1);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let reader = Arc::clone(&store);
        let sink = Arc::clone(&seen);
        let _handle = signals
            .add_callback(KeyFilter::Exact(key.clone()), move |event| {
                // Reading the store here would deadlock if the lock were still held
                let status = reader.get(&event.key).map(|e| e.status());
                sink.lock().unwrap().push((event.status, status));
            })
            .unwrap();

        let t = store.begin_fetch(&key).unwrap();
        store.commit(&key, t.generation, json!(1));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (QueryStatus::Loading, Some(QueryStatus::Loading)),
                (QueryStatus::Success, Some(QueryStatus::Success)),
            ]
        );
    }
}
