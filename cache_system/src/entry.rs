//! Cache entry state
//!
//! One entry per distinct key, owned by the store. Outside the store entries
//! are only ever seen as cloned snapshots.

use crate::errors::QueryError;
use query_types::{QueryKey, QueryStatus};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// A fetch that was started for `key` and must commit under `generation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: QueryKey,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) key: QueryKey,
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<Value>,
    pub(crate) error: Option<QueryError>,
    pub(crate) last_fetched_at: Option<u64>,
    pub(crate) fetched_at: Option<chrono::DateTime<chrono::Utc>>,
    pub(crate) fetched_instant: Option<tokio::time::Instant>,
    pub(crate) generation: u64,
    pub(crate) subscriber_count: usize,
    pub(crate) is_invalidated: bool,
}

impl CacheEntry {
    pub(crate) fn new(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            fetched_at: None,
            fetched_instant: None,
            generation: 0,
            subscriber_count: 0,
            is_invalidated: false,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn status(&self) -> QueryStatus {
        self.status
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Decode the cached value into `T`
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, QueryError> {
        match &self.data {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn error(&self) -> Option<&QueryError> {
        self.error.as_ref()
    }

    /// Logical store tick of the last completed fetch
    pub fn last_fetched_at(&self) -> Option<u64> {
        self.last_fetched_at
    }

    /// Wall-clock time of the last successful fetch
    pub fn fetched_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.fetched_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    pub fn is_invalidated(&self) -> bool {
        self.is_invalidated
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Whether a new observer should trigger a fetch for this entry
    pub fn needs_fetch(&self, stale_time: Option<Duration>) -> bool {
        match self.status {
            QueryStatus::Loading => false,
            QueryStatus::Idle | QueryStatus::Error => true,
            QueryStatus::Success => {
                self.is_invalidated
                    || match (stale_time, self.fetched_instant) {
                        (Some(stale_time), Some(at)) => at.elapsed() >= stale_time,
                        _ => false,
                    }
            }
        }
    }

    /// Start a new fetch generation; data is kept so it stays visible while loading
    pub(crate) fn start_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        self.status = QueryStatus::Loading;
        FetchTicket {
            key: self.key.clone(),
            generation: self.generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::query_key;
    use serde_json::json;

    #[test]
    fn start_fetch_keeps_data() {
        let mut entry = CacheEntry::new(query_key!("post", 1));
        entry.status = QueryStatus::Success;
        entry.data = Some(json!({"id": 1}));

        let ticket = entry.start_fetch();
        assert_eq!(ticket.generation, 1);
        assert_eq!(entry.status(), QueryStatus::Loading);
        assert_eq!(entry.data(), Some(&json!({"id": 1})));
    }

    #[test]
    fn needs_fetch_by_status() {
        let mut entry = CacheEntry::new(query_key!("post", 1));
        assert!(entry.needs_fetch(None));

        entry.status = QueryStatus::Loading;
        assert!(!entry.needs_fetch(None));

        entry.status = QueryStatus::Success;
        assert!(!entry.needs_fetch(None));

        entry.is_invalidated = true;
        assert!(entry.needs_fetch(None));

        entry.status = QueryStatus::Error;
        assert!(entry.needs_fetch(None));
    }

    #[test]
    fn data_as_decodes_or_reports() {
        let mut entry = CacheEntry::new(query_key!("post", 1));
        assert_eq!(entry.data_as::<u32>().unwrap(), None);

        entry.data = Some(json!(5));
        assert_eq!(entry.data_as::<u32>().unwrap(), Some(5));
        assert!(entry.data_as::<String>().is_err());
    }
}
