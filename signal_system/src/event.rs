//! Cache event types and definitions
//!
//! This module defines the structure of the cache events
//! that flow through the signal system.

use query_types::{QueryKey, QueryStatus};
use serde::{Deserialize, Serialize};

/// What happened to the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Status moved (idle, loading, success, error)
    StatusChanged,
    /// Entry was marked stale by an invalidation
    Invalidated,
    /// Data was written directly, bypassing a fetch
    DataSet,
}

/// Cache entry event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEvent {
    /// Key of the entry
    pub key: QueryKey,
    /// Event type
    pub event_type: EventType,
    /// Entry status after the transition
    pub status: QueryStatus,
    /// Entry generation after the transition
    pub generation: u64,
    /// Active observers at the time of the event
    pub subscriber_count: usize,
    /// Event timestamp (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl CacheEvent {
    pub fn new(key: QueryKey, event_type: EventType, status: QueryStatus, generation: u64) -> Self {
        Self {
            key,
            event_type,
            status,
            generation,
            subscriber_count: 0,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn status_changed(key: QueryKey, status: QueryStatus, generation: u64) -> Self {
        Self::new(key, EventType::StatusChanged, status, generation)
    }

    pub fn with_subscriber_count(mut self, subscriber_count: usize) -> Self {
        self.subscriber_count = subscriber_count;
        self
    }

    /// True when this event leaves the entry settled (success or error)
    /// at or past the given generation
    pub fn settles(&self, generation: u64) -> bool {
        self.event_type != EventType::Invalidated
            && self.status.is_settled()
            && self.generation >= generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::query_key;

    #[test]
    fn settles_requires_settled_status_and_generation() {
        let key = query_key!("post", 1);
        assert!(CacheEvent::status_changed(key.clone(), QueryStatus::Success, 2).settles(2));
        assert!(CacheEvent::status_changed(key.clone(), QueryStatus::Error, 3).settles(2));
        assert!(!CacheEvent::status_changed(key.clone(), QueryStatus::Success, 1).settles(2));
        assert!(!CacheEvent::status_changed(key.clone(), QueryStatus::Loading, 2).settles(2));
        assert!(CacheEvent::new(key.clone(), EventType::DataSet, QueryStatus::Success, 4).settles(2));
        assert!(!CacheEvent::new(key, EventType::Invalidated, QueryStatus::Success, 2).settles(2));
    }
}
