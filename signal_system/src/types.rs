//! Type definitions for signal system
//!
//! This module contains the callback type and the key filters
//! callbacks are registered under.

use crate::event::CacheEvent;
use query_types::QueryKey;
use std::sync::Arc;

/// Observer callback, invoked synchronously after each matching transition
pub type EventCallback = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Which keys a callback observes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// Every event
    All,
    /// Events for exactly this key
    Exact(QueryKey),
    /// Events for every key under this prefix
    Prefix(QueryKey),
}

impl KeyFilter {
    pub fn accepts(&self, key: &QueryKey) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Exact(k) => k == key,
            KeyFilter::Prefix(prefix) => key.matches(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::query_key;

    #[test]
    fn filters_select_keys() {
        let key = query_key!("posts", 1, "");
        assert!(KeyFilter::All.accepts(&key));
        assert!(KeyFilter::Prefix(query_key!("posts")).accepts(&key));
        assert!(!KeyFilter::Exact(query_key!("posts")).accepts(&key));
        assert!(KeyFilter::Exact(key.clone()).accepts(&key));
        assert!(!KeyFilter::Prefix(query_key!("post")).accepts(&key));
    }
}
