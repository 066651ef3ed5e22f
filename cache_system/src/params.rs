//! Per-observer query parameters
//!
//! This module defines the QueryOptions struct
//! for configuring how an observer uses the cache.

use config::CacheConfig;
use std::time::Duration;

/// Query parameters for configuring cache behavior per observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// A disabled observer neither subscribes nor fetches
    pub enabled: bool,
    /// Show the previous key's data while a new key loads
    pub keep_previous_data: bool,
    /// Override of the store's stale time for this observer
    pub stale_time: Option<Duration>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options seeded from the cache configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            enabled: true,
            keep_previous_data: config.keep_previous_data,
            stale_time: config.stale_time(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_previous_data: false,
            stale_time: None,
        }
    }
}
