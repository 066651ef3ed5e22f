//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::entry::{CacheEntry, FetchTicket};
pub use crate::errors::{ErrorKind, QueryError};
pub use crate::params::QueryOptions;
pub use crate::store::CacheStore;

// Re-export centralized config
pub use config::CacheConfig;

// Common external dependencies
pub use query_types::{query_key, KeyPart, QueryKey, QueryStatus};
pub use serde::{Deserialize, Serialize};
pub use serde_json;
