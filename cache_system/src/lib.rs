//! Cache system for client-side query caching
//!
//! This crate provides the in-memory query cache: entries keyed by
//! [`QueryKey`](query_types::QueryKey), their fetch generations and
//! staleness, and the classified errors fetches settle with.

pub mod entry;
pub mod errors;
pub mod params;
pub mod prelude;
pub mod store;

// Re-export centralized config
pub use config::CacheConfig;

pub use entry::{CacheEntry, FetchTicket};
pub use errors::{ErrorKind, QueryError};
pub use params::QueryOptions;
pub use store::CacheStore;
