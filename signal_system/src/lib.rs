//! Signal system for cache entry notifications
//!
//! This crate provides explicit per-key observer registration and
//! deterministic notification of cache entry transitions in the QueryHaus ecosystem.

pub mod event;
pub mod lock;
pub mod manager;
pub mod prelude;
pub mod types;

// Re-export centralized config
pub use config::SignalConfig;

pub use event::{CacheEvent, EventType};
pub use manager::{CallbackHandle, CallbackId, SignalError, SignalManager, SignalStats};
pub use types::{EventCallback, KeyFilter};
