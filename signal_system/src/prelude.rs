//! Convenience re-exports for common signal-system usage

// Core signal system components
pub use crate::event::{CacheEvent, EventType};
pub use crate::manager::{CallbackHandle, CallbackId, SignalError, SignalManager, SignalStats};
pub use crate::types::{EventCallback, KeyFilter};

// Re-export centralized config
pub use config::SignalConfig;

// Common key vocabulary
pub use query_types::{QueryKey, QueryStatus};
