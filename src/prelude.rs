//! Convenience re-exports for common QueryHaus usage
//!
//! ```rust
//! use queryhaus::prelude::*;
//!
//! let client = QueryClient::default();
//! assert!(client.entry(&query_key!("posts", 0, "")).is_none());
//! ```

// Core QueryHaus components
pub use crate::core::QueryClient;
pub use crate::errors::QueryhausError;
pub use crate::fetch::{FetchOutcome, Fetcher, fetcher};
pub use crate::gate::{IdentityState, UserId, can_mutate};
pub use crate::mutation::{
    MutationAction, MutationExecutor, MutationFn, MutationRecord, MutationStatus, mutation_fn,
};
pub use crate::observer::{QueryObserver, QueryState};

// Board layer
pub use crate::board::{
    BoardClient, BoardTransport, Comment, CommentEdit, CommentPayload, CommentRef, Credentials, Identity,
    IdentityProvider, MemoryBoard, Post, PostPage, PostPayload, PostSummary,
};

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, ClientConfig, RetryConfig, SignalConfig};

// Re-export signal system for event handling
pub use signal_system::prelude::*;

// Re-export cache system
pub use cache_system::prelude::*;

// Common external dependencies
pub use async_trait;
pub use tokio;
