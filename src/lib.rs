//! # QueryHaus
//!
//! Client-side query cache and mutation synchronization for a discussion-board
//! client. Views read through cached queries keyed by [`QueryKey`]; concurrent
//! reads of the same key share one network call, writes invalidate the key
//! families they affect, and observers keep showing previous data while a
//! new page or search loads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use queryhaus::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(MemoryBoard::new());
//!     let board = BoardClient::new(
//!         QueryClient::new(&AppConfig::default()),
//!         backend.clone(),
//!         backend,
//!     );
//!
//!     // A list observer; stays subscribed until dropped
//!     let mut posts = board.posts(0, "");
//!     posts.settled().await;
//!     println!("{:?}", posts.state().status);
//!
//!     // Next page keeps showing page 0 while page 1 loads
//!     board.show_posts_page(&mut posts, 1, "");
//!     assert!(posts.state().is_placeholder || posts.state().data.is_some());
//!
//!     // Writes invalidate the whole posts family
//!     let create = board.create_post_action();
//!     let record = create.invoke(PostPayload::new("Hello", "First post")).await;
//!     println!("{:?}", record.status);
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod board;
pub mod core;
pub mod errors;
pub mod fetch;
pub mod gate;
pub mod mutation;
pub mod observer;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::QueryClient;
pub use errors::QueryhausError;
pub use fetch::{FetchOutcome, Fetcher, fetcher};
pub use gate::{IdentityState, UserId, can_mutate};
pub use board::{BoardClient, MemoryBoard};
pub use mutation::{MutationAction, MutationExecutor, MutationFn, MutationRecord, MutationStatus, mutation_fn};
pub use observer::{QueryObserver, QueryState};

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, ClientConfig, RetryConfig, SignalConfig};

// Re-export internal crates used in the public API
pub use cache_system;
pub use query_types;
pub use signal_system;

pub use cache_system::{CacheEntry, CacheStore, ErrorKind, FetchTicket, QueryError, QueryOptions};
pub use query_types::{KeyPart, QueryKey, QueryStatus, query_key};

// Re-export external dependencies used in public API
pub use async_trait;
