//! Error types for the QueryHaus crate
//!
//! This module contains the top-level error returned when building a client.
//! Fetch and mutation failures are [`QueryError`]s and live on cache entries
//! and mutation records.

use cache_system::QueryError;
use config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryhausError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Signal error: {0}")]
    Signal(#[from] signal_system::SignalError),
}
