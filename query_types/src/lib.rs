//! Shared vocabulary for the queryhaus ecosystem
//! Key model and entry status types used by the signal, cache and client crates

pub mod key;
pub mod status;
pub mod types;

pub use key::QueryKey;
pub use status::QueryStatus;
pub use types::KeyPart;
