//! Ownership gate
//!
//! A client-side pre-check run before edit and delete mutations: the signed-in
//! identity must be known and must own the resource. The server re-checks
//! every write; a pass here only means the request is worth sending.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::board::Identity;

/// A user identifier as it appears on the wire, either a number or a
/// numeric string depending on the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Int(i64),
    Text(String),
}

impl UserId {
    /// Numeric value of the identifier, if it has one
    pub fn normalize(&self) -> Option<i64> {
        match self {
            UserId::Int(n) => Some(*n),
            UserId::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Both identifiers are numeric and equal
    pub fn same_as(&self, other: &UserId) -> bool {
        matches!((self.normalize(), other.normalize()), (Some(a), Some(b)) if a == b)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Int(n) => write!(f, "{}", n),
            UserId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for UserId {
    fn from(val: i64) -> Self {
        UserId::Int(val)
    }
}

impl From<i32> for UserId {
    fn from(val: i32) -> Self {
        UserId::Int(val as i64)
    }
}

impl From<&str> for UserId {
    fn from(val: &str) -> Self {
        UserId::Text(val.to_string())
    }
}

impl From<String> for UserId {
    fn from(val: String) -> Self {
        UserId::Text(val)
    }
}

/// Where the client is in resolving who is signed in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityState {
    /// The identity lookup has not finished
    Resolving,
    Anonymous,
    Authenticated(Identity),
}

impl IdentityState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, IdentityState::Authenticated(_))
    }
}

/// Whether the current identity may edit or delete a resource owned by
/// `owner_id`. Denies while the identity is still resolving.
pub fn can_mutate(identity: &IdentityState, owner_id: Option<&UserId>) -> bool {
    match (identity, owner_id) {
        (IdentityState::Authenticated(identity), Some(owner)) => identity.id.same_as(owner),
        _ => false,
    }
}
