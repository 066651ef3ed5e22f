//! Query key model
//!
//! A query key is an ordered tuple of primitive parts: the resource kind
//! followed by its parameters, e.g. `["posts", 2, "rust"]` or `["post", 7]`.
//! Keys are compared structurally, and a key can act as a prefix selecting
//! a whole family of keys for bulk invalidation.

use crate::types::KeyPart;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey {
    parts: Vec<KeyPart>,
}

impl QueryKey {
    /// Start a key with its resource kind
    pub fn new(kind: impl Into<KeyPart>) -> Self {
        Self {
            parts: vec![kind.into()],
        }
    }

    /// Build a key from already converted parts
    pub fn from_parts(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    /// Append a parameter
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Resource kind, when the first part is text
    pub fn kind(&self) -> Option<&str> {
        self.parts.first().and_then(KeyPart::as_str)
    }

    /// True iff `prefix` is a prefix of this key, element by element
    ///
    /// Every key matches itself and every key matches the empty key.
    pub fn matches(&self, prefix: &QueryKey) -> bool {
        prefix.parts.len() <= self.parts.len()
            && self.parts.iter().zip(&prefix.parts).all(|(a, b)| a == b)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", part)?;
        }
        f.write_str("]")
    }
}

impl From<Vec<KeyPart>> for QueryKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        Self::from_parts(parts)
    }
}

impl From<&str> for QueryKey {
    fn from(kind: &str) -> Self {
        Self::new(kind)
    }
}

/// Build a [`QueryKey`] from a kind and any number of parameters
///
/// ```
/// use query_types::query_key;
///
/// let key = query_key!("posts", 0, "rust");
/// assert!(key.matches(&query_key!("posts")));
/// ```
#[macro_export]
macro_rules! query_key {
    ($kind:expr $(, $part:expr)* $(,)?) => {
        $crate::QueryKey::new($kind)$(.with($part))*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        assert_eq!(query_key!("post", 7), QueryKey::new("post").with(7));
        assert_ne!(query_key!("post", 7), query_key!("post", "7"));
        assert_ne!(query_key!("posts", 0, ""), query_key!("posts", 0));
    }

    #[test]
    fn prefix_selects_family() {
        let prefix = query_key!("posts");
        assert!(query_key!("posts", 0, "").matches(&prefix));
        assert!(query_key!("posts", 3, "rust").matches(&prefix));
        assert!(prefix.matches(&prefix));
        assert!(!query_key!("post", 1).matches(&prefix));
    }

    #[test]
    fn longer_prefix_never_matches_shorter_key() {
        assert!(!query_key!("comments").matches(&query_key!("comments", 1)));
    }

    #[test]
    fn parameter_prefix_is_exact() {
        let prefix = query_key!("comments", 1);
        assert!(query_key!("comments", 1).matches(&prefix));
        assert!(!query_key!("comments", 2).matches(&prefix));
        assert!(!query_key!("comments", "1").matches(&prefix));
    }

    #[test]
    fn empty_key_matches_everything() {
        assert!(query_key!("me").matches(&QueryKey::default()));
    }

    #[test]
    fn display_renders_tuple() {
        assert_eq!(query_key!("posts", 0, "").to_string(), r#"["posts",0,""]"#);
        assert_eq!(query_key!("posts", 0, "").kind(), Some("posts"));
    }

    #[test]
    fn serializes_as_plain_array() {
        let json = serde_json::to_string(&query_key!("post", 7)).unwrap();
        assert_eq!(json, r#"["post",7]"#);
    }
}
