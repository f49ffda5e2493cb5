//! Identifier representations used by the two schemas.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Native identifier type of the legacy store.
pub type NativeId = i64;

/// The destination-wide identifier representation.
///
/// Every entity and every inter-entity reference uses this string form in
/// the target schema, regardless of the source's native identifier type.
/// Conversion from a [`NativeId`] is pure, deterministic, and collision-free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the identifier as a JSON value for embedding in documents.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl From<NativeId> for CanonicalId {
    fn from(native: NativeId) -> Self {
        Self(native.to_string())
    }
}

impl From<&str> for CanonicalId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for CanonicalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_is_deterministic() {
        assert_eq!(CanonicalId::from(42), CanonicalId::from(42));
        assert_eq!(CanonicalId::from(42).as_str(), "42");
    }

    #[test]
    fn distinct_native_ids_stay_distinct() {
        let ids = [0, 1, -1, 42, 150_000, NativeId::MAX, NativeId::MIN];
        for a in ids {
            for b in ids {
                assert_eq!(a == b, CanonicalId::from(a) == CanonicalId::from(b));
            }
        }
    }
}
