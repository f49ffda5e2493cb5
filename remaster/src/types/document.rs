//! Schemaless records as read from and written to the document stores.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::id::NativeId;

/// Field holding a record's identifier in both stores.
pub const ID_FIELD: &str = "_id";

/// Error raised when a record's identifier cannot be read as a native id.
#[derive(Debug, Error)]
pub enum DocumentIdError {
    #[error("record has no '{ID_FIELD}' field")]
    Missing,
    #[error("record '{ID_FIELD}' is not an integer: {0}")]
    NotAnInteger(String),
}

/// One keyed record of a document store.
///
/// A [`Document`] is a keyed field → JSON value mapping. Source records
/// carry native integer identifiers; transformed records carry canonical
/// string identifiers. The pipeline treats the shape as opaque except for the
/// fields named by an entity's rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    /// Removes a field and returns its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns whether the field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the fields.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Reads the record's native integer identifier.
    ///
    /// Source records are keyed by a narrow integer id; downstream records
    /// are not, so this is only meaningful before identifier normalization.
    pub fn native_id(&self) -> Result<NativeId, DocumentIdError> {
        let value = self.0.get(ID_FIELD).ok_or(DocumentIdError::Missing)?;
        value
            .as_i64()
            .ok_or_else(|| DocumentIdError::NotAnInteger(value.to_string()))
    }

    /// Consumes the document and returns the underlying map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = Value;

    /// Converts a JSON value into a document, failing on non-objects and
    /// returning the rejected value.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        Value::Object(document.0)
    }
}

/// Returns whether a value counts as present for optional-field rules.
///
/// The legacy store's convention: null, `false`, numeric zero, the empty
/// string, and the empty array are all treated as absent. Objects are always
/// present.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(value) => value.as_f64().is_some_and(|v| v != 0.0),
        Value::String(value) => !value.is_empty(),
        Value::Array(values) => !values.is_empty(),
        Value::Object(_) => true,
    }
}
