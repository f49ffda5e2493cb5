use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::MigrationResult;
use crate::types::{CanonicalId, Document};

/// Analysis applied to one search index field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Free text, analyzed with a language-specific analyzer.
    Text { analyzer: String },
    /// Exact value. With `indexed: false` the field is stored but not
    /// analyzed or searchable, which is what image references want.
    Keyword { indexed: bool },
}

/// One field of the index schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    pub kind: FieldKind,
}

/// Declared field-analysis schema of one search index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexSchema {
    fields: Vec<FieldMapping>,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an analyzed free-text field.
    pub fn text(mut self, name: &str, analyzer: &str) -> Self {
        self.fields.push(FieldMapping {
            name: name.to_owned(),
            kind: FieldKind::Text {
                analyzer: analyzer.to_owned(),
            },
        });
        self
    }

    /// Adds an exact-value field.
    pub fn keyword(mut self, name: &str) -> Self {
        self.fields.push(FieldMapping {
            name: name.to_owned(),
            kind: FieldKind::Keyword { indexed: true },
        });
        self
    }

    /// Adds a stored-but-not-analyzed field.
    pub fn stored_only(mut self, name: &str) -> Self {
        self.fields.push(FieldMapping {
            name: name.to_owned(),
            kind: FieldKind::Keyword { indexed: false },
        });
        self
    }

    /// Returns the declared fields.
    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    /// Renders the schema as an engine mapping body.
    pub fn to_mapping(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mapping = match &field.kind {
                FieldKind::Text { analyzer } => json!({ "type": "text", "analyzer": analyzer }),
                FieldKind::Keyword { indexed: true } => json!({ "type": "keyword" }),
                FieldKind::Keyword { indexed: false } => {
                    json!({ "type": "keyword", "index": false })
                }
            };
            properties.insert(field.name.clone(), mapping);
        }

        json!({ "mappings": { "properties": properties } })
    }
}

/// One projection keyed by canonical identifier, ready for upserting.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDocument {
    pub id: CanonicalId,
    pub body: Document,
}

/// Trait for the search engine that receives denormalized projections.
///
/// Handles are pre-established by the embedding process and injected into
/// the pipeline. All write failures on this sink are non-fatal to the
/// owning job.
pub trait SearchSink {
    /// Returns the name of the sink, for logging.
    fn name() -> &'static str;

    /// Drops an index; the absence of the index is not an error.
    fn delete_index(&self, index: &str) -> impl Future<Output = MigrationResult<()>> + Send;

    /// Creates an index with its field-analysis schema.
    fn create_index(
        &self,
        index: &str,
        schema: &IndexSchema,
    ) -> impl Future<Output = MigrationResult<()>> + Send;

    /// Writes one projection, replacing any previous version under the same
    /// canonical identifier.
    fn upsert(
        &self,
        index: &str,
        document: SearchDocument,
    ) -> impl Future<Output = MigrationResult<()>> + Send;
}
