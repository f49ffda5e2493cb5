//! Shared support for the integration tests: a seeded legacy catalog plus
//! failure-injecting collaborator wrappers.

use remaster::error::{ErrorKind, MigrationResult};
use remaster::migration_error;
use remaster::search::{IndexSchema, MemorySearchSink, SearchDocument, SearchSink};
use remaster::source::{DocumentStream, IdPredicate, MemorySource, ReferenceFilter, SourceStore};
use remaster::types::Document;
use serde_json::{Value, json};

/// Converts a JSON literal into a document.
pub fn doc(value: Value) -> Document {
    Document::try_from(value).expect("seed records are objects")
}

/// Seeds the legacy catalog used across the scenarios.
pub async fn seed_catalog(source: &MemorySource) {
    source
        .extend(
            "artists",
            [
                doc(json!({ "_id": 42, "name": "Jethro Tull", "country": 1 })),
                doc(json!({ "_id": 43, "name": "Camel" })),
            ],
        )
        .await
        .unwrap();

    source
        .extend(
            "users",
            [
                doc(json!({ "_id": 7, "name": "maria", "recentlyPlayed": [1, 2] })),
                doc(json!({ "_id": 8, "name": "jo" })),
            ],
        )
        .await
        .unwrap();

    source
        .insert("countries", doc(json!({ "_id": 1, "name": "United Kingdom" })))
        .await
        .unwrap();

    source
        .insert("blogposts", doc(json!({ "_id": 1, "title": "welcome" })))
        .await
        .unwrap();

    source
        .extend(
            "songs",
            [
                doc(json!({
                    "_id": 1,
                    "title": "Aqualung",
                    "artist": 42,
                    "uploader": 7,
                    "tags": ["x"],
                    "duration": 65_000,
                    "lyrics": "<p>Sitting on a <b>park bench</b></p>",
                    "images": [3, 9],
                    "videos": ["v1"],
                    "videosCount": 1
                })),
                doc(json!({
                    "_id": 150_000,
                    "title": "Locomotive Breath",
                    "artist": 42,
                    "uploader": 8,
                    "duration": 3_665_000
                })),
            ],
        )
        .await
        .unwrap();

    source
        .extend(
            "comments",
            [
                doc(json!({
                    "_id": 1,
                    "reference": { "collection": "songs", "id": 1 },
                    "user": 7,
                    "children": [2],
                    "likers": [7, 8]
                })),
                doc(json!({
                    "_id": 2,
                    "reference": { "collection": "songs", "id": 1 },
                    "user": 8,
                    "parent": 1
                })),
                doc(json!({
                    "_id": 3,
                    "reference": { "collection": "artists", "id": 42 },
                    "user": 7
                })),
            ],
        )
        .await
        .unwrap();

    source
        .extend(
            "songimages",
            [
                doc(json!({
                    "_id": 3,
                    "song": 1,
                    "addedBy": 7,
                    "likers": [8],
                    "dislikers": []
                })),
                doc(json!({ "_id": 9, "song": 1, "addedBy": 8 })),
            ],
        )
        .await
        .unwrap();

    source
        .insert("songlyrics", doc(json!({ "_id": 1, "song": 1, "addedBy": 7 })))
        .await
        .unwrap();
}

/// The original's sampling ranges for the bounded reload.
pub fn sample_predicates() -> remaster::catalog::CatalogPredicates {
    remaster::catalog::CatalogPredicates {
        artists: IdPredicate::ranges([(1, 50), (6701, 6705)]),
        users: IdPredicate::ranges([(1, 15), (50_455, 50_505)]),
        comments: IdPredicate::ranges([(1, 1500)]),
        songs: IdPredicate::ranges([(1, 5), (150_000, 150_005)]),
        songimages: IdPredicate::ranges([(1, 200)]),
        songlyrics: IdPredicate::ranges([(1, 10)]),
        ..remaster::catalog::CatalogPredicates::default()
    }
}

/// Source wrapper that fails selected operations.
#[derive(Clone)]
pub struct FailingSource {
    inner: MemorySource,
    fail_stream_for: Option<String>,
    fail_counts: bool,
}

impl FailingSource {
    pub fn wrap(inner: MemorySource) -> Self {
        Self {
            inner,
            fail_stream_for: None,
            fail_counts: false,
        }
    }

    /// Fails every cursor over the given collection.
    pub fn fail_stream_for(mut self, collection: &str) -> Self {
        self.fail_stream_for = Some(collection.to_owned());
        self
    }

    /// Fails every count query.
    pub fn fail_counts(mut self) -> Self {
        self.fail_counts = true;
        self
    }
}

impl SourceStore for FailingSource {
    async fn stream_documents(
        &self,
        collection: &str,
        predicate: IdPredicate,
    ) -> MigrationResult<DocumentStream> {
        if self.fail_stream_for.as_deref() == Some(collection) {
            return Err(migration_error!(
                ErrorKind::SourceQueryFailed,
                "Injected cursor failure",
                format!("collection '{collection}'")
            ));
        }

        self.inner.stream_documents(collection, predicate).await
    }

    async fn count_documents(
        &self,
        collection: &str,
        filter: ReferenceFilter,
    ) -> MigrationResult<u64> {
        if self.fail_counts {
            return Err(migration_error!(
                ErrorKind::SourceQueryFailed,
                "Injected count failure"
            ));
        }

        self.inner.count_documents(collection, filter).await
    }
}

/// Search sink wrapper that fails every upsert.
#[derive(Clone)]
pub struct FailingSearchSink {
    inner: MemorySearchSink,
}

impl FailingSearchSink {
    pub fn wrap(inner: MemorySearchSink) -> Self {
        Self { inner }
    }
}

impl SearchSink for FailingSearchSink {
    fn name() -> &'static str {
        "failing"
    }

    async fn delete_index(&self, index: &str) -> MigrationResult<()> {
        self.inner.delete_index(index).await
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> MigrationResult<()> {
        self.inner.create_index(index, schema).await
    }

    async fn upsert(&self, _index: &str, _document: SearchDocument) -> MigrationResult<()> {
        Err(migration_error!(
            ErrorKind::SearchIndexFailed,
            "Injected upsert failure"
        ))
    }
}
