//! Storage abstraction for Collection Harness.
//!
//! The [`DocumentStore`] trait is the read/write contract the ingest and
//! query paths consume. It mirrors a persistent vector store client:
//! get-or-create collections, bulk add, batched similarity query, and a
//! heartbeat. Embeddings are computed by the store on insert and query.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Collection, CollectionSummary, Document, QueryResponse, WhereDocument};

/// Abstract document store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`heartbeat`](DocumentStore::heartbeat) | Liveness probe, nanoseconds since the epoch |
/// | [`get_or_create_collection`](DocumentStore::get_or_create_collection) | Open a collection, creating it if absent |
/// | [`get_collection`](DocumentStore::get_collection) | Open an existing collection |
/// | [`list_collections`](DocumentStore::list_collections) | All collections with document counts |
/// | [`add`](DocumentStore::add) | Insert a batch, all or nothing |
/// | [`query`](DocumentStore::query) | Batched similarity search |
/// | [`existing_ids`](DocumentStore::existing_ids) | Which of the given ids are already stored |
/// | [`count`](DocumentStore::count) | Number of documents in a collection |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round-trip to the store and return the current time in nanoseconds.
    async fn heartbeat(&self) -> Result<i64>;

    /// Return the collection named `name`, creating an empty one if needed.
    async fn get_or_create_collection(&self, name: &str) -> Result<Collection>;

    /// Return the collection named `name`, or
    /// [`Error::NotFound`](crate::error::Error::NotFound).
    async fn get_collection(&self, name: &str) -> Result<Collection>;

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>>;

    /// Insert `documents` into `collection`, embedding each text.
    ///
    /// Ids must be unique within the batch and must not already exist in
    /// the collection, otherwise the whole batch is rejected with
    /// [`Error::Validation`](crate::error::Error::Validation) and nothing
    /// is written.
    async fn add(&self, collection: &Collection, documents: &[Document]) -> Result<()>;

    /// Rank documents against each of `query_texts`.
    ///
    /// Documents failing `where_document` are dropped before ranking. Each
    /// slot of the response holds at most `n_results` entries ordered by
    /// ascending distance; ties keep insertion order.
    async fn query(
        &self,
        collection: &Collection,
        query_texts: &[String],
        where_document: Option<&WhereDocument>,
        n_results: usize,
    ) -> Result<QueryResponse>;

    /// Subset of `ids` already present in `collection`.
    async fn existing_ids(&self, collection: &Collection, ids: &[String]) -> Result<Vec<String>>;

    async fn count(&self, collection: &Collection) -> Result<usize>;
}

/// Current time in nanoseconds since the Unix epoch.
pub fn heartbeat_nanos() -> i64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() * 1_000_000)
}
