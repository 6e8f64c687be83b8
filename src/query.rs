//! The query service behind every transport.
//!
//! [`QueryService`] pairs a [`DocumentStore`] with the name of the collection
//! it serves. The collection is looked up on every call, so a server can
//! start before the first ingestion run and pick the collection up once it
//! exists.

use std::sync::Arc;

use tracing::{debug, warn};

use collection_harness_core::collection::query_collection;
use collection_harness_core::models::{QueryRequest, QueryResult};
use collection_harness_core::store::DocumentStore;
use collection_harness_core::{Error, Result};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub struct QueryService {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl QueryService {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    /// Open the configured SQLite store and serve `[query].collection`.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let store = SqliteStore::open(config).await?;
        let service = Self::new(Arc::new(store), config.query.collection.clone());

        match service.store.get_collection(&service.collection).await {
            Ok(_) => {}
            Err(Error::NotFound(_)) => warn!(
                collection = %service.collection,
                "collection does not exist yet; queries will fail until it is ingested"
            ),
            Err(e) => return Err(e.into()),
        }
        Ok(service)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Ranked documents for `query_text`, optionally restricted to texts
    /// containing `exact_filter`.
    pub async fn query_result(
        &self,
        query_text: &str,
        exact_filter: Option<String>,
    ) -> Result<QueryResult> {
        let request = QueryRequest::new(query_text).with_exact_filter(exact_filter);
        let result = query_collection(self.store.as_ref(), &self.collection, &request).await?;
        debug!(
            collection = %self.collection,
            hits = result.len(),
            "query answered"
        );
        Ok(result)
    }

    /// Matching texts joined by a single space, closest first.
    pub async fn query(&self, query_text: &str, exact_filter: Option<String>) -> Result<String> {
        Ok(self.query_result(query_text, exact_filter).await?.joined())
    }

    pub fn ping(&self) -> &'static str {
        "pong"
    }

    /// Nanoseconds since the epoch, after a round trip to the store.
    pub async fn ping_store(&self) -> Result<i64> {
        self.store.heartbeat().await
    }
}

/// `colh query` entry point: prints the joined result text.
pub async fn run_query(
    config: &Config,
    query_text: &str,
    exact_filter: Option<String>,
    collection: Option<String>,
) -> anyhow::Result<()> {
    let store = SqliteStore::open(config).await?;
    let collection = collection.unwrap_or_else(|| config.query.collection.clone());
    let service = QueryService::new(Arc::new(store), collection);
    let text = service.query(query_text, exact_filter).await?;
    println!("{}", text);
    Ok(())
}

/// `colh ping-store` entry point.
pub async fn run_ping_store(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(config).await?;
    let service = QueryService::new(Arc::new(store), config.query.collection.clone());
    println!("{}", service.ping_store().await?);
    Ok(())
}
