//! In-memory [`DocumentStore`] implementation for tests.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine distance over every document in the
//! collection. Nothing is persisted.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::collection::{ensure_unique_ids, validate_collection_name};
use crate::embedding::{cosine_distance, Embedder, HashEmbedder};
use crate::error::{Error, Result};
use crate::models::{Collection, CollectionSummary, Document, QueryResponse, WhereDocument};

use super::{heartbeat_nanos, DocumentStore};

struct StoredDoc {
    doc: Document,
    vector: Vec<f32>,
}

struct StoredCollection {
    collection: Collection,
    created_at: i64,
    docs: Vec<StoredDoc>,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    embedder: Arc<dyn Embedder>,
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, StoredCollection>>> {
        self.collections
            .read()
            .map_err(|_| Error::store("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, StoredCollection>>> {
        self.collections
            .write()
            .map_err(|_| Error::store("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(HashEmbedder::default()))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn heartbeat(&self) -> Result<i64> {
        drop(self.read()?);
        Ok(heartbeat_nanos())
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<Collection> {
        validate_collection_name(name)?;
        let mut collections = self.write()?;
        let stored = collections
            .entry(name.to_string())
            .or_insert_with(|| StoredCollection {
                collection: Collection {
                    id: format!("mem-{}", name),
                    name: name.to_string(),
                    embedding_model: self.embedder.model_name().to_string(),
                },
                created_at: chrono::Utc::now().timestamp(),
                docs: Vec::new(),
            });
        Ok(stored.collection.clone())
    }

    async fn get_collection(&self, name: &str) -> Result<Collection> {
        self.read()?
            .get(name)
            .map(|s| s.collection.clone())
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", name)))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let collections = self.read()?;
        let mut summaries: Vec<CollectionSummary> = collections
            .values()
            .map(|s| CollectionSummary {
                name: s.collection.name.clone(),
                embedding_model: s.collection.embedding_model.clone(),
                documents: s.docs.len(),
                created_at: format_ts_iso(s.created_at),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn add(&self, collection: &Collection, documents: &[Document]) -> Result<()> {
        ensure_unique_ids(documents.iter().map(|d| d.id.as_str()))?;
        if documents.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(Error::Embedding(format!(
                "expected {} vectors, got {}",
                documents.len(),
                vectors.len()
            )));
        }

        let mut collections = self.write()?;
        let stored = collections
            .get_mut(&collection.name)
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", collection.name)))?;

        let present: HashSet<&str> = stored.docs.iter().map(|s| s.doc.id.as_str()).collect();
        if let Some(dup) = documents.iter().find(|d| present.contains(d.id.as_str())) {
            return Err(Error::Validation(format!(
                "duplicate id: {} already exists in collection '{}'",
                dup.id, collection.name
            )));
        }

        stored.docs.extend(
            documents
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(doc, vector)| StoredDoc { doc, vector }),
        );
        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        query_texts: &[String],
        where_document: Option<&WhereDocument>,
        n_results: usize,
    ) -> Result<QueryResponse> {
        let query_vecs = self.embedder.embed(query_texts).await?;

        let collections = self.read()?;
        let stored = collections
            .get(&collection.name)
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", collection.name)))?;

        let mut response = QueryResponse::default();
        for query_vec in &query_vecs {
            let mut ranked: Vec<(&StoredDoc, f32)> = stored
                .docs
                .iter()
                .filter(|s| where_document.map_or(true, |w| w.matches(&s.doc.text)))
                .map(|s| (s, cosine_distance(query_vec, &s.vector)))
                .collect();
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked.truncate(n_results);

            response
                .ids
                .push(ranked.iter().map(|(s, _)| s.doc.id.clone()).collect());
            response
                .documents
                .push(ranked.iter().map(|(s, _)| s.doc.text.clone()).collect());
            response
                .distances
                .push(ranked.iter().map(|(_, d)| *d).collect());
        }
        Ok(response)
    }

    async fn existing_ids(&self, collection: &Collection, ids: &[String]) -> Result<Vec<String>> {
        let collections = self.read()?;
        let Some(stored) = collections.get(&collection.name) else {
            return Ok(Vec::new());
        };
        let present: HashSet<&str> = stored.docs.iter().map(|s| s.doc.id.as_str()).collect();
        Ok(ids
            .iter()
            .filter(|id| present.contains(id.as_str()))
            .cloned()
            .collect())
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        Ok(self
            .read()?
            .get(&collection.name)
            .map(|s| s.docs.len())
            .unwrap_or(0))
    }
}
