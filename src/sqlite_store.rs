//! SQLite-backed [`DocumentStore`].
//!
//! Collections and documents live in the tables created by
//! [`migrate`](crate::migrate). Embeddings are stored as little-endian
//! `f32` blobs and ranked by brute-force cosine distance, which is plenty
//! for a handful of local text files.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use collection_harness_core::collection::{ensure_unique_ids, validate_collection_name};
use collection_harness_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob, Embedder};
use collection_harness_core::models::{
    Collection, CollectionSummary, Document, QueryResponse, WhereDocument,
};
use collection_harness_core::store::{heartbeat_nanos, DocumentStore};
use collection_harness_core::{Error, Result};

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;

pub struct SqliteStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    /// Open the configured database, apply the schema and build the
    /// configured embedder.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.store.path).await?;
        migrate::run_migrations(&pool).await?;
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::new(pool, embedder))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_collection(&self, name: &str) -> Result<Option<Collection>> {
        let row = sqlx::query("SELECT id, name, embedding_model FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::store)?;

        Ok(row.map(|r| Collection {
            id: r.get("id"),
            name: r.get("name"),
            embedding_model: r.get("embedding_model"),
        }))
    }
    /// Vectors from different models are not comparable, so a collection
    /// is only read or written with the model it was created with.
    fn ensure_model(&self, collection: &Collection) -> Result<()> {
        if collection.embedding_model != self.embedder.model_name() {
            return Err(Error::store(format!(
                "collection '{}' was built with embedding model '{}' but '{}' is configured; \
                 re-ingest into a new collection or restore the embedding config",
                collection.name,
                collection.embedding_model,
                self.embedder.model_name()
            )));
        }
        Ok(())
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn heartbeat(&self) -> Result<i64> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::store)?;
        Ok(heartbeat_nanos())
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<Collection> {
        validate_collection_name(name)?;

        sqlx::query(
            "INSERT INTO collections (id, name, embedding_model, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(uuid::Uuid::now_v7().to_string())
        .bind(name)
        .bind(self.embedder.model_name())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(Error::store)?;

        let collection = self
            .find_collection(name)
            .await?
            .ok_or_else(|| Error::store(format!("collection '{}' vanished after insert", name)))?;

        Ok(collection)
    }

    async fn get_collection(&self, name: &str) -> Result<Collection> {
        self.find_collection(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", name)))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let rows = sqlx::query(
            "SELECT c.name, c.embedding_model, c.created_at, COUNT(d.seq) AS documents
             FROM collections c
             LEFT JOIN documents d ON d.collection_id = c.id
             GROUP BY c.id
             ORDER BY c.name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)?;

        Ok(rows
            .iter()
            .map(|r| CollectionSummary {
                name: r.get("name"),
                embedding_model: r.get("embedding_model"),
                documents: r.get::<i64, _>("documents") as usize,
                created_at: format_ts_iso(r.get("created_at")),
            })
            .collect())
    }

    async fn add(&self, collection: &Collection, documents: &[Document]) -> Result<()> {
        ensure_unique_ids(documents.iter().map(|d| d.id.as_str()))?;
        if documents.is_empty() {
            return Ok(());
        }
        self.ensure_model(collection)?;

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(Error::Embedding(format!(
                "expected {} vectors, got {}",
                documents.len(),
                vectors.len()
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(Error::store)?;

        for doc in documents {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT seq FROM documents WHERE collection_id = ? AND id = ?")
                    .bind(&collection.id)
                    .bind(&doc.id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(Error::store)?;
            if exists.is_some() {
                tx.rollback().await.map_err(Error::store)?;
                return Err(Error::Validation(format!(
                    "duplicate id: {} already exists in collection '{}'",
                    doc.id, collection.name
                )));
            }
        }

        for (doc, vector) in documents.iter().zip(&vectors) {
            sqlx::query(
                "INSERT INTO documents (collection_id, id, text, source_path, created_at, embedding)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&collection.id)
            .bind(&doc.id)
            .bind(&doc.text)
            .bind(&doc.source_path)
            .bind(now)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await
            .map_err(Error::store)?;
        }

        tx.commit().await.map_err(Error::store)?;
        debug!(collection = %collection.name, added = documents.len(), "documents stored");
        Ok(())
    }

    async fn query(
        &self,
        collection: &Collection,
        query_texts: &[String],
        where_document: Option<&WhereDocument>,
        n_results: usize,
    ) -> Result<QueryResponse> {
        self.ensure_model(collection)?;
        let query_vecs = self.embedder.embed(query_texts).await?;

        let rows = sqlx::query(
            "SELECT id, text, embedding FROM documents WHERE collection_id = ? ORDER BY seq",
        )
        .bind(&collection.id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::store)?;

        let candidates: Vec<(String, String, Vec<f32>)> = rows
            .iter()
            .map(|r| {
                let id: String = r.get("id");
                let text: String = r.get("text");
                let blob: Vec<u8> = r.get("embedding");
                (id, text, blob_to_vec(&blob))
            })
            .filter(|(_, text, _)| where_document.map_or(true, |w| w.matches(text)))
            .collect();

        let dims = self.embedder.dims();
        if let Some((id, _, vector)) = candidates.iter().find(|(_, _, v)| v.len() != dims) {
            return Err(Error::store(format!(
                "document '{}' has a {}-dimensional embedding, expected {}",
                id,
                vector.len(),
                dims
            )));
        }

        let mut response = QueryResponse::default();
        for query_vec in &query_vecs {
            let mut ranked: Vec<(&(String, String, Vec<f32>), f32)> = candidates
                .iter()
                .map(|c| (c, cosine_distance(query_vec, &c.2)))
                .collect();
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            ranked.truncate(n_results);

            response
                .ids
                .push(ranked.iter().map(|(c, _)| c.0.clone()).collect());
            response
                .documents
                .push(ranked.iter().map(|(c, _)| c.1.clone()).collect());
            response
                .distances
                .push(ranked.iter().map(|(_, d)| *d).collect());
        }
        Ok(response)
    }

    async fn existing_ids(&self, collection: &Collection, ids: &[String]) -> Result<Vec<String>> {
        let stored: Vec<String> =
            sqlx::query_scalar("SELECT id FROM documents WHERE collection_id = ?")
                .bind(&collection.id)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::store)?;
        let stored: HashSet<String> = stored.into_iter().collect();

        Ok(ids.iter().filter(|id| stored.contains(*id)).cloned().collect())
    }

    async fn count(&self, collection: &Collection) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection_id = ?")
            .bind(&collection.id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::store)?;
        Ok(n as usize)
    }
}
