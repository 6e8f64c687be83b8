//! Core data models shared by the ingest and query paths.

use serde::{Deserialize, Serialize};

/// Number of documents returned by a single query.
pub const RESULT_LIMIT: usize = 2;

/// File suffixes accepted for ingestion (case-sensitive).
pub const ACCEPTED_EXTENSIONS: &[&str] = &[".md", ".mkd", ".txt", ".text", ".html"];

/// A single document: the full text of one ingested file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
    /// File the text was read from, if known.
    pub source_path: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_path: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// Handle to a named collection in a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    /// Store-assigned identifier.
    pub id: String,
    pub name: String,
    /// Embedding model the collection was created with.
    pub embedding_model: String,
}

/// A collection together with its document count.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    pub embedding_model: String,
    pub documents: usize,
    /// ISO-8601 creation time.
    pub created_at: String,
}

/// Document-content filter applied before ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhereDocument {
    /// Raw text must contain this substring (case-sensitive).
    Contains(String),
}

impl WhereDocument {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            WhereDocument::Contains(needle) => text.contains(needle.as_str()),
        }
    }
}

/// One similarity query against a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query_text: String,
    pub exact_filter: Option<String>,
    pub result_limit: usize,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            exact_filter: None,
            result_limit: RESULT_LIMIT,
        }
    }

    pub fn with_exact_filter(mut self, filter: Option<String>) -> Self {
        self.exact_filter = filter;
        self
    }

    pub fn where_document(&self) -> Option<WhereDocument> {
        self.exact_filter.clone().map(WhereDocument::Contains)
    }
}

/// Ranked document texts for a single query, closest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub distances: Vec<f32>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Texts joined by a single space, the shape returned to tool callers.
    pub fn joined(&self) -> String {
        self.documents.join(" ")
    }
}

/// Batch-shaped response from [`DocumentStore::query`](crate::store::DocumentStore::query).
///
/// Every field is indexed `[query][rank]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,
    pub documents: Vec<Vec<String>>,
    pub distances: Vec<Vec<f32>>,
}

impl QueryResponse {
    /// Take the ranked list for query slot `index`.
    pub fn take(mut self, index: usize) -> Option<QueryResult> {
        if index >= self.documents.len() {
            return None;
        }
        Some(QueryResult {
            ids: std::mem::take(self.ids.get_mut(index)?),
            documents: std::mem::take(&mut self.documents[index]),
            distances: self
                .distances
                .get_mut(index)
                .map(std::mem::take)
                .unwrap_or_default(),
        })
    }
}
