//! Validation rules and the single-query retrieval contract.
//!
//! Both the SQLite store and the in-memory store rely on these helpers, so
//! the rules hold regardless of which backend is plugged in.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::{Collection, Document, QueryRequest, QueryResult};
use crate::store::DocumentStore;

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 63;

/// Check that `name` is a well-formed collection name.
///
/// Names are 3–63 characters of `[A-Za-z0-9._-]` and must start and end
/// with an ASCII alphanumeric character.
pub fn validate_collection_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(Error::Validation(format!(
            "collection name '{}' must be {}-{} characters long",
            name, MIN_NAME_LEN, MAX_NAME_LEN
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(Error::Validation(format!(
            "collection name '{}' may only contain letters, digits, '.', '_' and '-'",
            name
        )));
    }
    let starts_ok = name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric());
    let ends_ok = name.chars().last().is_some_and(|c| c.is_ascii_alphanumeric());
    if !starts_ok || !ends_ok {
        return Err(Error::Validation(format!(
            "collection name '{}' must start and end with a letter or digit",
            name
        )));
    }
    Ok(())
}

/// Check that every id in `ids` is distinct.
pub fn ensure_unique_ids<'a, I>(ids: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::Validation(format!("duplicate id: {}", id)));
        }
    }
    Ok(())
}

/// Pair ids with texts into an insert batch.
///
/// Fails with [`Error::Validation`] on a count mismatch or a duplicate id,
/// before anything reaches the store.
pub fn build_batch(ids: Vec<String>, texts: Vec<String>) -> Result<Vec<Document>> {
    if ids.len() != texts.len() {
        return Err(Error::Validation(format!(
            "count mismatch: {} ids for {} texts",
            ids.len(),
            texts.len()
        )));
    }
    ensure_unique_ids(ids.iter().map(String::as_str))?;

    Ok(ids
        .into_iter()
        .zip(texts)
        .map(|(id, text)| Document::new(id, text))
        .collect())
}

/// Check a query request before it is sent to the store.
pub fn validate_query(request: &QueryRequest) -> Result<()> {
    if request.query_text.trim().is_empty() {
        return Err(Error::Validation("query_text must not be empty".to_string()));
    }
    if let Some(filter) = &request.exact_filter {
        if filter.is_empty() {
            return Err(Error::Validation(
                "exact_filter must not be empty when given".to_string(),
            ));
        }
    }
    if request.result_limit == 0 {
        return Err(Error::Validation("result_limit must be >= 1".to_string()));
    }
    Ok(())
}

/// Run one query text against a collection.
///
/// Wraps the store's batched query: a single text is submitted and the
/// ranked list in slot 0 is returned.
pub async fn query_single(
    store: &dyn DocumentStore,
    collection: &Collection,
    request: &QueryRequest,
) -> Result<QueryResult> {
    validate_query(request)?;

    let where_document = request.where_document();
    let response = store
        .query(
            collection,
            std::slice::from_ref(&request.query_text),
            where_document.as_ref(),
            request.result_limit,
        )
        .await?;

    Ok(response.take(0).unwrap_or_default())
}

/// Resolve `collection_name` (which must already exist) and query it.
pub async fn query_collection(
    store: &dyn DocumentStore,
    collection_name: &str,
    request: &QueryRequest,
) -> Result<QueryResult> {
    validate_query(request)?;
    let collection = store.get_collection(collection_name).await?;
    query_single(store, &collection, request).await
}
