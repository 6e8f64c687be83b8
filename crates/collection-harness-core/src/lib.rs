//! # Collection Harness Core
//!
//! Shared logic for Collection Harness: data models, the error type, the
//! document store trait, the embedding trait, and the ingest/query contract
//! (batch validation, collection naming, single-query retrieval).
//!
//! This crate contains no SQLite, HTTP, or filesystem I/O. Concrete store
//! and embedding backends live in the `collection-harness` app crate; an
//! in-memory store and an offline hashing embedder ship here for tests.

pub mod collection;
pub mod embedding;
pub mod error;
pub mod models;
pub mod store;

pub use error::{Error, Result};
