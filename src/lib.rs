//! # Collection Harness
//!
//! Ingest a directory of local text files into a named vector collection
//! and answer similarity queries over MCP.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Directory  │──▶│   Ingest    │──▶│    SQLite    │
//! │ .md .txt …  │   │ ids + batch │   │ docs + vecs  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                   ┌──────────┐       ┌────────────┐
//!                   │   CLI    │       │ MCP server │
//!                   │  (colh)  │       │ stdio/HTTP │
//!                   └──────────┘       └────────────┘
//! ```
//!
//! Data models, the error type, the [`DocumentStore`] contract and the
//! lexical embedder live in the `collection-harness-core` crate; this crate
//! adds everything that touches the filesystem, SQLite or the network.
//!
//! [`DocumentStore`]: collection_harness_core::store::DocumentStore
//!
//! ## Quick Start
//!
//! ```bash
//! colh init                                   # create the database
//! colh ingest --name TestCollection --files ./docs
//! colh query "how do I bake bread" --exact banana
//! colh serve                                  # MCP over stdio
//! colh serve --transport http                 # MCP over HTTP on [server].bind
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`embedding`] | Embedding providers |
//! | [`sqlite_store`] | SQLite-backed document store |
//! | [`ingest`] | Directory ingestion |
//! | [`query`] | Query service |
//! | [`collections`] | Collection listing |
//! | [`traits`] | Tool trait and registry |
//! | [`mcp`] | MCP protocol bridge |
//! | [`server`] | stdio and HTTP server |

pub mod collections;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod mcp;
pub mod migrate;
pub mod query;
pub mod server;
pub mod sqlite_store;
pub mod traits;
