use anyhow::Result;

use collection_harness_core::store::DocumentStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// `colh collections`: one row per collection with its document count.
pub async fn list_collections(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let collections = store.list_collections().await?;

    if collections.is_empty() {
        println!("No collections. Run `colh ingest --name <collection> --files <dir>` first.");
        return Ok(());
    }

    println!(
        "{:<32} {:>9}  {:<20} CREATED",
        "COLLECTION", "DOCUMENTS", "MODEL"
    );
    for c in collections {
        println!(
            "{:<32} {:>9}  {:<20} {}",
            c.name, c.documents, c.embedding_model, c.created_at
        );
    }
    Ok(())
}
