//! Directory ingestion.
//!
//! Scans one directory level for accepted text files, reads each file whole,
//! assigns one id per file and bulk-loads the batch into a collection:
//!
//! ```text
//! collect_accepted_files → read (UTF-8) → assign ids → build_batch → store.add
//! ```
//!
//! The batch is validated before anything is written; a count mismatch or a
//! duplicate id aborts the whole run.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use collection_harness_core::collection::build_batch;
use collection_harness_core::models::{Document, ACCEPTED_EXTENSIONS};
use collection_harness_core::store::DocumentStore;
use collection_harness_core::{Error, Result};

use crate::config::{Config, IdStrategy};
use crate::sqlite_store::SqliteStore;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub collection: String,
    /// Accepted files found in the directory.
    pub files: usize,
    pub added: usize,
    /// Files whose content id was already stored (content strategy only).
    pub skipped: usize,
}

/// Immediate children of `dir` whose names end with an accepted suffix,
/// sorted by file name.
pub fn collect_accepted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let metadata = std::fs::metadata(dir).map_err(|e| Error::from_io(e, dir))?;
    if !metadata.is_dir() {
        return Err(Error::Validation(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            match e.into_io_error() {
                Some(io) => Error::from_io(io, &path),
                None => Error::Validation(format!("cannot scan {}", path.display())),
            }
        })?;

        let accepted = entry
            .file_name()
            .to_str()
            .is_some_and(|name| ACCEPTED_EXTENSIONS.iter().any(|ext| name.ends_with(ext)));
        if !accepted {
            continue;
        }

        // Only links with an accepted name are resolved; dangling ones are skipped.
        let is_file = if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(target) => target.is_file(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %entry.path().display(), "skipping dangling symlink");
                    false
                }
                Err(e) => return Err(Error::from_io(e, entry.path())),
            }
        } else {
            entry.file_type().is_file()
        };
        if is_file {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// A fresh time-ordered id.
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// A stable id for `text` read from a file called `file_name`.
pub fn content_id(file_name: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &hasher.finalize()).to_string()
}

/// Load every accepted file in `dir` into `collection_name`.
pub async fn ingest(
    store: &dyn DocumentStore,
    collection_name: &str,
    dir: &Path,
    strategy: IdStrategy,
) -> Result<IngestReport> {
    let files = collect_accepted_files(dir)?;
    debug!(dir = %dir.display(), files = files.len(), "scanned directory");

    let mut ids = Vec::with_capacity(files.len());
    let mut texts = Vec::with_capacity(files.len());
    for path in &files {
        let text = std::fs::read_to_string(path).map_err(|e| Error::from_io(e, path))?;
        let id = match strategy {
            IdStrategy::Fresh => generate_id(),
            IdStrategy::Content => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                content_id(&name, &text)
            }
        };
        ids.push(id);
        texts.push(text);
    }

    let mut batch: Vec<Document> = build_batch(ids, texts)?
        .into_iter()
        .zip(&files)
        .map(|(doc, path)| doc.with_source(path.display().to_string()))
        .collect();

    let collection = store.get_or_create_collection(collection_name).await?;

    let mut skipped = 0;
    if strategy == IdStrategy::Content && !batch.is_empty() {
        let ids: Vec<String> = batch.iter().map(|d| d.id.clone()).collect();
        let present = store.existing_ids(&collection, &ids).await?;
        if !present.is_empty() {
            batch.retain(|d| !present.contains(&d.id));
            skipped = present.len();
            debug!(skipped, "skipping documents already in collection");
        }
    }

    store.add(&collection, &batch).await?;

    let report = IngestReport {
        collection: collection.name,
        files: files.len(),
        added: batch.len(),
        skipped,
    };
    info!(
        collection = %report.collection,
        files = report.files,
        added = report.added,
        skipped = report.skipped,
        "ingestion complete"
    );
    Ok(report)
}

/// `colh ingest` entry point.
pub async fn run_ingest(
    config: &Config,
    name: &str,
    dir: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    if dry_run {
        let files = collect_accepted_files(dir)?;
        println!("ingest {} (dry-run)", name);
        println!("  files found: {}", files.len());
        for file in &files {
            println!("    {}", file.display());
        }
        return Ok(());
    }

    let store = SqliteStore::open(config).await?;
    let report = ingest(&store, name, dir, config.ingest.id_strategy)
        .await
        .with_context(|| format!("Failed to ingest {}", dir.display()))?;

    println!("ingest {}", report.collection);
    println!("  files found: {}", report.files);
    println!("  documents added: {}", report.added);
    if report.skipped > 0 {
        println!("  already present: {}", report.skipped);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_harness_core::store::memory::InMemoryStore;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn write_files(dir: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_collect_filters_by_suffix() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[
                ("a.md", "a"),
                ("b.pdf", "b"),
                ("c.txt", "c"),
                ("d.MD", "d"),
                ("e.html", "e"),
                ("f.mkd", "f"),
                ("g.text", "g"),
                ("notes", "h"),
            ],
        );
        fs::create_dir(tmp.path().join("sub.md")).unwrap();
        fs::write(tmp.path().join("sub.md").join("deep.md"), "deep").unwrap();

        let files = collect_accepted_files(tmp.path()).unwrap();
        assert_eq!(
            names(&files),
            vec!["a.md", "c.txt", "e.html", "f.mkd", "g.text"]
        );
    }

    #[test]
    fn test_collect_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let err = collect_accepted_files(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_ignores_dangling_symlinks() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &[("a.md", "a"), ("real.txt", "r")]);
        let missing = tmp.path().join("gone");
        std::os::unix::fs::symlink(&missing, tmp.path().join("stale.bak")).unwrap();
        std::os::unix::fs::symlink(&missing, tmp.path().join("stale.md")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("link.txt"))
            .unwrap();

        let files = collect_accepted_files(tmp.path()).unwrap();
        assert_eq!(names(&files), vec!["a.md", "link.txt", "real.txt"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ingest_survives_dangling_symlink() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &[("a.md", "alpha")]);
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("stale.bak"))
            .unwrap();
        let store = InMemoryStore::default();

        let report = ingest(&store, "docs", tmp.path(), IdStrategy::Fresh)
            .await
            .unwrap();
        assert_eq!(report.added, 1);
    }

    #[test]
    fn test_collect_rejects_file_path() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &[("a.md", "a")]);
        let err = collect_accepted_files(&tmp.path().join("a.md")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids: HashSet<String> = (0..100).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_content_id_is_stable() {
        assert_eq!(content_id("a.md", "hello"), content_id("a.md", "hello"));
        assert_ne!(content_id("a.md", "hello"), content_id("b.md", "hello"));
        assert_ne!(content_id("a.md", "hello"), content_id("a.md", "hello!"));
    }

    #[tokio::test]
    async fn test_ingest_one_document_per_file() {
        let tmp = TempDir::new().unwrap();
        write_files(
            tmp.path(),
            &[("a.md", "alpha"), ("b.txt", "beta"), ("c.pdf", "gamma")],
        );
        let store = InMemoryStore::default();

        let report = ingest(&store, "docs", tmp.path(), IdStrategy::Fresh)
            .await
            .unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(report.added, 2);

        let collection = store.get_collection("docs").await.unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fresh_strategy_duplicates_on_rerun() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &[("a.md", "alpha")]);
        let store = InMemoryStore::default();

        ingest(&store, "docs", tmp.path(), IdStrategy::Fresh).await.unwrap();
        ingest(&store, "docs", tmp.path(), IdStrategy::Fresh).await.unwrap();

        let collection = store.get_collection("docs").await.unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_content_strategy_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &[("a.md", "alpha"), ("b.md", "beta")]);
        let store = InMemoryStore::default();

        ingest(&store, "docs", tmp.path(), IdStrategy::Content).await.unwrap();
        let report = ingest(&store, "docs", tmp.path(), IdStrategy::Content)
            .await
            .unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.skipped, 2);

        let collection = store.get_collection("docs").await.unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_dir_creates_collection() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::default();

        let report = ingest(&store, "empty", tmp.path(), IdStrategy::Fresh)
            .await
            .unwrap();
        assert_eq!(report.added, 0);
        assert!(store.get_collection("empty").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_utf8_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let store = InMemoryStore::default();

        let err = ingest(&store, "docs", tmp.path(), IdStrategy::Fresh)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m.contains("bad.txt")));
        assert!(store.get_collection("docs").await.is_err());
    }
}
