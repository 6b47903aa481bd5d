//! Inspect command implementation.

use super::existing_store;
use serde::Serialize;
use std::path::Path;
use syncstore_core::{ObjectStore, OpenMode};
use syncstore_server::ServerConfig;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store directory.
    pub path: String,
    /// User id.
    pub uid: u64,
    /// Log size in bytes.
    pub log_bytes: u64,
    /// Operations recorded in the log.
    pub log_ops: u64,
    /// Number of engine namespaces (collections plus metadata).
    pub namespaces: usize,
    /// Entries across all namespaces.
    pub entries: u64,
    /// Latest watermark across collections, in seconds.
    pub last_modified: f64,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Number of objects.
    pub objects: usize,
    /// Watermark, in seconds.
    pub last_modified: f64,
}

/// Runs the inspect command.
pub fn run(
    root: &Path,
    uid: u64,
    config: &ServerConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(root, uid, config)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Collects statistics for one user's store without taking the writer lock.
pub fn inspect(
    root: &Path,
    uid: u64,
    config: &ServerConfig,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let dir = existing_store(root, uid)?;
    let store = ObjectStore::open(root, uid, OpenMode::ReadOnly, config.store.clone())?;

    let stats = store.stats()?;
    let counts = store.collection_counts()?;
    let collections = store
        .collections_info()?
        .into_iter()
        .map(|(name, modified)| CollectionStats {
            objects: counts.get(&name).copied().unwrap_or(0),
            last_modified: modified.as_seconds(),
            name,
        })
        .collect();

    let result = InspectResult {
        path: dir.display().to_string(),
        uid,
        log_bytes: stats.log_bytes,
        log_ops: stats.log_ops,
        namespaces: stats.namespaces,
        entries: stats.entries,
        last_modified: store.last_modified()?.as_seconds(),
        collections,
    };
    store.close()?;
    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("Store: {} (user {})", result.path, result.uid);
    println!();
    println!("Log:");
    println!("  Size:        {} bytes", result.log_bytes);
    println!("  Operations:  {}", result.log_ops);
    println!("  Namespaces:  {}", result.namespaces);
    println!("  Entries:     {}", result.entries);
    println!();
    println!("Collections (last modified {:.2}):", result.last_modified);
    if result.collections.is_empty() {
        println!("  (none)");
    }
    for collection in &result.collections {
        println!(
            "  {:<24} {:>8} objects   {:.2}",
            collection.name, collection.objects, collection.last_modified
        );
    }
}
