//! Compact command implementation.

use super::existing_store;
use std::path::Path;
use syncstore_core::{EngineStats, ObjectStore, OpenMode};
use syncstore_server::ServerConfig;

/// Compacts one user's store, returning statistics before and after.
pub fn compact(
    root: &Path,
    uid: u64,
    config: &ServerConfig,
) -> Result<(EngineStats, EngineStats), Box<dyn std::error::Error>> {
    existing_store(root, uid)?;
    let store = ObjectStore::open(root, uid, OpenMode::ReadWrite, config.store.clone())?;
    let before = store.stats()?;
    store.engine().compact()?;
    let after = store.stats()?;
    store.close()?;
    Ok((before, after))
}

/// Runs the compact command.
pub fn run(root: &Path, uid: u64, config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting store of user {uid} under {}", root.display());
    let (before, after) = compact(root, uid, config)?;

    let saved = before.log_bytes.saturating_sub(after.log_bytes);
    println!();
    println!("  Operations:  {} -> {}", before.log_ops, after.log_ops);
    println!("  Size before: {} bytes", before.log_bytes);
    println!("  Size after:  {} bytes", after.log_bytes);
    println!(
        "  Space saved: {} bytes ({:.1}%)",
        saved,
        if before.log_bytes > 0 {
            saved as f64 / before.log_bytes as f64 * 100.0
        } else {
            0.0
        }
    );
    println!("✓ Compaction complete");
    Ok(())
}
