//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod sign;
pub mod token;

use std::path::{Path, PathBuf};

/// Directory of a user's store, failing if it holds no log.
pub fn existing_store(root: &Path, uid: u64) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dir = root.join(uid.to_string());
    if !dir.join("objects.log").exists() {
        return Err(format!("no store for user {uid} under {}", root.display()).into());
    }
    Ok(dir)
}
