//! # syncstore core
//!
//! The per-user object store behind the storage server.
//!
//! This crate provides:
//! - [`engine`]: a log-structured, transactional key/value engine with
//!   isolated namespaces and scoped read/write transactions
//! - [`ObjectStore`]: Basic Storage Objects (BSOs) grouped into collections,
//!   with merge-on-update writes, paginated listing, cascading deletes and
//!   per-collection "last modified" watermarks
//!
//! One store lives in one directory per user and is opened per operation:
//!
//! ```rust,no_run
//! use syncstore_core::{BsoInput, ObjectStore, OpenMode, StoreConfig};
//! use std::path::Path;
//!
//! let store = ObjectStore::open(Path::new("/var/lib/syncstore"), 42, OpenMode::ReadWrite, StoreConfig::default())?;
//! let saved = store.put_object("bookmarks", BsoInput::new("abc").with_payload("{}"))?;
//! println!("modified at {}", saved.modified);
//! # Ok::<(), syncstore_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
pub mod engine;
mod error;
mod store;
mod types;

pub use config::StoreConfig;
pub use engine::{Engine, EngineStats, OpenMode, ReadTransaction, WriteTransaction};
pub use error::{StoreError, StoreResult};
pub use store::{BatchOutcome, ListEntries, ListOptions, ListResult, ObjectStore};
pub use types::{
    validate_collection_name, Bso, BsoInput, CollectionInfo, Timestamp, DEFAULT_TTL,
    MAX_COLLECTION_NAME_LEN, MAX_ID_LEN,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
