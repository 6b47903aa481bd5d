//! # syncstore storage
//!
//! Byte-level storage backends underneath the per-user object log.
//!
//! Backends are **opaque append-only byte stores**. They know nothing about
//! log records, namespaces or objects; `syncstore_core` owns the format.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral stores and tests
//! - [`FileBackend`] - one file on disk per user log
//!
//! ## Example
//!
//! ```rust
//! use syncstore_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
