//! Error types for the object store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist (or its collection does not).
    #[error("object not found: {collection}/{id}")]
    ObjectNotFound {
        /// Collection that was searched.
        collection: String,
        /// Requested object id.
        id: String,
    },

    /// The collection does not exist.
    #[error("collection not found: {collection}")]
    CollectionNotFound {
        /// Name of the collection.
        collection: String,
    },

    /// The collection name is not acceptable.
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// An object failed validation.
    #[error("invalid object {id:?}: {reason}")]
    InvalidObject {
        /// Object id as supplied.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A write was attempted through a read-only handle.
    #[error("store was opened read-only")]
    ReadOnly,

    /// A failed commit could not be rolled back out of the log; the handle
    /// refuses further writes.
    #[error("store is poisoned by a failed rollback")]
    Poisoned,

    /// An engine operation referenced a namespace that does not exist.
    #[error("namespace not found: {0}")]
    NamespaceNotFound(String),

    /// The log or a stored value could not be decoded.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// CBOR encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] syncstore_storage::StorageError),

    /// I/O error (directory handling, locking, compaction).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an object-not-found error.
    pub fn object_not_found(collection: &str, id: &str) -> Self {
        Self::ObjectNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Creates a collection-not-found error.
    pub fn collection_not_found(collection: &str) -> Self {
        Self::CollectionNotFound {
            collection: collection.to_string(),
        }
    }

    /// Returns true for either not-found variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ObjectNotFound { .. } | StoreError::CollectionNotFound { .. }
        )
    }

    /// Returns true if the caller supplied something unacceptable.
    pub fn is_client_error(&self) -> bool {
        self.is_not_found()
            || matches!(
                self,
                StoreError::InvalidCollectionName(_) | StoreError::InvalidObject { .. }
            )
    }

    /// Returns true for engine faults (the caller cannot fix these).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}
