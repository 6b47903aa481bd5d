//! Path routing.

use crate::error::{ServerError, ServerResult};
use crate::http::decode_path_segment;

/// A recognized resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/version`
    Version,
    /// `/1.5/{uid}/info/collections`
    InfoCollections {
        /// Addressed user.
        uid: u64,
    },
    /// `/1.5/{uid}/info/collection_counts`
    InfoCollectionCounts {
        /// Addressed user.
        uid: u64,
    },
    /// `/1.5/{uid}/storage/{collection}`
    Collection {
        /// Addressed user.
        uid: u64,
        /// Collection name.
        collection: String,
    },
    /// `/1.5/{uid}/storage/{collection}/{id}`
    Object {
        /// Addressed user.
        uid: u64,
        /// Collection name.
        collection: String,
        /// Object id.
        id: String,
    },
    /// `/1.5/{uid}/storage` and `/1.5/{uid}`
    Storage {
        /// Addressed user.
        uid: u64,
    },
}

impl Route {
    /// Matches a path (without query string).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::RouteNotFound`] if nothing matches.
    pub fn parse(path: &str) -> ServerResult<Self> {
        let not_found = || ServerError::RouteNotFound(path.to_string());
        let segments: Vec<&str> = path.trim_end_matches('/').split('/').skip(1).collect();

        if segments == ["version"] {
            return Ok(Self::Version);
        }
        let (version, uid, rest) = match segments.as_slice() {
            [version, uid, rest @ ..] => (*version, *uid, rest),
            _ => return Err(not_found()),
        };
        if version != "1.5" {
            return Err(not_found());
        }
        let uid = uid.parse::<u64>().map_err(|_| not_found())?;

        match rest {
            [] | ["storage"] => Ok(Self::Storage { uid }),
            ["info", "collections"] => Ok(Self::InfoCollections { uid }),
            ["info", "collection_counts"] => Ok(Self::InfoCollectionCounts { uid }),
            ["storage", collection] if !collection.is_empty() => Ok(Self::Collection {
                uid,
                collection: decode_path_segment(collection),
            }),
            ["storage", collection, id] if !collection.is_empty() && !id.is_empty() => {
                Ok(Self::Object {
                    uid,
                    collection: decode_path_segment(collection),
                    id: decode_path_segment(id),
                })
            }
            _ => Err(not_found()),
        }
    }

    /// Methods this route accepts.
    #[must_use]
    pub fn allowed_methods(&self) -> &'static [&'static str] {
        match self {
            Self::Version | Self::InfoCollections { .. } | Self::InfoCollectionCounts { .. } => {
                &["GET"]
            }
            Self::Collection { .. } => &["GET", "POST", "DELETE"],
            Self::Object { .. } => &["GET", "PUT", "DELETE"],
            Self::Storage { .. } => &["DELETE"],
        }
    }

    /// The user addressed by the path, if any.
    #[must_use]
    pub fn uid(&self) -> Option<u64> {
        match self {
            Self::Version => None,
            Self::InfoCollections { uid }
            | Self::InfoCollectionCounts { uid }
            | Self::Collection { uid, .. }
            | Self::Object { uid, .. }
            | Self::Storage { uid } => Some(*uid),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::InfoCollections { .. } => "info_collections",
            Self::InfoCollectionCounts { .. } => "info_collection_counts",
            Self::Collection { .. } => "collection",
            Self::Object { .. } => "object",
            Self::Storage { .. } => "storage",
        }
    }
}
