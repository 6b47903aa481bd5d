//! Basic Storage Objects on top of the engine.
//!
//! Each collection is one engine namespace mapping object id to the
//! CBOR-encoded [`Bso`]. A reserved metadata namespace maps collection name
//! to its [`CollectionInfo`] watermark. Every mutation updates objects and
//! watermark inside one write transaction.

use crate::config::StoreConfig;
use crate::engine::{Engine, EngineStats, OpenMode, WriteTransaction};
use crate::error::{StoreError, StoreResult};
use crate::types::{validate_collection_name, Bso, BsoInput, CollectionInfo, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Namespace holding collection watermarks. `$` is never valid in a
/// collection name, so it cannot collide.
const META_NAMESPACE: &str = "$collections";

/// Options for [`ObjectStore::list_objects`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Return full records instead of ids.
    pub full: bool,
    /// Maximum number of results. `None` or `0` means the configured cap.
    pub limit: Option<usize>,
    /// Matching entries to skip.
    pub offset: usize,
    /// Only objects modified strictly after this time.
    pub newer: Timestamp,
    /// Restrict to these ids. Disables pagination.
    pub ids: Option<Vec<String>>,
}

/// Listed objects: ids only, or full records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ListEntries {
    /// Object ids.
    Ids(Vec<String>),
    /// Full objects.
    Full(Vec<Bso>),
}

impl ListEntries {
    /// Number of listed objects.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Ids(ids) => ids.len(),
            Self::Full(objects) => objects.len(),
        }
    }

    /// Returns `true` if nothing was listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResult {
    /// The listed objects.
    pub entries: ListEntries,
    /// Offset to resume from, when more matching objects remain.
    pub next_offset: Option<usize>,
}

/// Result of a batch write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Timestamp shared by every written object.
    pub modified: Timestamp,
    /// Ids written.
    pub success: Vec<String>,
    /// Ids rejected, with the reason.
    pub failed: BTreeMap<String, String>,
}

/// A per-user object store.
#[derive(Debug)]
pub struct ObjectStore {
    engine: Engine,
}

impl ObjectStore {
    /// Opens the store of user `uid` under `root` (directory `<root>/<uid>`).
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be opened.
    pub fn open(root: &Path, uid: u64, mode: OpenMode, config: StoreConfig) -> StoreResult<Self> {
        let engine = Engine::open(&root.join(uid.to_string()), mode, config)?;
        Ok(Self { engine })
    }

    /// Creates a store held only in memory.
    ///
    /// # Errors
    ///
    /// Never fails in practice.
    pub fn in_memory(config: StoreConfig) -> StoreResult<Self> {
        Ok(Self {
            engine: Engine::in_memory(config)?,
        })
    }

    /// Wraps an already opened engine.
    #[must_use]
    pub fn from_engine(engine: Engine) -> Self {
        Self { engine }
    }

    /// Returns the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> StoreResult<EngineStats> {
        self.engine.stats()
    }

    /// Flushes and releases the store.
    pub fn close(self) -> StoreResult<()> {
        self.engine.close()
    }

    fn config(&self) -> &StoreConfig {
        self.engine.config()
    }

    // === Writes ===

    /// Creates or merges one object and advances the collection watermark.
    ///
    /// Absent fields keep their stored values. A new object without a
    /// modification time gets the current time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCollectionName`] or
    /// [`StoreError::InvalidObject`] for bad input, or an engine error.
    pub fn put_object(&self, collection: &str, input: BsoInput) -> StoreResult<Bso> {
        validate_collection_name(collection)?;
        input
            .validate(self.config().max_payload_bytes)
            .map_err(|reason| StoreError::InvalidObject {
                id: input.id.clone(),
                reason,
            })?;

        let now = Timestamp::now();
        let mut txn = self.engine.begin_write()?;
        txn.create_namespace(collection);

        let previous = read_value::<Bso>(&txn, collection, &input.id)?;
        let bso = input.merge(previous, None, now, self.config().default_ttl);
        txn.put(collection, &bso.id, encode(&bso)?)?;
        advance_watermark(&mut txn, collection, bso.modified)?;
        txn.commit()?;

        tracing::debug!(collection, id = %bso.id, modified = %bso.modified, "object stored");
        Ok(bso)
    }

    /// Writes a batch of objects atomically with one shared timestamp.
    ///
    /// Objects that fail validation are reported in
    /// [`BatchOutcome::failed`] and left out of the transaction. The
    /// watermark moves only when at least one object was written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCollectionName`] or an engine error; in
    /// the latter case nothing was written.
    pub fn put_objects(&self, collection: &str, inputs: Vec<BsoInput>) -> StoreResult<BatchOutcome> {
        validate_collection_name(collection)?;

        let now = Timestamp::now();
        let mut outcome = BatchOutcome {
            modified: now,
            ..BatchOutcome::default()
        };

        let mut txn = self.engine.begin_write()?;
        txn.create_namespace(collection);

        for input in inputs {
            if let Err(reason) = input.validate(self.config().max_payload_bytes) {
                outcome.failed.insert(input.id, reason);
                continue;
            }
            let previous = read_value::<Bso>(&txn, collection, &input.id)?;
            let bso = input.merge(previous, Some(now), now, self.config().default_ttl);
            txn.put(collection, &bso.id, encode(&bso)?)?;
            if !outcome.success.contains(&bso.id) {
                outcome.success.push(bso.id);
            }
        }

        if outcome.success.is_empty() {
            txn.abort();
        } else {
            outcome.modified = advance_watermark(&mut txn, collection, now)?;
            txn.commit()?;
        }

        tracing::debug!(
            collection,
            written = outcome.success.len(),
            rejected = outcome.failed.len(),
            "batch stored"
        );
        Ok(outcome)
    }

    // === Reads ===

    /// Fetches one object.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ObjectNotFound`] if the collection or the id
    /// does not exist.
    pub fn get_object(&self, collection: &str, id: &str) -> StoreResult<Bso> {
        validate_collection_name(collection)?;
        let read = self.engine.begin_read();
        let bytes = read
            .get(collection, id)
            .ok_or_else(|| StoreError::object_not_found(collection, id))?;
        decode(bytes)
    }

    /// Lists objects modified after `options.newer`.
    ///
    /// With `options.ids` the result is the matching subset of those ids and
    /// no pagination applies. Otherwise objects are visited in id order,
    /// `offset` matches are skipped and at most `limit` returned; if more
    /// matches remain, [`ListResult::next_offset`] is `offset + limit`.
    /// A missing collection lists as empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCollectionName`] or a decoding error.
    pub fn list_objects(&self, collection: &str, options: &ListOptions) -> StoreResult<ListResult> {
        validate_collection_name(collection)?;

        let cap = self.config().max_list_limit;
        let limit = match options.limit {
            None | Some(0) => cap,
            Some(limit) => limit.min(cap),
        };

        let read = self.engine.begin_read();
        let mut matched = Vec::new();
        let mut next_offset = None;

        if let Some(namespace) = read.namespace(collection) {
            match &options.ids {
                Some(ids) => {
                    for id in ids {
                        if let Some(bytes) = namespace.get(id) {
                            let bso: Bso = decode(bytes)?;
                            if bso.modified > options.newer {
                                matched.push(bso);
                            }
                        }
                    }
                }
                None => {
                    let mut skipped = 0;
                    for bytes in namespace.values() {
                        let bso: Bso = decode(bytes)?;
                        if bso.modified <= options.newer {
                            continue;
                        }
                        if skipped < options.offset {
                            skipped += 1;
                            continue;
                        }
                        if matched.len() == limit {
                            next_offset = Some(options.offset + limit);
                            break;
                        }
                        matched.push(bso);
                    }
                }
            }
        }

        let entries = if options.full {
            ListEntries::Full(matched)
        } else {
            ListEntries::Ids(matched.into_iter().map(|bso| bso.id).collect())
        };
        Ok(ListResult {
            entries,
            next_offset,
        })
    }

    /// Returns every collection with its watermark.
    pub fn collections_info(&self) -> StoreResult<BTreeMap<String, Timestamp>> {
        let read = self.engine.begin_read();
        let Some(meta) = read.namespace(META_NAMESPACE) else {
            return Ok(BTreeMap::new());
        };
        meta.iter()
            .map(|(name, bytes)| {
                let info: CollectionInfo = decode(bytes)?;
                Ok((name.clone(), info.last_modified))
            })
            .collect()
    }

    /// Returns the metadata of one collection, if it exists.
    pub fn collection_info(&self, collection: &str) -> StoreResult<Option<CollectionInfo>> {
        validate_collection_name(collection)?;
        let read = self.engine.begin_read();
        read.get(META_NAMESPACE, collection).map(decode).transpose()
    }

    /// Returns the number of objects in every collection.
    pub fn collection_counts(&self) -> StoreResult<BTreeMap<String, usize>> {
        let read = self.engine.begin_read();
        Ok(read
            .namespace_names()
            .into_iter()
            .filter(|name| name != META_NAMESPACE)
            .map(|name| {
                let count = read.namespace(&name).map_or(0, |ns| ns.len());
                (name, count)
            })
            .collect())
    }

    /// Store-wide watermark: the largest collection watermark, or zero.
    pub fn last_modified(&self) -> StoreResult<Timestamp> {
        Ok(self
            .collections_info()?
            .into_values()
            .max()
            .unwrap_or(Timestamp::ZERO))
    }

    // === Deletes ===

    /// Deletes one object and stamps the collection watermark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ObjectNotFound`] if the object does not exist.
    pub fn delete_object(&self, collection: &str, id: &str) -> StoreResult<Timestamp> {
        validate_collection_name(collection)?;
        let mut txn = self.engine.begin_write()?;
        if !txn.delete(collection, id) {
            return Err(StoreError::object_not_found(collection, id));
        }
        let modified = advance_watermark(&mut txn, collection, Timestamp::now())?;
        txn.commit()?;
        Ok(modified)
    }

    /// Deletes the listed ids that exist and stamps the collection watermark,
    /// even when some ids were absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionNotFound`] if the collection does not exist.
    pub fn delete_objects(&self, collection: &str, ids: &[String]) -> StoreResult<Timestamp> {
        validate_collection_name(collection)?;
        let mut txn = self.engine.begin_write()?;
        if !txn.contains_namespace(collection) {
            return Err(StoreError::collection_not_found(collection));
        }
        let deleted = ids.iter().filter(|id| txn.delete(collection, id)).count();
        let modified = advance_watermark(&mut txn, collection, Timestamp::now())?;
        txn.commit()?;

        tracing::debug!(collection, requested = ids.len(), deleted, "objects deleted");
        Ok(modified)
    }

    /// Deletes a collection with its metadata.
    ///
    /// Returns the largest watermark among the remaining collections, or
    /// zero when none remain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionNotFound`] if there is no metadata
    /// namespace or the collection does not exist.
    pub fn delete_collection(&self, collection: &str) -> StoreResult<Timestamp> {
        validate_collection_name(collection)?;
        let mut txn = self.engine.begin_write()?;
        if !txn.contains_namespace(META_NAMESPACE) {
            return Err(StoreError::collection_not_found(collection));
        }
        let had_meta = txn.delete(META_NAMESPACE, collection);
        let had_namespace = txn.drop_namespace(collection);
        if !had_meta && !had_namespace {
            return Err(StoreError::collection_not_found(collection));
        }

        let mut remaining = Timestamp::ZERO;
        for name in txn.keys(META_NAMESPACE) {
            if let Some(info) = read_value::<CollectionInfo>(&txn, META_NAMESPACE, &name)? {
                remaining = remaining.max(info.last_modified);
            }
        }
        txn.commit()?;

        tracing::debug!(collection, %remaining, "collection deleted");
        Ok(remaining)
    }

    /// Deletes every collection and all metadata, then compacts the log.
    /// The store stays open and empty.
    pub fn delete_storage(&self) -> StoreResult<()> {
        let mut txn = self.engine.begin_write()?;
        for name in txn.namespace_names() {
            txn.drop_namespace(&name);
        }
        txn.commit()?;
        self.engine.compact()?;
        tracing::debug!("storage deleted");
        Ok(())
    }
}

/// Moves the collection watermark forward to `modified`, never backwards.
fn advance_watermark(
    txn: &mut WriteTransaction<'_>,
    collection: &str,
    modified: Timestamp,
) -> StoreResult<Timestamp> {
    txn.create_namespace(META_NAMESPACE);
    let current = read_value::<CollectionInfo>(txn, META_NAMESPACE, collection)?
        .map_or(Timestamp::ZERO, |info| info.last_modified);
    let last_modified = current.max(modified);
    txn.put(
        META_NAMESPACE,
        collection,
        encode(&CollectionInfo { last_modified })?,
    )?;
    Ok(last_modified)
}

fn read_value<T: DeserializeOwned>(
    txn: &WriteTransaction<'_>,
    namespace: &str,
    key: &str,
) -> StoreResult<Option<T>> {
    txn.get(namespace, key).map(|bytes| decode(&bytes)).transpose()
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|e| StoreError::Encoding(e.to_string()))?;
    Ok(out)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    ciborium::from_reader(bytes)
        .map_err(|e| StoreError::corrupted(format!("undecodable stored value: {e}")))
}
