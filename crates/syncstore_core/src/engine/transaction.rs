//! Scoped read and write transactions.

use super::namespaces::{Namespace, Namespaces};
use super::record::LogOp;
use super::Engine;
use crate::error::{StoreError, StoreResult};
use parking_lot::{MutexGuard, RwLockReadGuard};
use std::collections::{BTreeMap, BTreeSet};

/// A consistent, read-only view of committed state.
///
/// Holds the engine's state lock in shared mode: commits wait until every
/// open read transaction has been dropped.
pub struct ReadTransaction<'a> {
    state: RwLockReadGuard<'a, Namespaces>,
}

impl<'a> ReadTransaction<'a> {
    pub(super) fn new(state: RwLockReadGuard<'a, Namespaces>) -> Self {
        Self { state }
    }

    /// Returns a namespace, if it exists.
    #[must_use]
    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.state.get(name)
    }

    /// Returns whether a namespace exists.
    #[must_use]
    pub fn contains_namespace(&self, name: &str) -> bool {
        self.state.get(name).is_some()
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.state
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .map(Vec::as_slice)
    }

    /// Names of all namespaces, in sorted order.
    #[must_use]
    pub fn namespace_names(&self) -> Vec<String> {
        self.state.names().map(str::to_owned).collect()
    }
}

/// Pending changes to one namespace.
#[derive(Default)]
struct PendingNamespace {
    /// Created in this transaction: committed entries, if any, are hidden.
    fresh: bool,
    /// Per-key changes. `None` marks a deletion.
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

/// A pending write transaction.
///
/// Holds the engine's single writer lock for its lifetime. Mutations are
/// visible to this transaction's own reads but to nobody else until
/// [`commit`](Self::commit). Dropping without committing aborts.
pub struct WriteTransaction<'a> {
    engine: &'a Engine,
    _writer: MutexGuard<'a, ()>,
    /// Namespaces touched by this transaction. `None` marks a drop.
    overlay: BTreeMap<String, Option<PendingNamespace>>,
    ops: Vec<LogOp>,
}

impl<'a> WriteTransaction<'a> {
    pub(super) fn new(engine: &'a Engine, writer: MutexGuard<'a, ()>) -> Self {
        Self {
            engine,
            _writer: writer,
            overlay: BTreeMap::new(),
            ops: Vec::new(),
        }
    }

    /// Returns whether a namespace exists, including pending changes.
    #[must_use]
    pub fn contains_namespace(&self, name: &str) -> bool {
        match self.overlay.get(name) {
            Some(pending) => pending.is_some(),
            None => self.engine.state.read().get(name).is_some(),
        }
    }

    /// Creates a namespace. Does nothing if it already exists.
    pub fn create_namespace(&mut self, name: &str) {
        if self.contains_namespace(name) {
            return;
        }
        let pending = PendingNamespace {
            fresh: true,
            writes: BTreeMap::new(),
        };
        self.overlay.insert(name.to_owned(), Some(pending));
        self.ops.push(LogOp::CreateNamespace {
            name: name.to_owned(),
        });
    }

    /// Drops a namespace with all of its entries.
    ///
    /// Returns `false` if the namespace did not exist.
    pub fn drop_namespace(&mut self, name: &str) -> bool {
        if !self.contains_namespace(name) {
            return false;
        }
        self.overlay.insert(name.to_owned(), None);
        self.ops.push(LogOp::DropNamespace {
            name: name.to_owned(),
        });
        true
    }

    /// Returns the value stored under `key`, including pending changes.
    #[must_use]
    pub fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        match self.overlay.get(namespace) {
            Some(None) => None,
            Some(Some(pending)) => match pending.writes.get(key) {
                Some(write) => write.clone(),
                None if pending.fresh => None,
                None => self.committed(namespace, key),
            },
            None => self.committed(namespace, key),
        }
    }

    /// Keys of a namespace, in sorted order, including pending changes.
    #[must_use]
    pub fn keys(&self, namespace: &str) -> Vec<String> {
        let committed = || -> BTreeSet<String> {
            self.engine
                .state
                .read()
                .get(namespace)
                .map(|ns| ns.keys().cloned().collect())
                .unwrap_or_default()
        };
        match self.overlay.get(namespace) {
            Some(None) => Vec::new(),
            Some(Some(pending)) => {
                let mut keys = if pending.fresh {
                    BTreeSet::new()
                } else {
                    committed()
                };
                for (key, write) in &pending.writes {
                    if write.is_some() {
                        keys.insert(key.clone());
                    } else {
                        keys.remove(key);
                    }
                }
                keys.into_iter().collect()
            }
            None => committed().into_iter().collect(),
        }
    }

    /// Names of all namespaces, in sorted order, including pending changes.
    #[must_use]
    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> =
            self.engine.state.read().names().map(str::to_owned).collect();
        for (name, pending) in &self.overlay {
            if pending.is_some() {
                names.insert(name.clone());
            } else {
                names.remove(name);
            }
        }
        names.into_iter().collect()
    }

    /// Inserts or replaces an entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NamespaceNotFound`] if the namespace does not exist.
    pub fn put(&mut self, namespace: &str, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let pending = self
            .pending_mut(namespace)
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.to_owned()))?;
        pending.writes.insert(key.to_owned(), Some(value.clone()));
        self.ops.push(LogOp::Put {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            value,
        });
        Ok(())
    }

    /// Removes an entry. Returns whether it existed.
    pub fn delete(&mut self, namespace: &str, key: &str) -> bool {
        if !self.contains_key(namespace, key) {
            return false;
        }
        if let Some(pending) = self.pending_mut(namespace) {
            pending.writes.insert(key.to_owned(), None);
        }
        self.ops.push(LogOp::Delete {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
        });
        true
    }

    /// Number of operations this transaction would log.
    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.ops.len()
    }

    /// Makes all changes durable and visible.
    ///
    /// A transaction without changes commits without touching the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be appended or synced. In that
    /// case no change becomes visible, now or after reopening.
    pub fn commit(self) -> StoreResult<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        self.engine.commit_ops(self.ops)
    }

    /// Discards all changes.
    pub fn abort(self) {
        tracing::trace!(ops = self.ops.len(), "write transaction aborted");
    }

    fn committed(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.engine
            .state
            .read()
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned()
    }

    fn contains_key(&self, namespace: &str, key: &str) -> bool {
        match self.overlay.get(namespace) {
            Some(None) => false,
            Some(Some(pending)) => match pending.writes.get(key) {
                Some(write) => write.is_some(),
                None => {
                    !pending.fresh
                        && self
                            .engine
                            .state
                            .read()
                            .get(namespace)
                            .is_some_and(|ns| ns.contains_key(key))
                }
            },
            None => self
                .engine
                .state
                .read()
                .get(namespace)
                .is_some_and(|ns| ns.contains_key(key)),
        }
    }

    fn pending_mut(&mut self, namespace: &str) -> Option<&mut PendingNamespace> {
        if !self.overlay.contains_key(namespace) {
            if self.engine.state.read().get(namespace).is_none() {
                return None;
            }
            self.overlay
                .insert(namespace.to_owned(), Some(PendingNamespace::default()));
        }
        self.overlay.get_mut(namespace).and_then(Option::as_mut)
    }
}
