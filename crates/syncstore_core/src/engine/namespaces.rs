//! Committed engine state.

use super::record::LogOp;
use crate::error::{StoreError, StoreResult};
use std::collections::BTreeMap;

/// Entries of one namespace, in byte-sorted key order.
pub type Namespace = BTreeMap<String, Vec<u8>>;

/// All namespaces of a store.
#[derive(Debug, Default, Clone)]
pub(crate) struct Namespaces {
    map: BTreeMap<String, Namespace>,
}

impl Namespaces {
    pub(crate) fn get(&self, name: &str) -> Option<&Namespace> {
        self.map.get(name)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub(crate) fn entry_count(&self) -> u64 {
        self.map.values().map(|ns| ns.len() as u64).sum()
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Applies one operation. Used identically by recovery and commit.
    pub(crate) fn apply(&mut self, op: LogOp) -> StoreResult<()> {
        match op {
            LogOp::CreateNamespace { name } => {
                self.map.entry(name).or_default();
            }
            LogOp::DropNamespace { name } => {
                self.map.remove(&name);
            }
            LogOp::Put {
                namespace,
                key,
                value,
            } => {
                self.map
                    .get_mut(&namespace)
                    .ok_or_else(|| StoreError::NamespaceNotFound(namespace.clone()))?
                    .insert(key, value);
            }
            LogOp::Delete { namespace, key } => {
                if let Some(ns) = self.map.get_mut(&namespace) {
                    ns.remove(&key);
                }
            }
        }
        Ok(())
    }

    /// Operations that recreate this state from nothing.
    pub(crate) fn snapshot_ops(&self) -> Vec<LogOp> {
        let mut ops = Vec::new();
        for (name, entries) in &self.map {
            ops.push(LogOp::CreateNamespace { name: name.clone() });
            for (key, value) in entries {
                ops.push(LogOp::Put {
                    namespace: name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(ns: &str, key: &str) -> LogOp {
        LogOp::Put {
            namespace: ns.into(),
            key: key.into(),
            value: key.as_bytes().to_vec(),
        }
    }

    #[test]
    fn put_requires_namespace() {
        let mut state = Namespaces::default();
        assert!(matches!(
            state.apply(put("missing", "a")),
            Err(StoreError::NamespaceNotFound(_))
        ));
    }

    #[test]
    fn snapshot_recreates_state() {
        let mut state = Namespaces::default();
        state
            .apply(LogOp::CreateNamespace { name: "a".into() })
            .unwrap();
        state
            .apply(LogOp::CreateNamespace { name: "b".into() })
            .unwrap();
        state.apply(put("a", "k1")).unwrap();
        state.apply(put("a", "k2")).unwrap();

        let mut rebuilt = Namespaces::default();
        for op in state.snapshot_ops() {
            rebuilt.apply(op).unwrap();
        }
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.entry_count(), 2);
        assert!(rebuilt.get("b").unwrap().is_empty());
    }

    #[test]
    fn drop_removes_entries() {
        let mut state = Namespaces::default();
        state
            .apply(LogOp::CreateNamespace { name: "a".into() })
            .unwrap();
        state.apply(put("a", "k")).unwrap();
        state
            .apply(LogOp::DropNamespace { name: "a".into() })
            .unwrap();
        assert!(state.get("a").is_none());
        assert_eq!(state.entry_count(), 0);
    }
}
