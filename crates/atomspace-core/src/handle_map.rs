//! # Old-to-New Handle Map
//!
//! Translation table built during one load, from the handles written in a
//! snapshot to the handles the target store assigned while re-creating the
//! atoms. It is owned by that load and dropped when the load returns.

use crate::{Handle, PersistError};
use std::collections::BTreeMap;

/// Per-load mapping from snapshot handles to freshly allocated handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleMap {
    entries: BTreeMap<Handle, Handle>,
}

impl HandleMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `old` was re-created as `new`.
    ///
    /// Each old handle may be recorded once; a second entry means the
    /// snapshot lists the same atom twice.
    pub fn insert(&mut self, old: Handle, new: Handle) -> Result<(), PersistError> {
        if !old.is_defined() {
            return Err(PersistError::inconsistent("snapshot uses the undefined handle"));
        }
        if self.entries.contains_key(&old) {
            return Err(PersistError::inconsistent(format!(
                "handle {} appears twice in snapshot",
                old.0
            )));
        }
        self.entries.insert(old, new);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, old: Handle) -> Option<Handle> {
        self.entries.get(&old).copied()
    }

    #[must_use]
    pub fn contains(&self, old: Handle) -> bool {
        self.entries.contains_key(&old)
    }

    /// Translate one handle. A miss is a consistency error.
    pub fn resolve(&self, old: Handle) -> Result<Handle, PersistError> {
        self.get(old).ok_or(PersistError::UnmappedHandle(old))
    }

    /// Translate a handle sequence, preserving order.
    pub fn resolve_all(&self, old: &[Handle]) -> Result<Vec<Handle>, PersistError> {
        old.iter().map(|h| self.resolve(*h)).collect()
    }

    /// Entries in ascending old-handle order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, Handle)> + '_ {
        self.entries.iter().map(|(old, new)| (*old, *new))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_hit_and_miss() {
        let mut map = HandleMap::new();
        map.insert(Handle(10), Handle(1)).expect("insert");

        assert_eq!(map.resolve(Handle(10)).expect("hit"), Handle(1));
        assert!(matches!(
            map.resolve(Handle(11)),
            Err(PersistError::UnmappedHandle(Handle(11)))
        ));
    }

    #[test]
    fn resolve_all_keeps_order() {
        let mut map = HandleMap::new();
        map.insert(Handle(7), Handle(2)).expect("insert");
        map.insert(Handle(3), Handle(1)).expect("insert");

        let resolved = map
            .resolve_all(&[Handle(7), Handle(3), Handle(7)])
            .expect("resolve");
        assert_eq!(resolved, vec![Handle(2), Handle(1), Handle(2)]);
    }

    #[test]
    fn duplicate_old_handle_rejected() {
        let mut map = HandleMap::new();
        map.insert(Handle(5), Handle(1)).expect("insert");

        let err = map.insert(Handle(5), Handle(2)).expect_err("duplicate");
        assert!(matches!(err, PersistError::Inconsistent(_)));
        assert_eq!(map.get(Handle(5)), Some(Handle(1)));
    }

    #[test]
    fn undefined_handle_rejected() {
        let mut map = HandleMap::new();
        assert!(map.insert(Handle::UNDEFINED, Handle(1)).is_err());
        assert!(map.is_empty());
    }
}
