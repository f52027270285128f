//! Named handle sets kept alongside the atoms.
//!
//! A small repository for subsystems that only need to remember groups of
//! atoms (an attentional focus, a set of query roots). The payload is a
//! `postcard` encoding of the sets; every handle is translated through the
//! load's [`HandleMap`].

use super::SavableRepository;
use crate::{Handle, HandleMap, PersistError};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Repository of named, ordered handle lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleSetRepository {
    name: String,
    sets: BTreeMap<String, Vec<Handle>>,
}

impl HandleSetRepository {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: BTreeMap::new(),
        }
    }

    /// Append a handle to the named set. Repeated handles are ignored.
    pub fn insert(&mut self, set: &str, handle: Handle) {
        let members = self.sets.entry(set.to_string()).or_default();
        if !members.contains(&handle) {
            members.push(handle);
        }
    }

    /// Members of a set in insertion order (empty if absent).
    #[must_use]
    pub fn handles(&self, set: &str) -> &[Handle] {
        self.sets.get(set).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl SavableRepository for HandleSetRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn save_repository(&self, sink: &mut dyn Write) -> Result<(), PersistError> {
        let bytes = postcard::to_stdvec(&self.sets).map_err(|e| {
            PersistError::invalid_usage(format!("cannot encode handle sets: {}", e))
        })?;
        sink.write_all(&bytes)?;
        Ok(())
    }

    fn load_repository(
        &mut self,
        source: &mut dyn Read,
        handles: &HandleMap,
    ) -> Result<(), PersistError> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        let saved: BTreeMap<String, Vec<Handle>> = postcard::from_bytes(&bytes).map_err(|e| {
            PersistError::inconsistent(format!("corrupt handle-set payload: {}", e))
        })?;

        let mut sets = BTreeMap::new();
        for (set, members) in saved {
            sets.insert(set, handles.resolve_all(&members)?);
        }
        self.sets = sets;
        Ok(())
    }

    fn clear(&mut self) {
        self.sets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_order_and_ignores_repeats() {
        let mut repo = HandleSetRepository::new("focus");
        repo.insert("attended", Handle(9));
        repo.insert("attended", Handle(2));
        repo.insert("attended", Handle(9));

        assert_eq!(repo.handles("attended"), &[Handle(9), Handle(2)]);
        assert!(repo.handles("missing").is_empty());
    }

    #[test]
    fn payload_is_remapped_on_load() {
        let mut repo = HandleSetRepository::new("focus");
        repo.insert("roots", Handle(4));
        repo.insert("roots", Handle(8));

        let mut payload = Vec::new();
        repo.save_repository(&mut payload).expect("save");

        let mut map = HandleMap::new();
        map.insert(Handle(4), Handle(1)).expect("map");
        map.insert(Handle(8), Handle(2)).expect("map");

        let mut restored = HandleSetRepository::new("focus");
        restored
            .load_repository(&mut payload.as_slice(), &map)
            .expect("load");
        assert_eq!(restored.handles("roots"), &[Handle(1), Handle(2)]);
    }

    #[test]
    fn unmapped_member_is_consistency_error() {
        let mut repo = HandleSetRepository::new("focus");
        repo.insert("roots", Handle(4));
        let mut payload = Vec::new();
        repo.save_repository(&mut payload).expect("save");

        let mut restored = HandleSetRepository::new("focus");
        let err = restored
            .load_repository(&mut payload.as_slice(), &HandleMap::new())
            .expect_err("unmapped");
        assert_eq!(err.kind(), crate::ErrorKind::Consistency);
    }

    #[test]
    fn garbage_payload_rejected() {
        let mut restored = HandleSetRepository::new("focus");
        let garbage: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let err = restored
            .load_repository(&mut &garbage[..], &HandleMap::new())
            .expect_err("garbage");
        assert_eq!(err.kind(), crate::ErrorKind::Consistency);
    }
}
