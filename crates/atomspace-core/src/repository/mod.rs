//! # Savable Repositories
//!
//! Extension point letting independent subsystems keep their own state in
//! the same snapshot as the atoms.
//!
//! A repository writes an opaque payload on save and reads it back on load,
//! together with the old-to-new [`HandleMap`] so it can translate any
//! handles it holds. The registry only keeps a `Weak` reference: the
//! subsystem that registered a repository owns it.
//!
//! ```text
//! RepositorySection := ( name:Str len:u64 bytes[len] )* Sentinel
//! Sentinel          := Str of length 0
//! ```

mod handle_set;

pub use handle_set::HandleSetRepository;

use crate::formats::{RecordReader, RecordWriter};
use crate::{HandleMap, PersistError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::rc::{Rc, Weak};

// =============================================================================
// SAVABLE REPOSITORY TRAIT
// =============================================================================

/// State persisted inside a snapshot by a subsystem other than the store.
pub trait SavableRepository {
    /// Stable, unique name tagging this repository's payload in the file.
    fn name(&self) -> &str;

    /// Write the payload.
    fn save_repository(&self, sink: &mut dyn Write) -> Result<(), PersistError>;

    /// Read the payload written by `save_repository`.
    ///
    /// `source` yields exactly the bytes this repository wrote. `handles`
    /// is complete: every atom of the snapshot has been re-created.
    fn load_repository(
        &mut self,
        source: &mut dyn Read,
        handles: &HandleMap,
    ) -> Result<(), PersistError>;

    /// Reset to the empty state.
    fn clear(&mut self);
}

/// How owners share a repository with the registry.
pub type SharedRepository = Rc<RefCell<dyn SavableRepository>>;

// =============================================================================
// REGISTRY
// =============================================================================

/// Name-keyed, non-owning set of repositories.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    repositories: BTreeMap<String, Weak<RefCell<dyn SavableRepository>>>,
}

impl RepositoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository under its own name.
    pub fn add(&mut self, repository: &SharedRepository) -> Result<(), PersistError> {
        let name = repository
            .try_borrow()
            .map_err(|_| PersistError::invalid_usage("repository is mutably borrowed"))?
            .name()
            .to_string();
        if name.is_empty() {
            return Err(PersistError::invalid_usage("repository name must not be empty"));
        }

        self.prune();
        if self.repositories.contains_key(&name) {
            return Err(PersistError::DuplicateRepository(name));
        }
        tracing::debug!(repository = %name, "registered savable repository");
        self.repositories.insert(name, Rc::downgrade(repository));
        Ok(())
    }

    /// Unregister by name. Returns whether a registration was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.repositories.remove(name).is_some()
    }

    /// Names of live registrations, in save order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.repositories
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Drop registrations whose owner released the repository.
    fn prune(&mut self) {
        self.repositories.retain(|name, weak| {
            let alive = weak.strong_count() > 0;
            if !alive {
                tracing::warn!(repository = %name, "dropping registration of released repository");
            }
            alive
        });
    }

    fn live(&self, name: &str) -> Option<SharedRepository> {
        self.repositories.get(name).and_then(Weak::upgrade)
    }

    /// Reset every live repository.
    ///
    /// A repository borrowed elsewhere cannot be reset; the others are still
    /// cleared and the first busy one is reported.
    pub fn clear_all(&mut self) -> Result<(), PersistError> {
        let mut busy = None;
        for (name, weak) in &self.repositories {
            let Some(repository) = weak.upgrade() else {
                continue;
            };
            match repository.try_borrow_mut() {
                Ok(mut repository) => repository.clear(),
                Err(_) => {
                    tracing::warn!(repository = %name, "repository is borrowed; not cleared");
                    if busy.is_none() {
                        busy = Some(name.clone());
                    }
                }
            }
        }
        match busy {
            Some(name) => Err(PersistError::invalid_usage(format!(
                "repository {} is borrowed and cannot be cleared",
                name
            ))),
            None => Ok(()),
        }
    }

    /// Write every live repository's payload, then the sentinel.
    ///
    /// Returns the names written.
    pub fn save_all<W: Write>(
        &mut self,
        writer: &mut RecordWriter<W>,
    ) -> Result<Vec<String>, PersistError> {
        self.prune();
        let mut written = Vec::new();
        for (name, weak) in &self.repositories {
            let Some(repository) = weak.upgrade() else {
                continue;
            };
            let repository = repository.try_borrow().map_err(|_| {
                PersistError::invalid_usage(format!("repository {} is mutably borrowed", name))
            })?;

            let mut payload = Vec::new();
            repository.save_repository(&mut payload)?;

            writer.write_str(name)?;
            writer.write_u64(payload.len() as u64)?;
            writer.write_bytes(&payload)?;
            tracing::debug!(repository = %name, bytes = payload.len(), "saved repository");
            written.push(name.clone());
        }
        writer.write_str("")?;
        Ok(written)
    }

    /// Read repository payloads up to the sentinel (or a clean end of file)
    /// and hand each to its registered repository.
    ///
    /// Returns the names loaded.
    pub fn load_all<R: Read>(
        &mut self,
        reader: &mut RecordReader<R>,
        handles: &HandleMap,
    ) -> Result<Vec<String>, PersistError> {
        let mut loaded = Vec::new();
        while let Some(name) = reader.read_str_or_eof()? {
            if name.is_empty() {
                break;
            }
            let len = reader.read_u64()?;
            let repository = self
                .live(&name)
                .ok_or_else(|| PersistError::UnknownRepository(name.clone()))?;
            let payload = reader.read_bytes(len)?;

            let mut repository = repository.try_borrow_mut().map_err(|_| {
                PersistError::invalid_usage(format!("repository {} is already borrowed", name))
            })?;
            let mut source = payload.as_slice();
            repository.load_repository(&mut source, handles)?;
            if !source.is_empty() {
                tracing::warn!(
                    repository = %name,
                    unread = source.len(),
                    "repository left part of its payload unread"
                );
            }
            tracing::debug!(repository = %name, bytes = len, "loaded repository");
            loaded.push(name);
        }
        Ok(loaded)
    }
}

// =============================================================================
// TESTS
// =============================================================================
