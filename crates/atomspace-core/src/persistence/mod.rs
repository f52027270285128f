//! # Saving and Loading
//!
//! `SavingLoading` writes a whole store to a snapshot and rebuilds an
//! isomorphic store from one, under freshly assigned handles.
//!
//! Section order on disk:
//! header, type table, nodes, links, indices, repositories, sentinel.
//!
//! Neither direction is atomic. A failed save may leave a truncated file;
//! a failed load leaves the target store partially populated.

mod loading;
mod progress;
mod saving;

pub use progress::{Phase, Progress, ProgressHook};

use crate::formats::{RecordReader, RecordWriter};
use crate::repository::{RepositoryRegistry, SharedRepository};
use crate::{AtomStore, PersistError};
use progress::ProgressReporter;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// What a save wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub types: usize,
    pub nodes: usize,
    pub links: usize,
    pub indices: usize,
    /// Repository names in the order they were written.
    pub repositories: Vec<String>,
    /// Size of the image in bytes.
    pub bytes: u64,
}

/// What a load read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub types: usize,
    pub nodes: usize,
    pub links: usize,
    /// Saved indices the target store accepted.
    pub indices_restored: usize,
    pub repositories: Vec<String>,
    /// Entries in the old-to-new handle map when the load finished.
    pub mapped: usize,
}

/// Persistence context: repository registrations plus progress settings.
#[derive(Debug, Default)]
pub struct SavingLoading {
    repositories: RepositoryRegistry,
    progress: ProgressReporter,
}

impl SavingLoading {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report progress every `interval` records (minimum 1).
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress.set_interval(interval);
        self
    }

    #[must_use]
    pub fn with_progress_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Progress) + 'static,
    {
        self.progress.set_hook(Box::new(hook));
        self
    }

    // -------------------------------------------------------------------------
    // Repositories
    // -------------------------------------------------------------------------

    /// Register a repository. The context keeps only a weak reference.
    pub fn add_savable_repository(
        &mut self,
        repository: &SharedRepository,
    ) -> Result<(), PersistError> {
        self.repositories.add(repository)
    }

    /// Unregister a repository. Returns whether it was registered.
    pub fn remove_savable_repository(&mut self, name: &str) -> bool {
        self.repositories.remove(name)
    }

    /// Live registrations in the order their payloads are written.
    #[must_use]
    pub fn repository_names(&self) -> Vec<String> {
        self.repositories.names()
    }

    /// Reset every registered repository to its empty state.
    pub fn clear_repositories(&mut self) -> Result<(), PersistError> {
        self.repositories.clear_all()
    }

    // -------------------------------------------------------------------------
    // Save
    // -------------------------------------------------------------------------

    /// Write a snapshot of `store` to `path`, replacing any existing file.
    pub fn save<S>(&mut self, path: impl AsRef<Path>, store: &S) -> Result<SaveSummary, PersistError>
    where
        S: AtomStore + ?Sized,
    {
        let path = path.as_ref();
        let file = File::create(path)?;
        let summary = self.save_to_writer(BufWriter::new(file), store)?;
        tracing::info!(
            path = %path.display(),
            bytes = summary.bytes,
            "snapshot saved"
        );
        Ok(summary)
    }

    /// Write a snapshot to any sink. The sink is flushed before returning.
    pub fn save_to_writer<W, S>(&mut self, sink: W, store: &S) -> Result<SaveSummary, PersistError>
    where
        W: Write,
        S: AtomStore + ?Sized,
    {
        let mut writer = RecordWriter::new(sink);
        saving::write_snapshot(&mut writer, store, &mut self.repositories, &mut self.progress)
    }

    // -------------------------------------------------------------------------
    // Load
    // -------------------------------------------------------------------------

    /// Rebuild the snapshot at `path` into `store`, which must be empty.
    pub fn load<S>(&mut self, path: impl AsRef<Path>, store: &mut S) -> Result<LoadSummary, PersistError>
    where
        S: AtomStore + ?Sized,
    {
        let path = path.as_ref();
        self.begin_load(store)?;
        let file = File::open(path)?;
        tracing::info!(path = %path.display(), "loading snapshot");
        self.read_records(BufReader::new(file), store)
    }

    /// Rebuild a snapshot read from any source into `store`, which must be
    /// empty. Registered repositories are cleared first, even if the load
    /// then fails.
    pub fn load_from_reader<R, S>(&mut self, source: R, store: &mut S) -> Result<LoadSummary, PersistError>
    where
        R: Read,
        S: AtomStore + ?Sized,
    {
        self.begin_load(store)?;
        self.read_records(source, store)
    }

    /// Runs before anything is read: clear repositories, require an empty
    /// store.
    fn begin_load<S: AtomStore + ?Sized>(&mut self, store: &S) -> Result<(), PersistError> {
        self.clear_repositories()?;
        if !store.is_empty() {
            return Err(PersistError::NotEmpty(store.atom_count()));
        }
        Ok(())
    }

    fn read_records<R, S>(&mut self, source: R, store: &mut S) -> Result<LoadSummary, PersistError>
    where
        R: Read,
        S: AtomStore + ?Sized,
    {
        let mut reader = RecordReader::new(source);
        loading::read_snapshot(&mut reader, store, &mut self.repositories, &mut self.progress)
    }
}

// =============================================================================
// TESTS
// =============================================================================
