//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use atomspace_core::{
    AtomSpace, AtomStore, GraphDump, HandleMap, LoadSummary, PersistError, SavableRepository,
    SavingLoading, SharedRepository, snapshot_digest,
};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum snapshot size accepted by `inspect` (for the digest) (2 GB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Maximum JSON dump size for import (500 MB).
const MAX_DUMP_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), PersistError> {
    let metadata = std::fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(PersistError::invalid_usage(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path, which must name an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, PersistError> {
    let canonical = path.canonicalize().map_err(|e| {
        PersistError::invalid_usage(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(PersistError::invalid_usage(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: the parent directory must exist, and an
/// existing file is only replaced with `force`.
fn validate_output_path(path: &Path, force: bool) -> Result<PathBuf, PersistError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        PersistError::invalid_usage(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(PersistError::invalid_usage(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| PersistError::invalid_usage("Output path has no filename"))?;
    let output = canonical_parent.join(filename);

    if output.exists() && !force {
        return Err(PersistError::invalid_usage(format!(
            "'{}' already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    Ok(output)
}

// =============================================================================
// RUN OPTIONS
// =============================================================================

/// Per-invocation options shared by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub progress_interval: u64,
    pub verbose: bool,
    pub json: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            progress_interval: atomspace_core::primitives::DEFAULT_PROGRESS_INTERVAL,
            verbose: false,
            json: false,
        }
    }
}

impl RunOptions {
    /// Persistence context carrying these options.
    fn context(&self) -> SavingLoading {
        let context = SavingLoading::new().with_progress_interval(self.progress_interval);
        if self.verbose {
            context.with_progress_hook(|p| {
                tracing::info!(phase = %p.phase, done = p.done, total = p.total, "{}%", p.percent());
            })
        } else {
            context
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), PersistError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| PersistError::invalid_usage(format!("Cannot render JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// OPAQUE REPOSITORIES
// =============================================================================

/// Stand-in for a repository this tool knows nothing about.
///
/// Keeps the payload verbatim so it can be reported and written back.
/// Handles inside the payload are not translated.
#[derive(Debug)]
pub struct OpaqueRepository {
    name: String,
    payload: Vec<u8>,
}

impl OpaqueRepository {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Vec::new(),
        }
    }

    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

impl SavableRepository for OpaqueRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn save_repository(&self, sink: &mut dyn Write) -> Result<(), PersistError> {
        sink.write_all(&self.payload)?;
        Ok(())
    }

    fn load_repository(
        &mut self,
        source: &mut dyn Read,
        _handles: &HandleMap,
    ) -> Result<(), PersistError> {
        self.payload.clear();
        source.read_to_end(&mut self.payload)?;
        Ok(())
    }

    fn clear(&mut self) {
        self.payload.clear();
    }
}

/// A store loaded from a snapshot, with any repositories it carried.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub store: AtomSpace,
    pub summary: LoadSummary,
    pub repositories: Vec<Rc<RefCell<OpaqueRepository>>>,
}

impl LoadedSnapshot {
    /// Register this snapshot's repositories with `context`.
    fn register(&self, context: &mut SavingLoading) -> Result<(), PersistError> {
        for repository in &self.repositories {
            let shared: SharedRepository = repository.clone();
            context.add_savable_repository(&shared)?;
        }
        Ok(())
    }
}

/// Load a snapshot whatever repositories it carries.
///
/// Each repository name the load reports as unknown is registered as an
/// [`OpaqueRepository`] and the load is retried.
pub fn load_snapshot(path: &Path, options: &RunOptions) -> Result<LoadedSnapshot, PersistError> {
    let mut repositories: Vec<Rc<RefCell<OpaqueRepository>>> = Vec::new();
    loop {
        let mut context = options.context();
        for repository in &repositories {
            let shared: SharedRepository = repository.clone();
            context.add_savable_repository(&shared)?;
        }

        let mut store = AtomSpace::new();
        match context.load(path, &mut store) {
            Ok(summary) => {
                return Ok(LoadedSnapshot {
                    store,
                    summary,
                    repositories,
                });
            }
            Err(PersistError::UnknownRepository(name))
                if repositories.iter().all(|r| r.borrow().name() != name) =>
            {
                tracing::debug!(repository = %name, "registering opaque repository");
                repositories.push(Rc::new(RefCell::new(OpaqueRepository::new(name))));
            }
            Err(e) => return Err(e),
        }
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Write an empty snapshot.
pub fn cmd_init(output: &Path, force: bool) -> Result<(), PersistError> {
    let output = validate_output_path(output, force)?;
    let summary = SavingLoading::new().save(&output, &AtomSpace::new())?;
    println!(
        "Initialized empty snapshot at {:?} ({} bytes)",
        output, summary.bytes
    );
    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryReport {
    pub name: String,
    pub bytes: usize,
}

/// Summary of one snapshot, as printed by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub path: String,
    pub bytes: u64,
    pub digest: String,
    pub types: usize,
    pub nodes: usize,
    pub links: usize,
    /// Atom count per type name.
    pub atoms_by_type: BTreeMap<String, usize>,
    pub repositories: Vec<RepositoryReport>,
}

/// Load a snapshot and describe it.
pub fn inspect_snapshot(path: &Path, options: &RunOptions) -> Result<InspectReport, PersistError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_SNAPSHOT_FILE_SIZE)?;
    let loaded = load_snapshot(&path, options)?;

    let image = std::fs::read(&path)?;
    let registry = loaded.store.type_registry();
    let mut atoms_by_type = BTreeMap::new();
    for atom in loaded.store.atoms() {
        let name = registry.name_of(atom.atom_type).unwrap_or("?").to_string();
        *atoms_by_type.entry(name).or_insert(0) += 1;
    }

    Ok(InspectReport {
        path: path.display().to_string(),
        bytes: image.len() as u64,
        digest: snapshot_digest(&image),
        types: loaded.summary.types,
        nodes: loaded.summary.nodes,
        links: loaded.summary.links,
        atoms_by_type,
        repositories: loaded
            .repositories
            .iter()
            .map(|r| {
                let r = r.borrow();
                RepositoryReport {
                    name: r.name().to_string(),
                    bytes: r.payload_len(),
                }
            })
            .collect(),
    })
}

/// Show what a snapshot contains.
pub fn cmd_inspect(path: &Path, options: &RunOptions) -> Result<(), PersistError> {
    let report = inspect_snapshot(path, options)?;

    if options.json {
        return print_json(&report);
    }

    println!("AtomSpace Snapshot");
    println!("==================");
    println!("File:    {}", report.path);
    println!("Size:    {} bytes", report.bytes);
    println!("BLAKE3:  {}", report.digest);
    println!();
    println!("Types:   {}", report.types);
    println!("Nodes:   {}", report.nodes);
    println!("Links:   {}", report.links);
    if !report.atoms_by_type.is_empty() {
        println!();
        for (name, count) in &report.atoms_by_type {
            println!("  {:<20} {}", name, count);
        }
    }
    if !report.repositories.is_empty() {
        println!();
        println!("Repositories:");
        for repository in &report.repositories {
            println!("  {:<20} {} bytes", repository.name, repository.bytes);
        }
    }

    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Convert a snapshot to a JSON dump. Repository payloads are not exported.
pub fn cmd_export(file: &Path, output: &Path, options: &RunOptions) -> Result<(), PersistError> {
    let file = validate_file_path(file)?;
    let output = validate_output_path(output, true)?;

    let loaded = load_snapshot(&file, options)?;
    if !loaded.repositories.is_empty() {
        tracing::warn!(
            repositories = loaded.repositories.len(),
            "repository payloads are not part of the JSON dump"
        );
    }

    let dump = GraphDump::from_store(&loaded.store)?;
    let data = serde_json::to_vec_pretty(&dump)
        .map_err(|e| PersistError::invalid_usage(format!("Cannot encode dump: {}", e)))?;
    std::fs::write(&output, &data)?;

    println!(
        "Exported {} atoms ({} bytes) to {:?}",
        dump.atom_count(),
        data.len(),
        output
    );
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Build a snapshot from a JSON dump.
pub fn cmd_import(
    dump: &Path,
    output: &Path,
    force: bool,
    options: &RunOptions,
) -> Result<(), PersistError> {
    let dump_path = validate_file_path(dump)?;
    validate_file_size(&dump_path, MAX_DUMP_FILE_SIZE)?;
    let output = validate_output_path(output, force)?;

    let data = std::fs::read(&dump_path)?;
    let dump: GraphDump = serde_json::from_slice(&data)
        .map_err(|e| PersistError::inconsistent(format!("Invalid dump: {}", e)))?;

    let mut store = AtomSpace::new();
    dump.into_store(&mut store)?;
    let summary = options.context().save(&output, &store)?;

    println!(
        "Imported {} nodes, {} links into {:?}",
        summary.nodes, summary.links, output
    );
    Ok(())
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub atoms: usize,
    pub mapped: usize,
    pub repositories: usize,
    pub resaved_bytes: usize,
}

/// Load a snapshot and check it end to end:
/// every atom mapped, no dangling link, and a re-saved image that
/// re-loads and re-saves to the same bytes.
pub fn verify_snapshot(path: &Path, options: &RunOptions) -> Result<VerifyReport, PersistError> {
    let path = validate_file_path(path)?;
    let loaded = load_snapshot(&path, options)?;

    let atoms = loaded.store.atom_count();
    if loaded.summary.mapped != atoms {
        return Err(PersistError::inconsistent(format!(
            "{} atoms loaded but {} handles mapped",
            atoms, loaded.summary.mapped
        )));
    }
    let dangling = loaded.store.dangling_links();
    if let Some(first) = dangling.first() {
        return Err(PersistError::inconsistent(format!(
            "{} dangling links (first: {})",
            dangling.len(),
            first.0
        )));
    }

    let mut context = options.context();
    loaded.register(&mut context)?;
    let mut first = Vec::new();
    context.save_to_writer(&mut first, &loaded.store)?;

    let mut reloaded = AtomSpace::new();
    context.load_from_reader(first.as_slice(), &mut reloaded)?;
    let mut second = Vec::new();
    context.save_to_writer(&mut second, &reloaded)?;

    if first != second {
        return Err(PersistError::inconsistent(
            "re-saved snapshot does not reproduce itself",
        ));
    }

    Ok(VerifyReport {
        atoms,
        mapped: loaded.summary.mapped,
        repositories: loaded.repositories.len(),
        resaved_bytes: first.len(),
    })
}

/// Check that a snapshot loads completely and re-saves stably.
pub fn cmd_verify(path: &Path, options: &RunOptions) -> Result<(), PersistError> {
    let report = verify_snapshot(path, options)?;

    if options.json {
        return print_json(&report);
    }

    println!("Snapshot OK");
    println!("  Atoms:        {}", report.atoms);
    println!("  Repositories: {}", report.repositories);
    println!("  Re-saved:     {} bytes", report.resaved_bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let existing = dir.path().join("g.atsp");
        std::fs::write(&existing, b"x").expect("write");

        assert!(validate_output_path(&existing, false).is_err());
        assert!(validate_output_path(&existing, true).is_ok());
    }

    #[test]
    fn output_path_needs_existing_parent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orphan = dir.path().join("missing").join("g.atsp");
        assert!(validate_output_path(&orphan, false).is_err());
    }

    #[test]
    fn input_path_must_be_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(validate_file_path(dir.path()).is_err());
    }

    #[test]
    fn opaque_repository_keeps_payload() {
        let mut repo = OpaqueRepository::new("planner");
        repo.load_repository(&mut &b"\x01\x02\x03"[..], &HandleMap::new())
            .expect("load");
        assert_eq!(repo.payload_len(), 3);

        let mut out = Vec::new();
        repo.save_repository(&mut out).expect("save");
        assert_eq!(out, b"\x01\x02\x03");

        repo.clear();
        assert_eq!(repo.payload_len(), 0);
    }
}
