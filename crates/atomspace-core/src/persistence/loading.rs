//! Reader: first pass re-creates atoms under fresh handles, second pass
//! rewrites every handle-valued field through the [`HandleMap`].

use super::LoadSummary;
use super::progress::{Phase, ProgressReporter};
use crate::formats::{AtomHeader, RecordReader};
use crate::primitives::{MAX_SECTION_COUNT, TYPE_INDEX};
use crate::repository::RepositoryRegistry;
use crate::{AtomStore, Handle, HandleMap, NamedIndex, PersistError, Type, TypeEntry, TypeKind};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

/// One row of the saved type table. `current` is `None` when this build has
/// no type of that name.
#[derive(Debug)]
struct SavedType {
    name: String,
    kind: TypeKind,
    current: Option<Type>,
}

impl SavedType {
    /// Unknown names only fail once a record or index actually uses them.
    fn current(&self) -> Result<Type, PersistError> {
        self.current
            .ok_or_else(|| PersistError::UnknownType(self.name.clone()))
    }
}

/// Saved type id to the runtime type it was matched with by name.
#[derive(Debug, Default)]
struct TypeTranslation {
    ids: BTreeMap<u16, SavedType>,
}

impl TypeTranslation {
    fn build<S: AtomStore + ?Sized>(saved: &[TypeEntry], store: &S) -> Result<Self, PersistError> {
        let registry = store.type_registry();
        let mut ids = BTreeMap::new();
        let mut names = BTreeSet::new();

        for entry in saved {
            if !names.insert(entry.name.as_str()) {
                return Err(PersistError::inconsistent(format!(
                    "type {} listed twice in type table",
                    entry.name
                )));
            }
            let current = registry.get_type(&entry.name);
            match current {
                Some(current) if registry.kind_of(current) != Some(entry.kind) => {
                    return Err(PersistError::inconsistent(format!(
                        "type {} was saved as a {:?} type",
                        entry.name, entry.kind
                    )));
                }
                Some(current) if current != entry.id => {
                    tracing::debug!(
                        type_name = %entry.name,
                        saved = entry.id.0,
                        current = current.0,
                        "renumbered atom type"
                    );
                }
                Some(_) => {}
                None => {
                    tracing::debug!(type_name = %entry.name, "saved type unknown to this build");
                }
            }
            let row = SavedType {
                name: entry.name.clone(),
                kind: entry.kind,
                current,
            };
            if ids.insert(entry.id.0, row).is_some() {
                return Err(PersistError::inconsistent(format!(
                    "type id {} listed twice in type table",
                    entry.id.0
                )));
            }
        }
        Ok(Self { ids })
    }

    /// Runtime type for a record, which must be of `expected` kind.
    fn resolve(&self, header: &AtomHeader, expected: TypeKind) -> Result<Type, PersistError> {
        let saved = self.ids.get(&header.type_id).ok_or_else(|| {
            PersistError::inconsistent(format!(
                "atom {} has type id {} missing from the type table",
                header.handle.0, header.type_id
            ))
        })?;
        if saved.kind != expected {
            return Err(PersistError::inconsistent(format!(
                "atom {} of {:?} type found among {:?} records",
                header.handle.0, saved.kind, expected
            )));
        }
        saved.current()
    }

    fn translate_key(&self, key: u64) -> Result<u64, PersistError> {
        let saved = u16::try_from(key)
            .ok()
            .and_then(|id| self.ids.get(&id))
            .ok_or_else(|| {
                PersistError::inconsistent(format!("type index keyed by unknown type id {}", key))
            })?;
        Ok(u64::from(saved.current()?.0))
    }
}

fn read_count<R: Read>(reader: &mut RecordReader<R>, section: &str) -> Result<u64, PersistError> {
    let count = reader.read_u64()?;
    if count > MAX_SECTION_COUNT {
        return Err(PersistError::inconsistent(format!(
            "{} section claims {} records",
            section, count
        )));
    }
    Ok(count)
}

/// `store` is known to be empty and repositories already cleared.
pub(super) fn read_snapshot<R, S>(
    reader: &mut RecordReader<R>,
    store: &mut S,
    repositories: &mut RepositoryRegistry,
    progress: &mut ProgressReporter,
) -> Result<LoadSummary, PersistError>
where
    R: Read,
    S: AtomStore + ?Sized,
{
    reader.read_header()?.validate()?;

    let saved_types = reader.read_type_table()?;
    let types = TypeTranslation::build(&saved_types, store)?;

    let mut handles = HandleMap::new();

    // First pass: allocate every atom, links keep their snapshot handles
    let node_total = read_count(reader, "node")?;
    tracing::info!(nodes = node_total, "reading node section");
    for done in 1..=node_total {
        let record = reader.read_node_record()?;
        let atom_type = types.resolve(&record.header, TypeKind::Node)?;
        let before = store.atom_count();
        let new = store.add_node(
            atom_type,
            &record.name,
            record.header.truth_value,
            record.header.attention_value,
        )?;
        if store.atom_count() == before {
            return Err(PersistError::inconsistent(format!(
                "node {} duplicates an earlier node record",
                record.header.handle.0
            )));
        }
        handles.insert(record.header.handle, new)?;
        progress.tick(Phase::LoadNodes, done, node_total);
    }
    progress.finish(Phase::LoadNodes, node_total);

    let link_total = read_count(reader, "link")?;
    tracing::info!(links = link_total, "reading link section");
    let mut pending = Vec::new();
    for done in 1..=link_total {
        let record = reader.read_link_record()?;
        let atom_type = types.resolve(&record.header, TypeKind::Link)?;
        let new = store.add_unresolved_link(
            atom_type,
            record.outgoing,
            record.header.truth_value,
            record.header.attention_value,
        )?;
        handles.insert(record.header.handle, new)?;
        pending.push(new);
        progress.tick(Phase::LoadLinks, done, link_total);
    }
    progress.finish(Phase::LoadLinks, link_total);

    let indices = reader.read_indices()?;

    // Second pass
    remap_links(store, &handles, &pending, progress)?;
    let indices_restored = restore_indices(store, &handles, &types, indices)?;

    let repositories = repositories.load_all(reader, &handles)?;

    tracing::info!(
        atoms = handles.len(),
        repositories = repositories.len(),
        "snapshot loaded"
    );
    Ok(LoadSummary {
        types: saved_types.len(),
        nodes: usize::try_from(node_total).unwrap_or(usize::MAX),
        links: pending.len(),
        indices_restored,
        repositories,
        mapped: handles.len(),
    })
}

/// Rewrite the outgoing set of every link created by this load.
fn remap_links<S: AtomStore + ?Sized>(
    store: &mut S,
    handles: &HandleMap,
    links: &[Handle],
    progress: &mut ProgressReporter,
) -> Result<(), PersistError> {
    let total = links.len() as u64;
    for (done, link) in (1u64..).zip(links) {
        let raw = store
            .get(*link)
            .ok_or(PersistError::AtomNotFound(*link))?
            .outgoing()
            .to_vec();
        let outgoing = handles.resolve_all(&raw)?;
        store.resolve_link(*link, outgoing)?;
        progress.tick(Phase::Remap, done, total);
    }
    progress.finish(Phase::Remap, total);
    Ok(())
}

/// Remap and install saved index lists. Returns how many the store kept.
fn restore_indices<S: AtomStore + ?Sized>(
    store: &mut S,
    handles: &HandleMap,
    types: &TypeTranslation,
    indices: Vec<NamedIndex>,
) -> Result<usize, PersistError> {
    let mut restored = 0;
    for mut index in indices {
        let by_type = index.name == TYPE_INDEX;
        for list in &mut index.lists {
            list.handles = handles.resolve_all(&list.handles)?;
            if by_type {
                list.key = types.translate_key(list.key)?;
            }
        }

        let name = index.name.clone();
        if store.restore_index(index)? {
            restored += 1;
        } else {
            tracing::warn!(index = %name, "store does not maintain saved index; skipped");
        }
    }
    Ok(restored)
}
