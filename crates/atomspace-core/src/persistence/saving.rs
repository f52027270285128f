//! Writer: walks the store once and emits every section in order.

use super::SaveSummary;
use super::progress::{Phase, ProgressReporter};
use crate::formats::{RecordWriter, SnapshotHeader};
use crate::repository::RepositoryRegistry;
use crate::{Atom, AtomStore, Handle, PersistError};
use std::io::Write;

pub(super) fn write_snapshot<W, S>(
    writer: &mut RecordWriter<W>,
    store: &S,
    repositories: &mut RepositoryRegistry,
    progress: &mut ProgressReporter,
) -> Result<SaveSummary, PersistError>
where
    W: Write,
    S: AtomStore + ?Sized,
{
    writer.write_header(&SnapshotHeader::new())?;

    let types = store.type_registry().entries();
    writer.write_type_table(types)?;

    let (nodes, links) = partition(store)?;

    tracing::info!(nodes = nodes.len(), "writing node section");
    let total = nodes.len() as u64;
    writer.write_u64(total)?;
    for (done, handle) in (1u64..).zip(&nodes) {
        writer.write_node(lookup(store, *handle)?)?;
        progress.tick(Phase::SaveNodes, done, total);
    }
    progress.finish(Phase::SaveNodes, total);

    tracing::info!(links = links.len(), "writing link section");
    let total = links.len() as u64;
    writer.write_u64(total)?;
    for (done, handle) in (1u64..).zip(&links) {
        writer.write_link(lookup(store, *handle)?)?;
        progress.tick(Phase::SaveLinks, done, total);
    }
    progress.finish(Phase::SaveLinks, total);

    let indices = store.index_snapshot();
    writer.write_indices(&indices)?;

    let repositories = repositories.save_all(writer)?;
    writer.flush()?;

    Ok(SaveSummary {
        types: types.len(),
        nodes: nodes.len(),
        links: links.len(),
        indices: indices.len(),
        repositories,
        bytes: writer.bytes_written(),
    })
}

fn lookup<S: AtomStore + ?Sized>(store: &S, handle: Handle) -> Result<&Atom, PersistError> {
    store.get(handle).ok_or(PersistError::AtomNotFound(handle))
}

/// Split the store's handles into nodes and links, both ascending.
///
/// A link still holding raw snapshot handles cannot be saved.
fn partition<S: AtomStore + ?Sized>(store: &S) -> Result<(Vec<Handle>, Vec<Handle>), PersistError> {
    let mut nodes = Vec::new();
    let mut links = Vec::new();
    for handle in store.handles() {
        let atom = lookup(store, handle)?;
        if atom.is_node() {
            nodes.push(handle);
        } else if atom.is_resolved() {
            links.push(handle);
        } else {
            return Err(PersistError::invalid_usage(format!(
                "link {} is unresolved and cannot be saved",
                handle.0
            )));
        }
    }
    Ok((nodes, links))
}
