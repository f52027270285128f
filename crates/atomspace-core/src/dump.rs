//! # Graph Dump
//!
//! Human-readable model of a whole store, for JSON export and import.
//!
//! Types are named rather than numbered, so a dump survives type
//! renumbering. Handles in a dump only identify atoms within that dump;
//! importing renumbers them with the same two passes a snapshot load uses.

use crate::{
    AtomStore, AttentionValue, Handle, HandleMap, PersistError, TruthValue, TypeKind,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDump {
    pub handle: u64,
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub truth_value: TruthValue,
    #[serde(default)]
    pub attention_value: AttentionValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDump {
    pub handle: u64,
    #[serde(rename = "type")]
    pub type_name: String,
    pub outgoing: Vec<u64>,
    #[serde(default)]
    pub truth_value: TruthValue,
    #[serde(default)]
    pub attention_value: AttentionValue,
}

/// Every atom of a store, nodes and links in ascending handle order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDump {
    pub nodes: Vec<NodeDump>,
    pub links: Vec<LinkDump>,
}

impl GraphDump {
    /// Capture the contents of `store`.
    pub fn from_store<S: AtomStore + ?Sized>(store: &S) -> Result<Self, PersistError> {
        let registry = store.type_registry();
        let mut dump = Self::default();

        for handle in store.handles() {
            let atom = store.get(handle).ok_or(PersistError::AtomNotFound(handle))?;
            let type_name = registry
                .name_of(atom.atom_type)
                .ok_or_else(|| {
                    PersistError::inconsistent(format!(
                        "atom {} has unregistered type id {}",
                        handle.0, atom.atom_type.0
                    ))
                })?
                .to_string();

            if let Some(name) = atom.name() {
                dump.nodes.push(NodeDump {
                    handle: handle.0,
                    type_name,
                    name: name.to_string(),
                    truth_value: atom.truth_value,
                    attention_value: atom.attention_value,
                });
            } else {
                dump.links.push(LinkDump {
                    handle: handle.0,
                    type_name,
                    outgoing: atom.outgoing().iter().map(|h| h.0).collect(),
                    truth_value: atom.truth_value,
                    attention_value: atom.attention_value,
                });
            }
        }
        Ok(dump)
    }

    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.nodes.len() + self.links.len()
    }

    /// Re-create every atom in `store`, which must be empty.
    ///
    /// Returns the map from dump handles to store handles.
    pub fn into_store<S: AtomStore + ?Sized>(self, store: &mut S) -> Result<HandleMap, PersistError> {
        if !store.is_empty() {
            return Err(PersistError::NotEmpty(store.atom_count()));
        }

        let mut handles = HandleMap::new();
        for node in self.nodes {
            let atom_type = require(store, &node.type_name, TypeKind::Node)?;
            let before = store.atom_count();
            let new = store.add_node(atom_type, &node.name, node.truth_value, node.attention_value)?;
            if store.atom_count() == before {
                return Err(PersistError::inconsistent(format!(
                    "node {} ({} {:?}) is listed twice",
                    node.handle, node.type_name, node.name
                )));
            }
            handles.insert(Handle(node.handle), new)?;
        }

        let mut pending = Vec::with_capacity(self.links.len());
        for link in self.links {
            let atom_type = require(store, &link.type_name, TypeKind::Link)?;
            let raw = link.outgoing.into_iter().map(Handle).collect();
            let new =
                store.add_unresolved_link(atom_type, raw, link.truth_value, link.attention_value)?;
            handles.insert(Handle(link.handle), new)?;
            pending.push(new);
        }

        for link in pending {
            let raw = store
                .get(link)
                .ok_or(PersistError::AtomNotFound(link))?
                .outgoing()
                .to_vec();
            let outgoing = handles.resolve_all(&raw)?;
            store.resolve_link(link, outgoing)?;
        }
        Ok(handles)
    }
}

fn require<S: AtomStore + ?Sized>(
    store: &S,
    type_name: &str,
    kind: TypeKind,
) -> Result<crate::Type, PersistError> {
    let registry = store.type_registry();
    let atom_type = registry.require(type_name)?;
    if registry.kind_of(atom_type) != Some(kind) {
        return Err(PersistError::inconsistent(format!(
            "{} is not a {:?} type",
            type_name, kind
        )));
    }
    Ok(atom_type)
}
