//! # Atom Store
//!
//! The boundary the persistence layer consumes (`AtomStore`) and an
//! in-memory implementation of it (`AtomSpace`).
//!
//! All data structures use `BTreeMap`/`BTreeSet` for deterministic ordering,
//! so iteration and index contents are reproducible across runs.

use crate::primitives::{IMPORTANCE_INDEX, TYPE_INDEX};
use crate::{
    Atom, AtomKind, AttentionValue, Handle, PersistError, TruthValue, Type, TypeKind,
    TypeRegistry,
};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// INDEX LISTS
// =============================================================================

/// One keyed handle list of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexList {
    pub key: u64,
    pub handles: Vec<Handle>,
}

/// A named auxiliary index, as written to and read from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedIndex {
    pub name: String,
    pub lists: Vec<IndexList>,
}

// =============================================================================
// ATOMSTORE TRAIT
// =============================================================================

/// The AtomStore trait defines what the persistence layer needs from a graph store.
///
/// The store owns every atom and assigns every handle. Loading drives it
/// through `add_unresolved_link` and `resolve_link`, which let a link exist
/// before the atoms it points at have been re-created.
pub trait AtomStore {
    /// Type registry this store interprets type ids with.
    fn type_registry(&self) -> &TypeRegistry;

    /// Total number of atoms.
    fn atom_count(&self) -> usize;

    /// Whether the store holds no atoms.
    fn is_empty(&self) -> bool {
        self.atom_count() == 0
    }

    /// All handles in ascending order.
    fn handles(&self) -> Vec<Handle>;

    /// Access an atom.
    fn get(&self, handle: Handle) -> Option<&Atom>;

    /// Add a node. A node with the same type and name is reused and its
    /// truth and attention values overwritten.
    fn add_node(
        &mut self,
        atom_type: Type,
        name: &str,
        truth_value: TruthValue,
        attention_value: AttentionValue,
    ) -> Result<Handle, PersistError>;

    /// Add a link over existing atoms. A link with the same type and outgoing
    /// set is reused and its truth and attention values overwritten.
    fn add_link(
        &mut self,
        atom_type: Type,
        outgoing: Vec<Handle>,
        truth_value: TruthValue,
        attention_value: AttentionValue,
    ) -> Result<Handle, PersistError>;

    /// Allocate a link whose outgoing set holds foreign (snapshot) handles.
    ///
    /// The link is not deduplicated and does not appear in incoming sets
    /// until [`AtomStore::resolve_link`] installs its real outgoing set.
    fn add_unresolved_link(
        &mut self,
        atom_type: Type,
        raw_outgoing: Vec<Handle>,
        truth_value: TruthValue,
        attention_value: AttentionValue,
    ) -> Result<Handle, PersistError>;

    /// Replace the raw outgoing set of an unresolved link.
    fn resolve_link(&mut self, handle: Handle, outgoing: Vec<Handle>) -> Result<(), PersistError>;

    fn set_truth_value(&mut self, handle: Handle, truth_value: TruthValue)
    -> Result<(), PersistError>;

    fn set_attention_value(
        &mut self,
        handle: Handle,
        attention_value: AttentionValue,
    ) -> Result<(), PersistError>;

    /// Current contents of every auxiliary index.
    fn index_snapshot(&self) -> Vec<NamedIndex>;

    /// Install index lists read from a snapshot (handles already remapped).
    ///
    /// Returns `Ok(false)` for an index this store does not maintain. A saved
    /// index that disagrees with the atoms it describes is an error.
    fn restore_index(&mut self, index: NamedIndex) -> Result<bool, PersistError>;
}

// =============================================================================
// ATOMSPACE IMPLEMENTATION
// =============================================================================

/// In-memory atom store.
///
/// Atoms live in a handle-addressed arena; every other structure is an
/// index over that arena.
#[derive(Debug, Clone)]
pub struct AtomSpace {
    /// Atom storage: Handle -> Atom
    atoms: BTreeMap<Handle, Atom>,

    /// (type, name) -> node
    node_index: BTreeMap<(Type, String), Handle>,

    /// (type, outgoing) -> resolved link
    link_index: BTreeMap<(Type, Vec<Handle>), Handle>,

    /// target -> resolved links pointing at it
    incoming: BTreeMap<Handle, BTreeSet<Handle>>,

    /// type -> atoms
    type_index: BTreeMap<Type, BTreeSet<Handle>>,

    /// importance bucket -> atoms
    importance_index: BTreeMap<u64, BTreeSet<Handle>>,

    registry: TypeRegistry,

    /// Next handle to assign (0 is never assigned).
    next_handle: u64,
}

impl Default for AtomSpace {
    fn default() -> Self {
        Self::with_registry(TypeRegistry::standard())
    }
}

impl AtomSpace {
    /// Create an empty store with the standard types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store over a custom type registry.
    #[must_use]
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            atoms: BTreeMap::new(),
            node_index: BTreeMap::new(),
            link_index: BTreeMap::new(),
            incoming: BTreeMap::new(),
            type_index: BTreeMap::new(),
            importance_index: BTreeMap::new(),
            registry,
            next_handle: 1,
        }
    }

    /// Mutable access to the registry, for adding custom types.
    pub fn type_registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Iterate atoms in handle order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.atoms.len() - self.node_index.len()
    }

    /// Find a node by type and name.
    #[must_use]
    pub fn get_handle(&self, atom_type: Type, name: &str) -> Option<Handle> {
        self.node_index.get(&(atom_type, name.to_string())).copied()
    }

    /// Find a resolved link by type and outgoing set.
    #[must_use]
    pub fn get_link(&self, atom_type: Type, outgoing: &[Handle]) -> Option<Handle> {
        self.link_index.get(&(atom_type, outgoing.to_vec())).copied()
    }

    /// Atoms of exactly this type, in handle order.
    #[must_use]
    pub fn handles_by_type(&self, atom_type: Type) -> Vec<Handle> {
        self.type_index
            .get(&atom_type)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Atoms whose short-term importance falls in this bucket.
    #[must_use]
    pub fn handles_by_importance(&self, bucket: u64) -> Vec<Handle> {
        self.importance_index
            .get(&bucket)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Resolved links that have `target` in their outgoing set.
    #[must_use]
    pub fn incoming(&self, target: Handle) -> Vec<Handle> {
        self.incoming
            .get(&target)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Links that are unresolved or point at atoms not in this store.
    ///
    /// Empty for any store built through the public API or a completed load.
    #[must_use]
    pub fn dangling_links(&self) -> Vec<Handle> {
        self.atoms
            .values()
            .filter(|atom| {
                !atom.is_resolved()
                    || atom
                        .outgoing()
                        .iter()
                        .any(|target| !self.atoms.contains_key(target))
            })
            .map(|atom| atom.handle)
            .collect()
    }

    fn require_kind(&self, atom_type: Type, expected: TypeKind) -> Result<(), PersistError> {
        match self.registry.kind_of(atom_type) {
            Some(kind) if kind == expected => Ok(()),
            Some(_) => Err(PersistError::invalid_usage(format!(
                "type {} is not a {:?} type",
                self.registry.name_of(atom_type).unwrap_or("?"),
                expected
            ))),
            None => Err(PersistError::UnknownType(format!("#{}", atom_type.0))),
        }
    }

    fn allocate(
        &mut self,
        atom_type: Type,
        truth_value: TruthValue,
        attention_value: AttentionValue,
        kind: AtomKind,
    ) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);

        self.type_index.entry(atom_type).or_default().insert(handle);
        self.importance_index
            .entry(attention_value.importance_bucket())
            .or_default()
            .insert(handle);
        self.atoms.insert(
            handle,
            Atom {
                handle,
                atom_type,
                truth_value,
                attention_value,
                kind,
            },
        );
        handle
    }

    fn atom_mut(&mut self, handle: Handle) -> Result<&mut Atom, PersistError> {
        self.atoms
            .get_mut(&handle)
            .ok_or(PersistError::AtomNotFound(handle))
    }

    fn index_link(&mut self, handle: Handle, atom_type: Type, outgoing: &[Handle]) {
        self.link_index
            .insert((atom_type, outgoing.to_vec()), handle);
        for target in outgoing {
            self.incoming.entry(*target).or_default().insert(handle);
        }
    }
}

impl AtomStore for AtomSpace {
    fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    fn handles(&self) -> Vec<Handle> {
        self.atoms.keys().copied().collect()
    }

    fn get(&self, handle: Handle) -> Option<&Atom> {
        self.atoms.get(&handle)
    }

    fn add_node(
        &mut self,
        atom_type: Type,
        name: &str,
        truth_value: TruthValue,
        attention_value: AttentionValue,
    ) -> Result<Handle, PersistError> {
        self.require_kind(atom_type, TypeKind::Node)?;

        if let Some(existing) = self.get_handle(atom_type, name) {
            self.set_truth_value(existing, truth_value)?;
            self.set_attention_value(existing, attention_value)?;
            return Ok(existing);
        }

        let handle = self.allocate(
            atom_type,
            truth_value,
            attention_value,
            AtomKind::Node {
                name: name.to_string(),
            },
        );
        self.node_index.insert((atom_type, name.to_string()), handle);
        Ok(handle)
    }

    fn add_link(
        &mut self,
        atom_type: Type,
        outgoing: Vec<Handle>,
        truth_value: TruthValue,
        attention_value: AttentionValue,
    ) -> Result<Handle, PersistError> {
        self.require_kind(atom_type, TypeKind::Link)?;
        if let Some(missing) = outgoing.iter().find(|h| !self.atoms.contains_key(h)) {
            return Err(PersistError::AtomNotFound(*missing));
        }

        if let Some(existing) = self.get_link(atom_type, &outgoing) {
            self.set_truth_value(existing, truth_value)?;
            self.set_attention_value(existing, attention_value)?;
            return Ok(existing);
        }

        let handle = self.allocate(
            atom_type,
            truth_value,
            attention_value,
            AtomKind::Link {
                outgoing: outgoing.clone(),
                resolved: true,
            },
        );
        self.index_link(handle, atom_type, &outgoing);
        Ok(handle)
    }

    fn add_unresolved_link(
        &mut self,
        atom_type: Type,
        raw_outgoing: Vec<Handle>,
        truth_value: TruthValue,
        attention_value: AttentionValue,
    ) -> Result<Handle, PersistError> {
        self.require_kind(atom_type, TypeKind::Link)?;
        Ok(self.allocate(
            atom_type,
            truth_value,
            attention_value,
            AtomKind::Link {
                outgoing: raw_outgoing,
                resolved: false,
            },
        ))
    }

    fn resolve_link(&mut self, handle: Handle, outgoing: Vec<Handle>) -> Result<(), PersistError> {
        if let Some(missing) = outgoing.iter().find(|h| !self.atoms.contains_key(h)) {
            return Err(PersistError::AtomNotFound(*missing));
        }

        let atom_type = self
            .atoms
            .get(&handle)
            .ok_or(PersistError::AtomNotFound(handle))?
            .atom_type;
        if let Some(&other) = self.link_index.get(&(atom_type, outgoing.clone())) {
            return Err(PersistError::inconsistent(format!(
                "links {} and {} have the same type and outgoing set",
                other.0, handle.0
            )));
        }

        let atom = self.atom_mut(handle)?;
        match &mut atom.kind {
            AtomKind::Link {
                outgoing: current,
                resolved,
            } if !*resolved => {
                if current.len() != outgoing.len() {
                    return Err(PersistError::inconsistent(format!(
                        "link {} resolved with arity {} (was {})",
                        handle.0,
                        outgoing.len(),
                        current.len()
                    )));
                }
                current.clone_from(&outgoing);
                *resolved = true;
            }
            _ => {
                return Err(PersistError::invalid_usage(format!(
                    "atom {} is not an unresolved link",
                    handle.0
                )));
            }
        }

        self.index_link(handle, atom_type, &outgoing);
        Ok(())
    }

    fn set_truth_value(
        &mut self,
        handle: Handle,
        truth_value: TruthValue,
    ) -> Result<(), PersistError> {
        self.atom_mut(handle)?.truth_value = truth_value;
        Ok(())
    }

    fn set_attention_value(
        &mut self,
        handle: Handle,
        attention_value: AttentionValue,
    ) -> Result<(), PersistError> {
        let atom = self.atom_mut(handle)?;
        let old_bucket = atom.attention_value.importance_bucket();
        atom.attention_value = attention_value;

        let new_bucket = attention_value.importance_bucket();
        if old_bucket != new_bucket {
            if let Some(set) = self.importance_index.get_mut(&old_bucket) {
                set.remove(&handle);
                if set.is_empty() {
                    self.importance_index.remove(&old_bucket);
                }
            }
            self.importance_index
                .entry(new_bucket)
                .or_default()
                .insert(handle);
        }
        Ok(())
    }

    fn index_snapshot(&self) -> Vec<NamedIndex> {
        let type_lists = self
            .type_index
            .iter()
            .map(|(atom_type, set)| IndexList {
                key: atom_type.0 as u64,
                handles: set.iter().copied().collect(),
            })
            .collect();
        let importance_lists = self
            .importance_index
            .iter()
            .map(|(bucket, set)| IndexList {
                key: *bucket,
                handles: set.iter().copied().collect(),
            })
            .collect();

        vec![
            NamedIndex {
                name: TYPE_INDEX.to_string(),
                lists: type_lists,
            },
            NamedIndex {
                name: IMPORTANCE_INDEX.to_string(),
                lists: importance_lists,
            },
        ]
    }

    fn restore_index(&mut self, index: NamedIndex) -> Result<bool, PersistError> {
        let by_type = match index.name.as_str() {
            TYPE_INDEX => true,
            IMPORTANCE_INDEX => false,
            _ => return Ok(false),
        };

        let mut saved: BTreeMap<u64, BTreeSet<Handle>> = BTreeMap::new();
        for list in index.lists {
            for handle in &list.handles {
                let atom = self
                    .atoms
                    .get(handle)
                    .ok_or(PersistError::AtomNotFound(*handle))?;
                let actual = if by_type {
                    atom.atom_type.0 as u64
                } else {
                    atom.attention_value.importance_bucket()
                };
                if actual != list.key {
                    return Err(PersistError::inconsistent(format!(
                        "atom {} listed under {} key {} but belongs to {}",
                        handle.0, index.name, list.key, actual
                    )));
                }
            }
            if saved.insert(list.key, list.handles.into_iter().collect()).is_some() {
                return Err(PersistError::inconsistent(format!(
                    "{} index lists key {} twice",
                    index.name, list.key
                )));
            }
        }

        // Every atom is indexed on allocation, so the saved lists must match
        // the live index exactly.
        let live: BTreeMap<u64, &BTreeSet<Handle>> = if by_type {
            self.type_index
                .iter()
                .map(|(atom_type, set)| (atom_type.0 as u64, set))
                .collect()
        } else {
            self.importance_index
                .iter()
                .map(|(bucket, set)| (*bucket, set))
                .collect()
        };
        let keys: BTreeSet<u64> = live.keys().chain(saved.keys()).copied().collect();
        for key in keys {
            let listed = saved.get(&key).map_or(0, BTreeSet::len);
            let indexed = live.get(&key).map_or(0, |set| set.len());
            if saved.get(&key) != live.get(&key).copied() {
                return Err(PersistError::inconsistent(format!(
                    "{} index key {} lists {} atoms but the store holds {}",
                    index.name, key, listed, indexed
                )));
            }
        }
        Ok(true)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(space: &AtomSpace) -> Type {
        space.type_registry().get_type("ConceptNode").expect("type")
    }

    fn inheritance(space: &AtomSpace) -> Type {
        space.type_registry().get_type("InheritanceLink").expect("type")
    }

    #[test]
    fn handles_start_at_one() {
        let mut space = AtomSpace::new();
        let t = concept(&space);
        let h = space
            .add_node(t, "cat", TruthValue::default(), AttentionValue::default())
            .expect("add");

        assert_eq!(h, Handle(1));
        assert!(h.is_defined());
    }

    #[test]
    fn duplicate_node_is_reused() {
        let mut space = AtomSpace::new();
        let t = concept(&space);
        let a = space
            .add_node(t, "cat", TruthValue::simple(0.1, 0.1), AttentionValue::default())
            .expect("add");
        let b = space
            .add_node(t, "cat", TruthValue::simple(0.5, 0.5), AttentionValue::default())
            .expect("add");

        assert_eq!(a, b);
        assert_eq!(space.node_count(), 1);
        assert_eq!(
            space.get(a).expect("atom").truth_value,
            TruthValue::simple(0.5, 0.5)
        );
    }

    #[test]
    fn link_requires_existing_targets() {
        let mut space = AtomSpace::new();
        let t = inheritance(&space);
        let result = space.add_link(
            t,
            vec![Handle(42)],
            TruthValue::default(),
            AttentionValue::default(),
        );
        assert!(matches!(result, Err(PersistError::AtomNotFound(Handle(42)))));
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut space = AtomSpace::new();
        let t = inheritance(&space);
        let result = space.add_node(t, "cat", TruthValue::default(), AttentionValue::default());
        assert!(matches!(result, Err(PersistError::InvalidUsage(_))));
    }

    #[test]
    fn incoming_tracks_links() {
        let mut space = AtomSpace::new();
        let c = concept(&space);
        let i = inheritance(&space);
        let cat = space
            .add_node(c, "cat", TruthValue::default(), AttentionValue::default())
            .expect("add");
        let animal = space
            .add_node(c, "animal", TruthValue::default(), AttentionValue::default())
            .expect("add");
        let link = space
            .add_link(i, vec![cat, animal], TruthValue::default(), AttentionValue::default())
            .expect("link");

        assert_eq!(space.incoming(cat), vec![link]);
        assert_eq!(space.incoming(animal), vec![link]);
        assert_eq!(space.get_link(i, &[cat, animal]), Some(link));
        assert_eq!(space.link_count(), 1);
    }

    #[test]
    fn unresolved_link_lifecycle() {
        let mut space = AtomSpace::new();
        let c = concept(&space);
        let i = inheritance(&space);
        let link = space
            .add_unresolved_link(
                i,
                vec![Handle(900), Handle(901)],
                TruthValue::default(),
                AttentionValue::default(),
            )
            .expect("raw link");
        assert_eq!(space.dangling_links(), vec![link]);
        assert!(space.incoming(Handle(900)).is_empty());

        let a = space
            .add_node(c, "a", TruthValue::default(), AttentionValue::default())
            .expect("add");
        let b = space
            .add_node(c, "b", TruthValue::default(), AttentionValue::default())
            .expect("add");
        space.resolve_link(link, vec![a, b]).expect("resolve");

        assert!(space.dangling_links().is_empty());
        assert_eq!(space.get(link).expect("atom").outgoing(), &[a, b]);
        assert_eq!(space.incoming(a), vec![link]);

        // A resolved link cannot be resolved again
        assert!(space.resolve_link(link, vec![b, a]).is_err());
    }

    #[test]
    fn resolve_rejects_arity_change() {
        let mut space = AtomSpace::new();
        let c = concept(&space);
        let i = inheritance(&space);
        let a = space
            .add_node(c, "a", TruthValue::default(), AttentionValue::default())
            .expect("add");
        let link = space
            .add_unresolved_link(i, vec![Handle(7)], TruthValue::default(), AttentionValue::default())
            .expect("raw link");

        let result = space.resolve_link(link, vec![a, a]);
        assert!(matches!(result, Err(PersistError::Inconsistent(_))));
    }

    #[test]
    fn importance_index_follows_attention_changes() {
        let mut space = AtomSpace::new();
        let c = concept(&space);
        let h = space
            .add_node(c, "x", TruthValue::default(), AttentionValue::new(0, 0, 0))
            .expect("add");
        assert_eq!(space.handles_by_importance(128), vec![h]);

        space
            .set_attention_value(h, AttentionValue::new(i16::MAX, 0, 0))
            .expect("set");
        assert!(space.handles_by_importance(128).is_empty());
        assert_eq!(space.handles_by_importance(255), vec![h]);
    }

    #[test]
    fn restore_index_validates_membership() {
        let mut space = AtomSpace::new();
        let c = concept(&space);
        let h = space
            .add_node(c, "x", TruthValue::default(), AttentionValue::default())
            .expect("add");

        let wrong = NamedIndex {
            name: TYPE_INDEX.to_string(),
            lists: vec![IndexList {
                key: 0,
                handles: vec![h],
            }],
        };
        assert!(matches!(
            space.restore_index(wrong),
            Err(PersistError::Inconsistent(_))
        ));

        let unknown = NamedIndex {
            name: "target-type".to_string(),
            lists: Vec::new(),
        };
        assert!(!space.restore_index(unknown).expect("ignored"));
    }

    #[test]
    fn restore_index_requires_complete_lists() {
        let mut space = AtomSpace::new();
        let c = concept(&space);
        let a = space
            .add_node(c, "a", TruthValue::default(), AttentionValue::default())
            .expect("a");
        let b = space
            .add_node(c, "b", TruthValue::default(), AttentionValue::default())
            .expect("b");

        let partial = NamedIndex {
            name: TYPE_INDEX.to_string(),
            lists: vec![IndexList {
                key: c.0 as u64,
                handles: vec![a],
            }],
        };
        assert!(matches!(
            space.restore_index(partial),
            Err(PersistError::Inconsistent(_))
        ));
        assert_eq!(space.handles_by_type(c).len(), 2);

        let repeated = NamedIndex {
            name: TYPE_INDEX.to_string(),
            lists: vec![
                IndexList {
                    key: c.0 as u64,
                    handles: vec![a],
                },
                IndexList {
                    key: c.0 as u64,
                    handles: vec![b],
                },
            ],
        };
        assert!(matches!(
            space.restore_index(repeated),
            Err(PersistError::Inconsistent(_))
        ));

        for index in space.index_snapshot() {
            assert!(space.restore_index(index).expect("matching index"));
        }
    }

    #[test]
    fn index_snapshot_lists_every_atom() {
        let mut space = AtomSpace::new();
        let c = concept(&space);
        for name in ["a", "b", "c"] {
            space
                .add_node(c, name, TruthValue::default(), AttentionValue::default())
                .expect("add");
        }

        let indices = space.index_snapshot();
        let type_index = indices
            .iter()
            .find(|i| i.name == TYPE_INDEX)
            .expect("type index");
        let listed: usize = type_index.lists.iter().map(|l| l.handles.len()).sum();
        assert_eq!(listed, 3);
    }
}
