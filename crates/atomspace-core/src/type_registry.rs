//! # Type Registry
//!
//! Name ↔ numeric id table for atom types.
//!
//! Numeric ids are assigned in registration order, so two builds that
//! register custom types in a different order disagree on ids. Snapshots
//! therefore carry the full table and the loader matches types by name.

use crate::{PersistError, Type, TypeKind};
use std::collections::BTreeMap;

/// Types every registry starts with, in id order.
pub const STANDARD_TYPES: &[(&str, TypeKind)] = &[
    ("Node", TypeKind::Node),
    ("Link", TypeKind::Link),
    ("ConceptNode", TypeKind::Node),
    ("PredicateNode", TypeKind::Node),
    ("WordNode", TypeKind::Node),
    ("NumberNode", TypeKind::Node),
    ("VariableNode", TypeKind::Node),
    ("ListLink", TypeKind::Link),
    ("InheritanceLink", TypeKind::Link),
    ("SimilarityLink", TypeKind::Link),
    ("EvaluationLink", TypeKind::Link),
    ("MemberLink", TypeKind::Link),
    ("ImplicationLink", TypeKind::Link),
    ("AndLink", TypeKind::Link),
    ("OrLink", TypeKind::Link),
    ("NotLink", TypeKind::Link),
];

/// One row of the type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub name: String,
    pub id: Type,
    pub kind: TypeKind,
}

/// Registry of atom types known to this process.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    entries: Vec<TypeEntry>,
    by_name: BTreeMap<String, Type>,
}

impl TypeRegistry {
    /// Create a registry with no types at all.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry holding [`STANDARD_TYPES`].
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for (name, kind) in STANDARD_TYPES {
            registry.push(name, *kind);
        }
        registry
    }

    fn push(&mut self, name: &str, kind: TypeKind) -> Type {
        let id = Type(self.entries.len() as u16);
        self.entries.push(TypeEntry {
            name: name.to_string(),
            id,
            kind,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Register a type, or return the existing id of a same-kind type.
    pub fn add_type(&mut self, name: &str, kind: TypeKind) -> Result<Type, PersistError> {
        if name.is_empty() {
            return Err(PersistError::invalid_usage("type name must not be empty"));
        }
        if let Some(&existing) = self.by_name.get(name) {
            if self.kind_of(existing) != Some(kind) {
                return Err(PersistError::invalid_usage(format!(
                    "type {} already registered with a different kind",
                    name
                )));
            }
            return Ok(existing);
        }
        if self.entries.len() > u16::MAX as usize {
            return Err(PersistError::invalid_usage("type registry is full"));
        }
        Ok(self.push(name, kind))
    }

    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<Type> {
        self.by_name.get(name).copied()
    }

    /// Look a type up by name, failing with `UnknownType`.
    pub fn require(&self, name: &str) -> Result<Type, PersistError> {
        self.get_type(name)
            .ok_or_else(|| PersistError::UnknownType(name.to_string()))
    }

    #[must_use]
    pub fn name_of(&self, id: Type) -> Option<&str> {
        self.entries.get(id.0 as usize).map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn kind_of(&self, id: Type) -> Option<TypeKind> {
        self.entries.get(id.0 as usize).map(|e| e.kind)
    }

    /// All entries in id order.
    #[must_use]
    pub fn entries(&self) -> &[TypeEntry] {
        &self.entries
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
    fn standard_types_have_sequential_ids() {
        let registry = TypeRegistry::standard();
        for (i, entry) in registry.entries().iter().enumerate() {
            assert_eq!(entry.id, Type(i as u16));
        }
        assert_eq!(registry.get_type("Node"), Some(Type(0)));
        assert_eq!(registry.kind_of(Type(1)), Some(TypeKind::Link));
    }

    #[test]
    fn add_type_is_idempotent_for_same_kind() {
        let mut registry = TypeRegistry::standard();
        let a = registry
            .add_type("GroundedSchemaNode", TypeKind::Node)
            .expect("add");
        let b = registry
            .add_type("GroundedSchemaNode", TypeKind::Node)
            .expect("add again");

        assert_eq!(a, b);
        assert_eq!(registry.len(), STANDARD_TYPES.len() + 1);
    }

    #[test]
    fn add_type_rejects_kind_change() {
        let mut registry = TypeRegistry::standard();
        let result = registry.add_type("ConceptNode", TypeKind::Link);
        assert!(matches!(result, Err(PersistError::InvalidUsage(_))));
    }

    #[test]
    fn require_reports_unknown_type() {
        let registry = TypeRegistry::standard();
        assert!(matches!(
            registry.require("NoSuchLink"),
            Err(PersistError::UnknownType(_))
        ));
        assert_eq!(registry.name_of(Type(2)), Some("ConceptNode"));
        assert_eq!(registry.name_of(Type(999)), None);
    }
}
