//! # Core Type Definitions
//!
//! This module contains the value types shared by the store, the codec and
//! the loader:
//! - Atom identifiers and type ids (`Handle`, `Type`, `TypeKind`)
//! - Atom annotations (`TruthValue`, `AttentionValue`)
//! - The atom itself (`Atom`, `AtomKind`)
//! - Error types (`PersistError`, `ErrorKind`)
//!
//! ## Exactness Guarantees
//!
//! Truth and attention values are plain data. They are never recomputed on
//! the persistence path, so their bit patterns survive a save/load cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// HANDLES & TYPES
// =============================================================================

/// Process-local identifier of an atom.
///
/// Handles are assigned by the store when an atom is created and are NOT
/// stable across a save/load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

impl Handle {
    /// The handle value no atom ever receives.
    pub const UNDEFINED: Handle = Handle(0);

    /// Get the raw handle value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this handle can refer to an atom at all.
    #[must_use]
    pub const fn is_defined(self) -> bool {
        self.0 != 0
    }
}

/// Numeric atom type identifier as assigned by a [`crate::TypeRegistry`].
///
/// The numeric value is only meaningful within one registry; snapshots carry
/// the name table needed to translate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Type(pub u16);

/// Whether a type describes nodes or links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Node,
    Link,
}

impl TypeKind {
    /// Wire tag of this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Node => 0,
            Self::Link => 1,
        }
    }

    /// Decode a wire tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Node),
            1 => Some(Self::Link),
            _ => None,
        }
    }
}

// =============================================================================
// TRUTH VALUE
// =============================================================================

/// Immutable truth annotation of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TruthValue {
    /// Strength and confidence.
    Simple { strength: f32, confidence: f32 },
    /// Strength and confidence backed by an observation count.
    Count {
        strength: f32,
        confidence: f32,
        count: f32,
    },
    /// Probability interval with the confidence level it was computed at.
    Indefinite {
        lower: f32,
        upper: f32,
        confidence_level: f32,
    },
}

impl TruthValue {
    /// Create a simple truth value.
    #[must_use]
    pub const fn simple(strength: f32, confidence: f32) -> Self {
        Self::Simple {
            strength,
            confidence,
        }
    }

    /// Wire tag of this variant.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Simple { .. } => 0,
            Self::Count { .. } => 1,
            Self::Indefinite { .. } => 2,
        }
    }

    /// Strength (mean) of the value. For indefinite values this is the lower bound.
    #[must_use]
    pub const fn strength(&self) -> f32 {
        match *self {
            Self::Simple { strength, .. } | Self::Count { strength, .. } => strength,
            Self::Indefinite { lower, .. } => lower,
        }
    }

    /// Raw IEEE-754 bit patterns of every field, in wire order.
    ///
    /// Two truth values are bit-exact equal iff their tags and bit patterns match.
    #[must_use]
    pub fn to_bits(&self) -> Vec<u32> {
        match *self {
            Self::Simple {
                strength,
                confidence,
            } => vec![strength.to_bits(), confidence.to_bits()],
            Self::Count {
                strength,
                confidence,
                count,
            } => vec![strength.to_bits(), confidence.to_bits(), count.to_bits()],
            Self::Indefinite {
                lower,
                upper,
                confidence_level,
            } => vec![lower.to_bits(), upper.to_bits(), confidence_level.to_bits()],
        }
    }

    /// Bit-level equality (distinguishes `-0.0` from `0.0` and compares NaN payloads).
    #[must_use]
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.tag() == other.tag() && self.to_bits() == other.to_bits()
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self::simple(0.0, 0.0)
    }
}

// =============================================================================
// ATTENTION VALUE
// =============================================================================

/// Immutable attention annotation of an atom.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct AttentionValue {
    /// Short-term importance.
    pub sti: i16,
    /// Long-term importance.
    pub lti: i16,
    /// Very-long-term importance counter (non-zero protects from forgetting).
    pub vlti: u16,
}

impl AttentionValue {
    #[must_use]
    pub const fn new(sti: i16, lti: i16, vlti: u16) -> Self {
        Self { sti, lti, vlti }
    }

    /// Bucket of the importance index this value falls in (0..=255).
    #[must_use]
    pub const fn importance_bucket(&self) -> u64 {
        ((self.sti as i32 + 32768) >> 8) as u64
    }
}

// =============================================================================
// ATOM
// =============================================================================

/// Variant payload of an atom.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomKind {
    /// A named node.
    Node { name: String },
    /// A link over an ordered outgoing set.
    ///
    /// While a snapshot is being loaded, `resolved` is false and `outgoing`
    /// holds the raw handles written in the file.
    Link {
        outgoing: Vec<Handle>,
        resolved: bool,
    },
}

/// A node or link as held by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub handle: Handle,
    pub atom_type: Type,
    pub truth_value: TruthValue,
    pub attention_value: AttentionValue,
    pub kind: AtomKind,
}

impl Atom {
    #[must_use]
    pub fn is_node(&self) -> bool {
        matches!(self.kind, AtomKind::Node { .. })
    }

    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(self.kind, AtomKind::Link { .. })
    }

    /// Node name, `None` for links.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            AtomKind::Node { name } => Some(name),
            AtomKind::Link { .. } => None,
        }
    }

    /// Outgoing set, empty for nodes.
    #[must_use]
    pub fn outgoing(&self) -> &[Handle] {
        match &self.kind {
            AtomKind::Node { .. } => &[],
            AtomKind::Link { outgoing, .. } => outgoing,
        }
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.outgoing().len()
    }

    /// False only for links whose outgoing set still holds snapshot handles.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match &self.kind {
            AtomKind::Node { .. } => true,
            AtomKind::Link { resolved, .. } => *resolved,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of a [`PersistError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The file could not be opened, read or written.
    Io,
    /// The snapshot or the target store violates an invariant.
    Consistency,
    /// The caller or process is misconfigured.
    Usage,
}

/// Errors raised by the store, the codec and the persistence layer.
///
/// - No silent failures
/// - No recovery or retry: every error propagates to the caller
#[derive(Debug, Error)]
pub enum PersistError {
    /// An I/O error occurred, including a truncated image.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A load was attempted into a store that already holds atoms.
    #[error("Target store is not empty ({0} atoms present)")]
    NotEmpty(usize),

    /// A handle in the snapshot has no entry in the old-to-new map.
    #[error("Handle {0:?} has no entry in the handle map")]
    UnmappedHandle(Handle),

    /// An atom referenced through the store API does not exist.
    #[error("Atom not found: {0:?}")]
    AtomNotFound(Handle),

    /// The snapshot is malformed or foreign.
    #[error("Inconsistent snapshot: {0}")]
    Inconsistent(String),

    /// A repository with this name is already registered.
    #[error("Repository already registered: {0}")]
    DuplicateRepository(String),

    /// The snapshot carries a repository no one registered.
    #[error("No repository registered under name: {0}")]
    UnknownRepository(String),

    /// A type name is unknown to the runtime registry.
    #[error("Unknown atom type: {0}")]
    UnknownType(String),

    /// Any other misuse of the API.
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),
}

impl PersistError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::NotEmpty(_)
            | Self::UnmappedHandle(_)
            | Self::AtomNotFound(_)
            | Self::Inconsistent(_) => ErrorKind::Consistency,
            Self::DuplicateRepository(_)
            | Self::UnknownRepository(_)
            | Self::UnknownType(_)
            | Self::InvalidUsage(_) => ErrorKind::Usage,
        }
    }

    pub fn inconsistent<S: Into<String>>(msg: S) -> Self {
        Self::Inconsistent(msg.into())
    }

    pub fn invalid_usage<S: Into<String>>(msg: S) -> Self {
        Self::InvalidUsage(msg.into())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_handle_is_zero() {
        assert!(!Handle::UNDEFINED.is_defined());
        assert!(Handle(1).is_defined());
    }

    #[test]
    fn type_kind_tags() {
        assert_eq!(TypeKind::from_tag(TypeKind::Node.tag()), Some(TypeKind::Node));
        assert_eq!(TypeKind::from_tag(TypeKind::Link.tag()), Some(TypeKind::Link));
        assert_eq!(TypeKind::from_tag(7), None);
    }

    #[test]
    fn bit_eq_distinguishes_signed_zero() {
        let positive = TruthValue::simple(0.0, 0.5);
        let negative = TruthValue::simple(-0.0, 0.5);

        assert_eq!(positive, negative);
        assert!(!positive.bit_eq(&negative));
        assert!(positive.bit_eq(&TruthValue::simple(0.0, 0.5)));
    }

    #[test]
    fn importance_buckets_span_full_range() {
        assert_eq!(AttentionValue::new(i16::MIN, 0, 0).importance_bucket(), 0);
        assert_eq!(AttentionValue::new(0, 0, 0).importance_bucket(), 128);
        assert_eq!(AttentionValue::new(i16::MAX, 0, 0).importance_bucket(), 255);
    }

    #[test]
    fn error_kinds() {
        let io = PersistError::from(std::io::Error::other("disk"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(PersistError::NotEmpty(3).kind(), ErrorKind::Consistency);
        assert_eq!(
            PersistError::UnmappedHandle(Handle(9)).kind(),
            ErrorKind::Consistency
        );
        assert_eq!(
            PersistError::UnknownRepository("x".into()).kind(),
            ErrorKind::Usage
        );
        assert_eq!(
            PersistError::DuplicateRepository("x".into()).kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn link_accessors() {
        let link = Atom {
            handle: Handle(3),
            atom_type: Type(8),
            truth_value: TruthValue::default(),
            attention_value: AttentionValue::default(),
            kind: AtomKind::Link {
                outgoing: vec![Handle(1), Handle(2)],
                resolved: false,
            },
        };

        assert!(link.is_link());
        assert_eq!(link.arity(), 2);
        assert_eq!(link.name(), None);
        assert!(!link.is_resolved());
    }
}
