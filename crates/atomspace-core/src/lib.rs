//! # atomspace-core
//!
//! Snapshot persistence for an AtomSpace hypergraph.
//!
//! This crate writes a complete, self-describing binary snapshot of a graph
//! of typed nodes and links and rebuilds an isomorphic graph from it. Handles
//! are reassigned on load, so every reference (link outgoing sets, index
//! lists, repository state) is rewritten through an old-to-new handle map.
//!
//! ## Layout
//!
//! - `types`: atoms, handles, truth and attention values, errors
//! - `graph`: the `AtomStore` boundary and the in-memory `AtomSpace`
//! - `formats`: header and record codec
//! - `persistence`: `SavingLoading`, the writer and the two-pass reader
//! - `repository`: pluggable state saved alongside the atoms
//! - `dump`: JSON-friendly model of a whole store
//!
//! ## Constraints
//!
//! - Save and load are synchronous and single-threaded
//! - Neither is atomic: on error, the file or the store is left partial
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod dump;
pub mod formats;
pub mod graph;
pub mod handle_map;
pub mod persistence;
pub mod primitives;
pub mod repository;
pub mod type_registry;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Atom, AtomKind, AttentionValue, ErrorKind, Handle, PersistError, TruthValue, Type, TypeKind,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use graph::{AtomSpace, AtomStore, IndexList, NamedIndex};
pub use handle_map::HandleMap;
pub use type_registry::{STANDARD_TYPES, TypeEntry, TypeRegistry};

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

pub use dump::{GraphDump, LinkDump, NodeDump};
pub use persistence::{LoadSummary, Phase, Progress, ProgressHook, SaveSummary, SavingLoading};
pub use repository::{HandleSetRepository, SavableRepository, SharedRepository};

#[cfg(feature = "crypto-hash")]
pub use formats::snapshot_digest;
