//! # Format Primitives
//!
//! Hardcoded constants of the snapshot format and its safety limits.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Changing any of the format constants requires bumping `FORMAT_VERSION`.

/// Magic bytes opening every snapshot image.
pub const MAGIC_BYTES: &[u8; 4] = b"ATSP";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the record layout.
pub const FORMAT_VERSION: u8 = 1;

/// Name of the index listing atoms per type (keyed by numeric type id).
pub const TYPE_INDEX: &str = "type";

/// Name of the index listing atoms per short-term importance bucket.
pub const IMPORTANCE_INDEX: &str = "importance";

/// Default number of records between two progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

// =============================================================================
// DECODING LIMITS
// =============================================================================

/// Maximum length in bytes of a node name or a name tag.
///
/// Longer strings are rejected before allocation.
pub const MAX_NAME_LENGTH: usize = 1024 * 1024;

/// Maximum arity of a link record.
pub const MAX_ARITY: usize = 65_536;

/// Maximum number of records in a node or link section.
pub const MAX_SECTION_COUNT: u64 = u32::MAX as u64;

/// Maximum number of entries in the type table.
pub const MAX_TYPE_COUNT: u32 = u16::MAX as u32 + 1;

/// Maximum number of named indices, and of lists per index.
pub const MAX_INDEX_LISTS: u32 = 65_536;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"ATSP");
    }

    #[test]
    fn index_names_distinct() {
        assert_ne!(TYPE_INDEX, IMPORTANCE_INDEX);
    }
}
