//! # Snapshot Header
//!
//! Format: 5 bytes preceding every section of a snapshot.
//! - 4 bytes: Magic ("ATSP")
//! - 1 byte: Version
//!
//! The header is checked before any record is decoded, so a foreign or
//! newer file is rejected without touching the target store.

use crate::{PersistError, primitives};

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 5;

/// The snapshot header precedes all sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), PersistError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(PersistError::inconsistent("not a snapshot image (bad magic)"));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(PersistError::inconsistent(format!(
                "unsupported snapshot version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Self {
            magic,
            version: bytes[4],
        }
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
