//! # Snapshot Formats
//!
//! Byte-level layout of a snapshot image:
//! - `header`: magic bytes + format version
//! - `codec`: record-level reader and writer for every section
//!
//! File I/O and section ordering live in the `persistence` module.

mod codec;
mod header;

pub use codec::{AtomHeader, LinkRecord, NodeRecord, RecordReader, RecordWriter};
pub use header::SnapshotHeader;

/// BLAKE3 digest of a snapshot image, as a hex string (64 characters).
///
/// Snapshots carry no checksum of their own; this lets callers fingerprint
/// one externally.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn snapshot_digest(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

#[cfg(all(test, feature = "crypto-hash"))]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let a = snapshot_digest(b"ATSP\x01");
        let b = snapshot_digest(b"ATSP\x01");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, snapshot_digest(b"ATSP\x02"));
    }
}
