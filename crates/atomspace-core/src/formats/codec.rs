//! # Record Codec
//!
//! Bit-exact reader and writer for the records of a snapshot image.
//!
//! All integers are little-endian. Floats are written as their IEEE-754 bit
//! patterns, so every value (including `-0.0`, subnormals and NaN payloads)
//! decodes to exactly what was encoded.
//!
//! ```text
//! Str            := len:u32 utf8[len]
//! TruthValue     := tag:u8 f32*   (0 = Simple/2, 1 = Count/3, 2 = Indefinite/3)
//! AttentionValue := sti:i16 lti:i16 vlti:u16
//! AtomHeader     := handle:u64 type:u16 TruthValue AttentionValue
//! NodeRecord     := AtomHeader name:Str
//! LinkRecord     := AtomHeader arity:u32 handle:u64*arity
//! ```

use super::header::{HEADER_SIZE, SnapshotHeader};
use crate::primitives::{MAX_ARITY, MAX_INDEX_LISTS, MAX_NAME_LENGTH, MAX_TYPE_COUNT};
use crate::{
    Atom, AtomKind, AttentionValue, Handle, IndexList, NamedIndex, PersistError, TruthValue,
    Type, TypeEntry, TypeKind,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

// =============================================================================
// DECODED RECORDS
// =============================================================================

/// Fields shared by node and link records.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomHeader {
    /// Handle of the atom in the process that wrote the snapshot.
    pub handle: Handle,
    /// Type id as numbered by the writer's registry.
    pub type_id: u16,
    pub truth_value: TruthValue,
    pub attention_value: AttentionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub header: AtomHeader,
    pub name: String,
}

/// A link record. `outgoing` holds the writer's handles.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub header: AtomHeader,
    pub outgoing: Vec<Handle>,
}

// =============================================================================
// WRITER
// =============================================================================

/// Encodes records into any `Write` sink.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    /// Number of bytes encoded so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> Result<(), PersistError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), PersistError> {
        self.inner.write_u8(value)?;
        self.bytes_written += 1;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), PersistError> {
        self.inner.write_u16::<LittleEndian>(value)?;
        self.bytes_written += 2;
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), PersistError> {
        self.inner.write_i16::<LittleEndian>(value)?;
        self.bytes_written += 2;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), PersistError> {
        self.inner.write_u32::<LittleEndian>(value)?;
        self.bytes_written += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), PersistError> {
        self.inner.write_u64::<LittleEndian>(value)?;
        self.bytes_written += 8;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<(), PersistError> {
        self.write_u32(value.to_bits())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), PersistError> {
        self.inner.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) -> Result<(), PersistError> {
        if value.len() > MAX_NAME_LENGTH {
            return Err(PersistError::invalid_usage(format!(
                "string of {} bytes exceeds the {} byte limit",
                value.len(),
                MAX_NAME_LENGTH
            )));
        }
        self.write_u32(value.len() as u32)?;
        self.write_bytes(value.as_bytes())
    }

    pub fn write_handle(&mut self, handle: Handle) -> Result<(), PersistError> {
        self.write_u64(handle.0)
    }

    pub fn write_header(&mut self, header: &SnapshotHeader) -> Result<(), PersistError> {
        self.write_bytes(&header.to_bytes())
    }

    pub fn write_truth_value(&mut self, tv: &TruthValue) -> Result<(), PersistError> {
        self.write_u8(tv.tag())?;
        for bits in tv.to_bits() {
            self.write_u32(bits)?;
        }
        Ok(())
    }

    pub fn write_attention_value(&mut self, av: &AttentionValue) -> Result<(), PersistError> {
        self.write_i16(av.sti)?;
        self.write_i16(av.lti)?;
        self.write_u16(av.vlti)
    }

    fn write_atom_header(&mut self, atom: &Atom) -> Result<(), PersistError> {
        self.write_handle(atom.handle)?;
        self.write_u16(atom.atom_type.0)?;
        self.write_truth_value(&atom.truth_value)?;
        self.write_attention_value(&atom.attention_value)
    }

    /// Write one node record.
    pub fn write_node(&mut self, atom: &Atom) -> Result<(), PersistError> {
        let AtomKind::Node { name } = &atom.kind else {
            return Err(PersistError::invalid_usage(format!(
                "atom {} is not a node",
                atom.handle.0
            )));
        };
        self.write_atom_header(atom)?;
        self.write_str(name)
    }

    /// Write one link record with its outgoing handles as currently held.
    pub fn write_link(&mut self, atom: &Atom) -> Result<(), PersistError> {
        let AtomKind::Link { outgoing, .. } = &atom.kind else {
            return Err(PersistError::invalid_usage(format!(
                "atom {} is not a link",
                atom.handle.0
            )));
        };
        if outgoing.len() > MAX_ARITY {
            return Err(PersistError::invalid_usage(format!(
                "link {} has arity {} (limit {})",
                atom.handle.0,
                outgoing.len(),
                MAX_ARITY
            )));
        }
        self.write_atom_header(atom)?;
        self.write_u32(outgoing.len() as u32)?;
        for handle in outgoing {
            self.write_handle(*handle)?;
        }
        Ok(())
    }

    /// Write the type table: `count:u32 (name:Str id:u16 kind:u8)*`.
    pub fn write_type_table(&mut self, entries: &[TypeEntry]) -> Result<(), PersistError> {
        self.write_u32(entries.len() as u32)?;
        for entry in entries {
            self.write_str(&entry.name)?;
            self.write_u16(entry.id.0)?;
            self.write_u8(entry.kind.tag())?;
        }
        Ok(())
    }

    /// Write the index section: `count:u32 (name:Str lists:u32 (key:u64 len:u32 handle:u64*)*)*`.
    pub fn write_indices(&mut self, indices: &[NamedIndex]) -> Result<(), PersistError> {
        self.write_u32(indices.len() as u32)?;
        for index in indices {
            self.write_str(&index.name)?;
            self.write_u32(index.lists.len() as u32)?;
            for list in &index.lists {
                self.write_u64(list.key)?;
                self.write_u32(list.handles.len() as u32)?;
                for handle in &list.handles {
                    self.write_handle(*handle)?;
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// READER
// =============================================================================

/// Decodes records from any `Read` source.
///
/// Lengths are checked against the limits in [`crate::primitives`] before
/// anything is allocated, so a corrupted count cannot exhaust memory.
#[derive(Debug)]
pub struct RecordReader<R: Read> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_u8(&mut self) -> Result<u8, PersistError> {
        Ok(self.inner.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16, PersistError> {
        Ok(self.inner.read_u16::<LittleEndian>()?)
    }

    pub fn read_i16(&mut self) -> Result<i16, PersistError> {
        Ok(self.inner.read_i16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32, PersistError> {
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64, PersistError> {
        Ok(self.inner.read_u64::<LittleEndian>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32, PersistError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read exactly `len` bytes. A short read is an `UnexpectedEof` I/O error.
    pub fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>, PersistError> {
        let mut buf = Vec::new();
        (&mut self.inner).take(len).read_to_end(&mut buf)?;
        if (buf.len() as u64) < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, found {}", len, buf.len()),
            )
            .into());
        }
        Ok(buf)
    }

    fn read_str_body(&mut self, len: usize) -> Result<String, PersistError> {
        if len > MAX_NAME_LENGTH {
            return Err(PersistError::inconsistent(format!(
                "string length {} exceeds the {} byte limit",
                len, MAX_NAME_LENGTH
            )));
        }
        let bytes = self.read_bytes(len as u64)?;
        String::from_utf8(bytes)
            .map_err(|e| PersistError::inconsistent(format!("invalid UTF-8 in string: {}", e)))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_str(&mut self) -> Result<String, PersistError> {
        let len = self.read_u32()? as usize;
        self.read_str_body(len)
    }

    /// Read a string, or `None` if the source ends cleanly before it.
    ///
    /// An end of file inside the string is still an I/O error.
    pub fn read_str_or_eof(&mut self) -> Result<Option<String>, PersistError> {
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        let mut rest = [0u8; 3];
        self.inner.read_exact(&mut rest)?;
        let len = u32::from_le_bytes([first[0], rest[0], rest[1], rest[2]]) as usize;
        self.read_str_body(len).map(Some)
    }

    pub fn read_handle(&mut self) -> Result<Handle, PersistError> {
        Ok(Handle(self.read_u64()?))
    }

    /// Read the header. Validation is left to the caller.
    pub fn read_header(&mut self) -> Result<SnapshotHeader, PersistError> {
        let mut bytes = [0u8; HEADER_SIZE];
        self.inner.read_exact(&mut bytes)?;
        Ok(SnapshotHeader::from_bytes(bytes))
    }

    pub fn read_truth_value(&mut self) -> Result<TruthValue, PersistError> {
        match self.read_u8()? {
            0 => Ok(TruthValue::Simple {
                strength: self.read_f32()?,
                confidence: self.read_f32()?,
            }),
            1 => Ok(TruthValue::Count {
                strength: self.read_f32()?,
                confidence: self.read_f32()?,
                count: self.read_f32()?,
            }),
            2 => Ok(TruthValue::Indefinite {
                lower: self.read_f32()?,
                upper: self.read_f32()?,
                confidence_level: self.read_f32()?,
            }),
            tag => Err(PersistError::inconsistent(format!(
                "unknown truth value tag {}",
                tag
            ))),
        }
    }

    pub fn read_attention_value(&mut self) -> Result<AttentionValue, PersistError> {
        Ok(AttentionValue {
            sti: self.read_i16()?,
            lti: self.read_i16()?,
            vlti: self.read_u16()?,
        })
    }

    fn read_atom_header(&mut self) -> Result<AtomHeader, PersistError> {
        Ok(AtomHeader {
            handle: self.read_handle()?,
            type_id: self.read_u16()?,
            truth_value: self.read_truth_value()?,
            attention_value: self.read_attention_value()?,
        })
    }

    pub fn read_node_record(&mut self) -> Result<NodeRecord, PersistError> {
        let header = self.read_atom_header()?;
        let name = self.read_str()?;
        Ok(NodeRecord { header, name })
    }

    pub fn read_link_record(&mut self) -> Result<LinkRecord, PersistError> {
        let header = self.read_atom_header()?;
        let arity = self.read_u32()? as usize;
        if arity > MAX_ARITY {
            return Err(PersistError::inconsistent(format!(
                "link {} has arity {} (limit {})",
                header.handle.0, arity, MAX_ARITY
            )));
        }
        let mut outgoing = Vec::with_capacity(arity);
        for _ in 0..arity {
            outgoing.push(self.read_handle()?);
        }
        Ok(LinkRecord { header, outgoing })
    }

    pub fn read_type_table(&mut self) -> Result<Vec<TypeEntry>, PersistError> {
        let count = self.read_u32()?;
        if count > MAX_TYPE_COUNT {
            return Err(PersistError::inconsistent(format!(
                "type table lists {} types",
                count
            )));
        }
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = self.read_str()?;
            let id = Type(self.read_u16()?);
            let tag = self.read_u8()?;
            let kind = TypeKind::from_tag(tag).ok_or_else(|| {
                PersistError::inconsistent(format!("type {} has unknown kind tag {}", name, tag))
            })?;
            entries.push(TypeEntry { name, id, kind });
        }
        Ok(entries)
    }

    pub fn read_indices(&mut self) -> Result<Vec<NamedIndex>, PersistError> {
        let count = self.read_u32()?;
        if count > MAX_INDEX_LISTS {
            return Err(PersistError::inconsistent(format!(
                "index section lists {} indices",
                count
            )));
        }
        let mut indices = Vec::new();
        for _ in 0..count {
            let name = self.read_str()?;
            let list_count = self.read_u32()?;
            if list_count > MAX_INDEX_LISTS {
                return Err(PersistError::inconsistent(format!(
                    "index {} has {} lists",
                    name, list_count
                )));
            }
            let mut lists = Vec::new();
            for _ in 0..list_count {
                let key = self.read_u64()?;
                let len = self.read_u32()?;
                let mut handles = Vec::new();
                for _ in 0..len {
                    handles.push(self.read_handle()?);
                }
                lists.push(IndexList { key, handles });
            }
            indices.push(NamedIndex { name, lists });
        }
        Ok(indices)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(handle: u64, type_id: u16, name: &str, tv: TruthValue) -> Atom {
        Atom {
            handle: Handle(handle),
            atom_type: Type(type_id),
            truth_value: tv,
            attention_value: AttentionValue::new(-5, 7, 1),
            kind: AtomKind::Node {
                name: name.to_string(),
            },
        }
    }

    fn encode(f: impl FnOnce(&mut RecordWriter<Vec<u8>>) -> Result<(), PersistError>) -> Vec<u8> {
        let mut writer = RecordWriter::new(Vec::new());
        f(&mut writer).expect("encode");
        writer.into_inner()
    }

    #[test]
    fn node_record_layout() {
        let bytes = encode(|w| w.write_node(&node(3, 2, "cat", TruthValue::simple(1.0, 0.5))));

        let mut expected = Vec::new();
        expected.extend_from_slice(&3u64.to_le_bytes());
        expected.extend_from_slice(&2u16.to_le_bytes());
        expected.push(0);
        expected.extend_from_slice(&1.0f32.to_bits().to_le_bytes());
        expected.extend_from_slice(&0.5f32.to_bits().to_le_bytes());
        expected.extend_from_slice(&(-5i16).to_le_bytes());
        expected.extend_from_slice(&7i16.to_le_bytes());
        expected.extend_from_slice(&1u16.to_le_bytes());
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(b"cat");

        assert_eq!(bytes, expected);
    }

    #[test]
    fn truth_values_are_bit_exact() {
        let values = [
            TruthValue::simple(-0.0, f32::from_bits(1)),
            TruthValue::Count {
                strength: f32::from_bits(0x7fc0_1234),
                confidence: f32::MAX,
                count: f32::INFINITY,
            },
            TruthValue::Indefinite {
                lower: 0.1,
                upper: 0.9,
                confidence_level: 0.95,
            },
        ];

        for tv in values {
            let bytes = encode(|w| w.write_truth_value(&tv));
            let decoded = RecordReader::new(bytes.as_slice())
                .read_truth_value()
                .expect("decode");
            assert!(tv.bit_eq(&decoded), "{:?} != {:?}", tv, decoded);
        }
    }

    #[test]
    fn link_record_keeps_raw_handles() {
        let link = Atom {
            handle: Handle(10),
            atom_type: Type(8),
            truth_value: TruthValue::simple(0.9, 0.8),
            attention_value: AttentionValue::default(),
            kind: AtomKind::Link {
                outgoing: vec![Handle(4), Handle(99), Handle(4)],
                resolved: true,
            },
        };
        let bytes = encode(|w| w.write_link(&link));
        let record = RecordReader::new(bytes.as_slice())
            .read_link_record()
            .expect("decode");

        assert_eq!(record.header.handle, Handle(10));
        assert_eq!(record.header.type_id, 8);
        assert_eq!(record.outgoing, vec![Handle(4), Handle(99), Handle(4)]);
    }

    #[test]
    fn node_written_as_link_rejected() {
        let mut writer = RecordWriter::new(Vec::new());
        let result = writer.write_link(&node(1, 2, "x", TruthValue::default()));
        assert!(matches!(result, Err(PersistError::InvalidUsage(_))));
        assert_eq!(writer.bytes_written(), 0);
    }

    #[test]
    fn truncated_record_is_io_error() {
        let bytes = encode(|w| w.write_node(&node(3, 2, "elephant", TruthValue::default())));
        let truncated = &bytes[..bytes.len() - 2];

        let err = RecordReader::new(truncated)
            .read_node_record()
            .expect_err("truncated");
        match err {
            PersistError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => unreachable!("expected I/O error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_truth_value_tag_rejected() {
        let err = RecordReader::new([9u8, 0, 0, 0, 0].as_slice())
            .read_truth_value()
            .expect_err("tag 9");
        assert!(matches!(err, PersistError::Inconsistent(_)));
    }

    #[test]
    fn oversized_string_rejected_before_allocation() {
        let len = (MAX_NAME_LENGTH as u32) + 1;
        let err = RecordReader::new(len.to_le_bytes().as_slice())
            .read_str()
            .expect_err("too long");
        assert!(matches!(err, PersistError::Inconsistent(_)));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        let err = RecordReader::new(bytes.as_slice())
            .read_str()
            .expect_err("utf8");
        assert!(matches!(err, PersistError::Inconsistent(_)));
    }

    #[test]
    fn read_str_or_eof_distinguishes_clean_end() {
        let no_bytes: &[u8] = &[];
        let mut empty = RecordReader::new(no_bytes);
        assert_eq!(empty.read_str_or_eof().expect("eof"), None);

        let mut partial = RecordReader::new([4u8, 0].as_slice());
        assert!(matches!(
            partial.read_str_or_eof(),
            Err(PersistError::Io(_))
        ));

        let bytes = encode(|w| w.write_str("focus"));
        let mut full = RecordReader::new(bytes.as_slice());
        assert_eq!(full.read_str_or_eof().expect("tag").as_deref(), Some("focus"));
    }

    #[test]
    fn type_table_roundtrip() {
        let entries = vec![
            TypeEntry {
                name: "ConceptNode".to_string(),
                id: Type(2),
                kind: TypeKind::Node,
            },
            TypeEntry {
                name: "InheritanceLink".to_string(),
                id: Type(8),
                kind: TypeKind::Link,
            },
        ];
        let bytes = encode(|w| w.write_type_table(&entries));
        let decoded = RecordReader::new(bytes.as_slice())
            .read_type_table()
            .expect("decode");
        assert_eq!(decoded, entries);
    }

    #[test]
    fn bytes_written_counts_everything() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_header(&SnapshotHeader::new()).expect("header");
        writer.write_str("abc").expect("str");
        writer.write_u64(1).expect("u64");

        assert_eq!(writer.bytes_written(), (HEADER_SIZE + 4 + 3 + 8) as u64);
        assert_eq!(writer.into_inner().len(), HEADER_SIZE + 4 + 3 + 8);
    }
}
