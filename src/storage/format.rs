//! Binary snapshot format: header, record layouts and enum byte mappings.
//!
//! Everything is little-endian. The kind/visibility/scope-type byte values
//! and the modifier bit positions are part of the format and must stay
//! stable within a major version; layout changes require a major-version
//! bump. Minor versions may append optional sections after the registry
//! block, referenced from the reserved header bytes.

use crate::error::{SnapshotError, SnapshotResult};
use crate::symbol::ModifierFlags;
use crate::types::{Range, ScopeKind, SymbolKind, Visibility};

/// ASCII "APEX", little-endian.
pub const MAGIC: u32 = 0x5845_5041;

/// Current format version. `read_header` rejects anything else.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed header size. Section offset/size fields are 32-bit; snapshots are
/// far below that bound.
pub const HEADER_LEN: usize = 64;

/// Fixed size of one symbol record.
pub const SYMBOL_RECORD_LEN: usize = 68;

/// Fixed size of one type-registry record.
pub const REGISTRY_RECORD_LEN: usize = 24;

// =============================================================================
// Enum byte mappings (format-stable)
// =============================================================================

pub fn kind_to_byte(kind: SymbolKind) -> u8 {
    match kind {
        SymbolKind::Class => 0,
        SymbolKind::Interface => 1,
        SymbolKind::Enum => 2,
        SymbolKind::Trigger => 3,
        SymbolKind::Method => 4,
        SymbolKind::Constructor => 5,
        SymbolKind::Field => 6,
        SymbolKind::Property => 7,
        SymbolKind::Variable => 8,
        SymbolKind::Parameter => 9,
        SymbolKind::EnumValue => 10,
        SymbolKind::Block => 11,
    }
}

pub fn byte_to_kind(value: u8) -> SnapshotResult<SymbolKind> {
    Ok(match value {
        0 => SymbolKind::Class,
        1 => SymbolKind::Interface,
        2 => SymbolKind::Enum,
        3 => SymbolKind::Trigger,
        4 => SymbolKind::Method,
        5 => SymbolKind::Constructor,
        6 => SymbolKind::Field,
        7 => SymbolKind::Property,
        8 => SymbolKind::Variable,
        9 => SymbolKind::Parameter,
        10 => SymbolKind::EnumValue,
        11 => SymbolKind::Block,
        _ => {
            return Err(SnapshotError::UnknownEnumByte {
                field: "kind",
                value,
            });
        }
    })
}

pub fn visibility_to_byte(visibility: Visibility) -> u8 {
    match visibility {
        Visibility::Default => 0,
        Visibility::Private => 1,
        Visibility::Protected => 2,
        Visibility::Public => 3,
        Visibility::Global => 4,
    }
}

pub fn byte_to_visibility(value: u8) -> SnapshotResult<Visibility> {
    Ok(match value {
        0 => Visibility::Default,
        1 => Visibility::Private,
        2 => Visibility::Protected,
        3 => Visibility::Public,
        4 => Visibility::Global,
        _ => {
            return Err(SnapshotError::UnknownEnumByte {
                field: "visibility",
                value,
            });
        }
    })
}

/// Sentinel for symbols that are not scope containers.
pub const SCOPE_TYPE_NONE: u8 = 0xFF;

pub fn scope_to_byte(scope: ScopeKind) -> u8 {
    match scope {
        ScopeKind::File => 0,
        ScopeKind::Class => 1,
        ScopeKind::Interface => 2,
        ScopeKind::Enum => 3,
        ScopeKind::Trigger => 4,
        ScopeKind::Method => 5,
        ScopeKind::Block => 6,
    }
}

pub fn byte_to_scope(value: u8) -> SnapshotResult<ScopeKind> {
    Ok(match value {
        0 => ScopeKind::File,
        1 => ScopeKind::Class,
        2 => ScopeKind::Interface,
        3 => ScopeKind::Enum,
        4 => ScopeKind::Trigger,
        5 => ScopeKind::Method,
        6 => ScopeKind::Block,
        _ => {
            return Err(SnapshotError::UnknownEnumByte {
                field: "scope type",
                value,
            });
        }
    })
}

/// Registry kind bytes: class/interface/enum only.
pub fn registry_kind_to_byte(kind: SymbolKind) -> u8 {
    match kind {
        SymbolKind::Interface => 1,
        SymbolKind::Enum => 2,
        _ => 0,
    }
}

pub fn byte_to_registry_kind(value: u8) -> SnapshotResult<SymbolKind> {
    Ok(match value {
        0 => SymbolKind::Class,
        1 => SymbolKind::Interface,
        2 => SymbolKind::Enum,
        _ => {
            return Err(SnapshotError::UnknownEnumByte {
                field: "registry kind",
                value,
            });
        }
    })
}

// =============================================================================
// Checksum
// =============================================================================

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit over `bytes`. Applied to everything after the header.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// =============================================================================
// Header
// =============================================================================

/// The 64-byte snapshot header.
///
/// Layout (offsets in bytes):
/// ```text
///  0 magic:u32           4 version:u32         8 flags:u32
/// 12 stringTableOffset   16 stringTableSize
/// 20 symbolTableOffset   24 symbolTableSize
/// 28 typeRegistryOffset  32 typeRegistrySize
/// 36 symbolCount:u32     40 typeRegistryCount:u32
/// 44 checksum:u64        52..64 reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u32,
    pub flags: u32,
    pub string_table_offset: u32,
    pub string_table_size: u32,
    pub symbol_table_offset: u32,
    pub symbol_table_size: u32,
    pub type_registry_offset: u32,
    pub type_registry_size: u32,
    pub symbol_count: u32,
    pub type_registry_count: u32,
    pub checksum: u64,
}

impl SnapshotHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.flags.to_le_bytes());
        out[12..16].copy_from_slice(&self.string_table_offset.to_le_bytes());
        out[16..20].copy_from_slice(&self.string_table_size.to_le_bytes());
        out[20..24].copy_from_slice(&self.symbol_table_offset.to_le_bytes());
        out[24..28].copy_from_slice(&self.symbol_table_size.to_le_bytes());
        out[28..32].copy_from_slice(&self.type_registry_offset.to_le_bytes());
        out[32..36].copy_from_slice(&self.type_registry_size.to_le_bytes());
        out[36..40].copy_from_slice(&self.symbol_count.to_le_bytes());
        out[40..44].copy_from_slice(&self.type_registry_count.to_le_bytes());
        out[44..52].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    /// Read and validate a header: wrong magic and unsupported versions are
    /// rejected here, before any payload is touched.
    pub fn read(bytes: &[u8]) -> SnapshotResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(SnapshotError::Truncated {
                section: "header",
                needed: HEADER_LEN,
                available: bytes.len(),
            });
        }
        let mut r = ByteReader::new(&bytes[..HEADER_LEN], "header");
        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(SnapshotError::BadMagic { found: magic });
        }
        let version = r.u32()?;
        if version != FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        let flags = r.u32()?;
        let string_table_offset = r.u32()?;
        let string_table_size = r.u32()?;
        let symbol_table_offset = r.u32()?;
        let symbol_table_size = r.u32()?;
        let type_registry_offset = r.u32()?;
        let type_registry_size = r.u32()?;
        let symbol_count = r.u32()?;
        let type_registry_count = r.u32()?;
        let checksum = r.u64()?;
        Ok(Self {
            version,
            flags,
            string_table_offset,
            string_table_size,
            symbol_table_offset,
            symbol_table_size,
            type_registry_offset,
            type_registry_size,
            symbol_count,
            type_registry_count,
            checksum,
        })
    }
}

/// Byte offset of the checksum slot inside the header, for back-patching
/// after the payload hash is known.
pub const CHECKSUM_SLOT: usize = 44;

// =============================================================================
// Bounds-checked little-endian reader
// =============================================================================

/// Cursor over a byte slice; every read is bounds-checked and failures carry
/// the section name.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    section: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8], section: &'static str) -> Self {
        Self {
            bytes,
            pos: 0,
            section,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn take(&mut self, n: usize) -> SnapshotResult<&'a [u8]> {
        let end = self.pos + n;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(SnapshotError::Truncated {
                section: self.section,
                needed: end,
                available: self.bytes.len(),
            })?;
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> SnapshotResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> SnapshotResult<u16> {
        let s = self.take(2)?;
        Ok(u16::from_le_bytes([s[0], s[1]]))
    }

    pub fn u32(&mut self) -> SnapshotResult<u32> {
        let s = self.take(4)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub fn u64(&mut self) -> SnapshotResult<u64> {
        let s = self.take(8)?;
        Ok(u64::from_le_bytes([
            s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
        ]))
    }

    pub fn range(&mut self) -> SnapshotResult<Range> {
        Ok(Range {
            start_line: self.u32()?,
            start_column: self.u32()?,
            end_line: self.u32()?,
            end_column: self.u32()?,
        })
    }

    pub fn skip(&mut self, n: usize) -> SnapshotResult<()> {
        self.take(n).map(|_| ())
    }
}

/// Append a [`Range`] to an output buffer.
pub fn write_range(out: &mut Vec<u8>, range: Range) {
    out.extend_from_slice(&range.start_line.to_le_bytes());
    out.extend_from_slice(&range.start_column.to_le_bytes());
    out.extend_from_slice(&range.end_line.to_le_bytes());
    out.extend_from_slice(&range.end_column.to_le_bytes());
}

/// Modifier flags round-trip through their raw `u16` mask; unknown bits are
/// dropped on read.
pub fn mask_to_flags(mask: u16) -> ModifierFlags {
    ModifierFlags::from_bits_truncate(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_spells_apex() {
        assert_eq!(&MAGIC.to_le_bytes(), b"APEX");
    }

    #[test]
    fn test_header_round_trip() {
        let header = SnapshotHeader {
            version: FORMAT_VERSION,
            flags: 0,
            string_table_offset: 64,
            string_table_size: 120,
            symbol_table_offset: 184,
            symbol_table_size: 400,
            type_registry_offset: 584,
            type_registry_size: 96,
            symbol_count: 5,
            type_registry_count: 2,
            checksum: 0xDEAD_BEEF_CAFE_F00D,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        let read = SnapshotHeader::read(&bytes).unwrap();
        assert_eq!(read, header);
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(b"NOPE");
        match SnapshotHeader::read(&bytes) {
            Err(SnapshotError::BadMagic { .. }) => {}
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let header = SnapshotHeader {
            version: FORMAT_VERSION,
            flags: 0,
            string_table_offset: 0,
            string_table_size: 0,
            symbol_table_offset: 0,
            symbol_table_size: 0,
            type_registry_offset: 0,
            type_registry_size: 0,
            symbol_count: 0,
            type_registry_count: 0,
            checksum: 0,
        };
        let mut bytes = header.to_bytes();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        match SnapshotHeader::read(&bytes) {
            Err(SnapshotError::UnsupportedVersion { found: 99, .. }) => {}
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn test_fnv1a64_known_vectors() {
        // Standard FNV-1a test vectors.
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_enum_bytes_round_trip() {
        for kind in [
            SymbolKind::Class,
            SymbolKind::Interface,
            SymbolKind::Enum,
            SymbolKind::Trigger,
            SymbolKind::Method,
            SymbolKind::Constructor,
            SymbolKind::Field,
            SymbolKind::Property,
            SymbolKind::Variable,
            SymbolKind::Parameter,
            SymbolKind::EnumValue,
            SymbolKind::Block,
        ] {
            assert_eq!(byte_to_kind(kind_to_byte(kind)).unwrap(), kind);
        }
        for vis in [
            Visibility::Default,
            Visibility::Private,
            Visibility::Protected,
            Visibility::Public,
            Visibility::Global,
        ] {
            assert_eq!(byte_to_visibility(visibility_to_byte(vis)).unwrap(), vis);
        }
        assert!(byte_to_kind(200).is_err());
    }
}
