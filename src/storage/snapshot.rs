//! Stdlib snapshot serialization.
//!
//! A snapshot packs every stdlib symbol table plus a pre-built type registry
//! behind one string table, so a cold start hydrates hundreds of files
//! without reparsing. Writing a snapshot is an offline build step; at
//! runtime the artifact is read-only.
//!
//! Serialization order: intern all strings, build the symbol section (file
//! table, then symbol records, then extended records; offsets are
//! section-relative), build the type registry and its indexes, assemble the
//! header, hash the payload and patch the checksum slot.

use crate::error::{SnapshotError, SnapshotResult};
use crate::storage::format::{
    self, ByteReader, CHECKSUM_SLOT, FORMAT_VERSION, HEADER_LEN, REGISTRY_RECORD_LEN,
    SCOPE_TYPE_NONE, SYMBOL_RECORD_LEN, SnapshotHeader, write_range,
};
use crate::storage::registry::{TypeRegistry, TypeRegistryEntry};
use crate::storage::string_table::{StringTableBuilder, StringTableReader};
use crate::symbol::{
    Modifiers, ParameterInfo, Symbol, SymbolDetail, SymbolTable, TypeInfo,
};
use crate::types::{SymbolId, SymbolKind, SymbolLocation, file_uri};
use std::collections::HashMap;
use std::time::Instant;

/// Extended-record tags.
const EXT_METHOD: u8 = 1;
const EXT_VARIABLE: u8 = 2;
const EXT_TYPE: u8 = 3;
const EXT_ENUM: u8 = 4;

/// Snapshot facts surfaced to the caller after a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotMetadata {
    pub version: u32,
    pub flags: u32,
    pub file_count: usize,
    pub symbol_count: usize,
    pub type_registry_count: usize,
}

/// A hydrated stdlib snapshot: prebuilt tables and registry indexes.
#[derive(Debug)]
pub struct StdlibSnapshot {
    pub symbol_tables: Vec<SymbolTable>,
    pub registry: TypeRegistry,
    pub load_time_ms: u64,
    pub metadata: SnapshotMetadata,
}

// =============================================================================
// Serialization
// =============================================================================

/// Serialize symbol tables and registry entries into the binary layout.
pub fn serialize(
    tables: &[SymbolTable],
    registry_entries: &[TypeRegistryEntry],
) -> SnapshotResult<Vec<u8>> {
    let mut strings = StringTableBuilder::new();

    // Intern everything up front so the record builders only look indices up.
    for table in tables {
        strings.intern(table.file_uri());
        for symbol in table.all_symbols() {
            strings.intern(symbol.id.as_str());
            strings.intern(&symbol.name);
            strings.intern_opt(symbol.parent_id.as_ref().map(|p| p.as_str()));
            strings.intern(symbol.fqn(table));
            strings.intern_opt(symbol.namespace.as_deref());
            intern_detail(&mut strings, symbol);
        }
    }
    for entry in registry_entries {
        strings.intern(&entry.fqn);
        strings.intern(&entry.name);
        strings.intern_opt(entry.namespace.as_deref());
        strings.intern(entry.symbol_id.as_str());
        strings.intern(&entry.file_uri);
        strings.intern(&entry.fqn.to_ascii_lowercase());
        strings.intern(&entry.name.to_ascii_lowercase());
    }

    // Symbol section: file table, records, extended area.
    let total_symbols: usize = tables.iter().map(|t| t.symbol_count()).sum();
    let mut file_table = Vec::new();
    file_table.extend_from_slice(&(tables.len() as u32).to_le_bytes());
    let mut records = Vec::with_capacity(total_symbols * SYMBOL_RECORD_LEN);
    // Offset 0 means "no extended data"; burn one pad byte so a real record
    // can never land there.
    let mut extended = vec![0u8];

    let mut record_index = 0u32;
    for table in tables {
        let uri_idx = strings.intern(table.file_uri());
        file_table.extend_from_slice(&uri_idx.to_le_bytes());
        file_table.extend_from_slice(&record_index.to_le_bytes());
        file_table.extend_from_slice(&(table.symbol_count() as u32).to_le_bytes());
        for symbol in table.all_symbols() {
            write_symbol_record(&mut records, &mut extended, &mut strings, table, symbol);
            record_index += 1;
        }
    }

    let mut symbol_section = file_table;
    symbol_section.extend_from_slice(&records);
    symbol_section.extend_from_slice(&extended);

    // Registry section with prebuilt indexes.
    let registry_section = write_registry_section(&mut strings, registry_entries);

    // String block is finalized last (interning is done), but physically
    // precedes the other sections.
    let string_block = strings.to_bytes();

    let string_table_offset = HEADER_LEN as u32;
    let symbol_table_offset = string_table_offset + string_block.len() as u32;
    let type_registry_offset = symbol_table_offset + symbol_section.len() as u32;

    let header = SnapshotHeader {
        version: FORMAT_VERSION,
        flags: 0,
        string_table_offset,
        string_table_size: string_block.len() as u32,
        symbol_table_offset,
        symbol_table_size: symbol_section.len() as u32,
        type_registry_offset,
        type_registry_size: registry_section.len() as u32,
        symbol_count: total_symbols as u32,
        type_registry_count: registry_entries.len() as u32,
        checksum: 0,
    };

    let mut out = Vec::with_capacity(
        HEADER_LEN + string_block.len() + symbol_section.len() + registry_section.len(),
    );
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&string_block);
    out.extend_from_slice(&symbol_section);
    out.extend_from_slice(&registry_section);

    // Checksum covers everything after the header; patch it into the slot.
    let checksum = format::fnv1a64(&out[HEADER_LEN..]);
    out[CHECKSUM_SLOT..CHECKSUM_SLOT + 8].copy_from_slice(&checksum.to_le_bytes());

    Ok(out)
}

fn intern_detail(strings: &mut StringTableBuilder, symbol: &Symbol) {
    match &symbol.detail {
        Some(SymbolDetail::Method {
            return_type,
            parameters,
            ..
        }) => {
            strings.intern(&return_type.original_type_string);
            for p in parameters {
                strings.intern(&p.name);
                strings.intern(&p.type_info.original_type_string);
            }
        }
        Some(SymbolDetail::Variable {
            value_type,
            initial_value,
        }) => {
            strings.intern(&value_type.original_type_string);
            strings.intern_opt(initial_value.as_deref());
        }
        Some(SymbolDetail::Type {
            super_class,
            interfaces,
        }) => {
            strings.intern_opt(super_class.as_ref().map(|t| t.original_type_string.as_str()));
            for i in interfaces {
                strings.intern(&i.original_type_string);
            }
        }
        Some(SymbolDetail::Enum { values }) => {
            for v in values {
                strings.intern(v);
            }
        }
        _ => {}
    }
}

fn write_symbol_record(
    records: &mut Vec<u8>,
    extended: &mut Vec<u8>,
    strings: &mut StringTableBuilder,
    table: &SymbolTable,
    symbol: &Symbol,
) {
    let ext_offset = write_extended_record(extended, strings, symbol);

    records.extend_from_slice(&strings.intern(symbol.id.as_str()).to_le_bytes());
    records.extend_from_slice(&strings.intern(&symbol.name).to_le_bytes());
    records.extend_from_slice(&strings.intern(symbol.file_uri.as_ref()).to_le_bytes());
    records.extend_from_slice(
        &strings
            .intern_opt(symbol.parent_id.as_ref().map(|p| p.as_str()))
            .to_le_bytes(),
    );
    records.extend_from_slice(&strings.intern(symbol.fqn(table)).to_le_bytes());
    records.extend_from_slice(
        &strings
            .intern_opt(symbol.namespace.as_deref())
            .to_le_bytes(),
    );
    records.push(format::kind_to_byte(symbol.kind));
    records.push(format::visibility_to_byte(symbol.modifiers.visibility));
    records.extend_from_slice(&symbol.modifiers.flags.bits().to_le_bytes());
    write_range(records, symbol.location.symbol_range);
    write_range(records, symbol.location.identifier_range);
    records.extend_from_slice(&ext_offset.to_le_bytes());
    let scope_byte = match &symbol.detail {
        Some(SymbolDetail::Block { scope }) => format::scope_to_byte(*scope),
        _ => SCOPE_TYPE_NONE,
    };
    records.push(scope_byte);
    records.extend_from_slice(&[0u8; 3]);
}

/// Returns the extended-area offset for the symbol, or 0 when it carries no
/// extension.
fn write_extended_record(
    extended: &mut Vec<u8>,
    strings: &mut StringTableBuilder,
    symbol: &Symbol,
) -> u32 {
    let offset = extended.len() as u32;
    match &symbol.detail {
        Some(SymbolDetail::Method {
            return_type,
            parameters,
            is_constructor,
            has_body,
        }) => {
            extended.push(EXT_METHOD);
            extended.extend_from_slice(
                &strings.intern(&return_type.original_type_string).to_le_bytes(),
            );
            extended.push(u8::from(*is_constructor));
            extended.push(u8::from(*has_body));
            extended.extend_from_slice(&(parameters.len() as u16).to_le_bytes());
            for p in parameters {
                extended.extend_from_slice(&strings.intern(&p.name).to_le_bytes());
                extended.extend_from_slice(
                    &strings.intern(&p.type_info.original_type_string).to_le_bytes(),
                );
            }
            offset
        }
        Some(SymbolDetail::Variable {
            value_type,
            initial_value,
        }) => {
            extended.push(EXT_VARIABLE);
            extended.extend_from_slice(
                &strings.intern(&value_type.original_type_string).to_le_bytes(),
            );
            extended.extend_from_slice(
                &strings.intern_opt(initial_value.as_deref()).to_le_bytes(),
            );
            offset
        }
        Some(SymbolDetail::Type {
            super_class,
            interfaces,
        }) => {
            extended.push(EXT_TYPE);
            extended.extend_from_slice(
                &strings
                    .intern_opt(super_class.as_ref().map(|t| t.original_type_string.as_str()))
                    .to_le_bytes(),
            );
            extended.extend_from_slice(&(interfaces.len() as u16).to_le_bytes());
            for i in interfaces {
                extended.extend_from_slice(
                    &strings.intern(&i.original_type_string).to_le_bytes(),
                );
            }
            offset
        }
        Some(SymbolDetail::Enum { values }) => {
            extended.push(EXT_ENUM);
            extended.extend_from_slice(&(values.len() as u16).to_le_bytes());
            for v in values {
                extended.extend_from_slice(&strings.intern(v).to_le_bytes());
            }
            offset
        }
        // Block scope type lives in the fixed record; no extension.
        Some(SymbolDetail::Block { .. }) | None => 0,
    }
}

fn write_registry_section(
    strings: &mut StringTableBuilder,
    entries: &[TypeRegistryEntry],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + entries.len() * REGISTRY_RECORD_LEN);
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        out.extend_from_slice(&strings.intern(&entry.fqn).to_le_bytes());
        out.extend_from_slice(&strings.intern(&entry.name).to_le_bytes());
        out.extend_from_slice(
            &strings.intern_opt(entry.namespace.as_deref()).to_le_bytes(),
        );
        out.extend_from_slice(&strings.intern(entry.symbol_id.as_str()).to_le_bytes());
        out.extend_from_slice(&strings.intern(&entry.file_uri).to_le_bytes());
        out.push(format::registry_kind_to_byte(entry.kind));
        out.push(u8::from(entry.is_stdlib));
        out.extend_from_slice(&[0u8; 2]);
    }

    // Prebuilt indexes, stored so hydration never recomputes them.
    // FQN index: lowercased fqn -> entry index.
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (i, entry) in entries.iter().enumerate() {
        let key = strings.intern(&entry.fqn.to_ascii_lowercase());
        out.extend_from_slice(&key.to_le_bytes());
        out.extend_from_slice(&(i as u32).to_le_bytes());
    }

    // Name index: lowercased simple name -> entry indices.
    let mut name_groups: Vec<(u32, Vec<u32>)> = Vec::new();
    let mut name_seen: HashMap<String, usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let lower = entry.name.to_ascii_lowercase();
        let key = strings.intern(&lower);
        match name_seen.get(&lower) {
            Some(&group) => name_groups[group].1.push(i as u32),
            None => {
                name_seen.insert(lower, name_groups.len());
                name_groups.push((key, vec![i as u32]));
            }
        }
    }
    write_index_groups(&mut out, &name_groups);

    // File index: file uri -> entry indices.
    let mut file_groups: Vec<(u32, Vec<u32>)> = Vec::new();
    let mut file_seen: HashMap<String, usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let key = strings.intern(&entry.file_uri);
        match file_seen.get(&entry.file_uri) {
            Some(&group) => file_groups[group].1.push(i as u32),
            None => {
                file_seen.insert(entry.file_uri.clone(), file_groups.len());
                file_groups.push((key, vec![i as u32]));
            }
        }
    }
    write_index_groups(&mut out, &file_groups);

    out
}

fn write_index_groups(out: &mut Vec<u8>, groups: &[(u32, Vec<u32>)]) {
    out.extend_from_slice(&(groups.len() as u32).to_le_bytes());
    for (key, members) in groups {
        out.extend_from_slice(&key.to_le_bytes());
        out.extend_from_slice(&(members.len() as u32).to_le_bytes());
        for m in members {
            out.extend_from_slice(&m.to_le_bytes());
        }
    }
}

// =============================================================================
// Deserialization
// =============================================================================

/// Deserialize a snapshot: header validation, checksum verification, record
/// reads, parent reattachment and direct-assignment hydration.
pub fn deserialize(bytes: &[u8]) -> SnapshotResult<StdlibSnapshot> {
    let started = Instant::now();

    let header = SnapshotHeader::read(bytes)?;
    let payload = bytes
        .get(HEADER_LEN..)
        .ok_or(SnapshotError::Truncated {
            section: "payload",
            needed: HEADER_LEN,
            available: bytes.len(),
        })?;
    let actual = format::fnv1a64(payload);
    if actual != header.checksum {
        return Err(SnapshotError::ChecksumMismatch {
            expected: header.checksum,
            actual,
        });
    }

    let strings = StringTableReader::from_bytes(section(
        bytes,
        header.string_table_offset,
        header.string_table_size,
        "string table",
    )?)?;

    let symbol_tables = read_symbol_section(
        section(
            bytes,
            header.symbol_table_offset,
            header.symbol_table_size,
            "symbol section",
        )?,
        &strings,
        header.symbol_count,
    )?;

    let registry = read_registry_section(
        section(
            bytes,
            header.type_registry_offset,
            header.type_registry_size,
            "type registry",
        )?,
        &strings,
        header.type_registry_count,
    )?;

    let metadata = SnapshotMetadata {
        version: header.version,
        flags: header.flags,
        file_count: symbol_tables.len(),
        symbol_count: header.symbol_count as usize,
        type_registry_count: header.type_registry_count as usize,
    };

    Ok(StdlibSnapshot {
        symbol_tables,
        registry,
        load_time_ms: started.elapsed().as_millis() as u64,
        metadata,
    })
}

fn section<'a>(
    bytes: &'a [u8],
    offset: u32,
    size: u32,
    name: &'static str,
) -> SnapshotResult<&'a [u8]> {
    let start = offset as usize;
    let end = start + size as usize;
    bytes.get(start..end).ok_or(SnapshotError::Truncated {
        section: name,
        needed: end,
        available: bytes.len(),
    })
}

fn read_symbol_section(
    bytes: &[u8],
    strings: &StringTableReader,
    total_symbols: u32,
) -> SnapshotResult<Vec<SymbolTable>> {
    let mut r = ByteReader::new(bytes, "symbol section");
    let file_count = r.u32()? as usize;
    let mut files = Vec::with_capacity(file_count);
    for _ in 0..file_count {
        let uri_idx = r.u32()?;
        let start = r.u32()?;
        let count = r.u32()?;
        files.push((uri_idx, start, count));
    }

    let records_base = r.position();
    let ext_base = records_base + total_symbols as usize * SYMBOL_RECORD_LEN;
    if ext_base > bytes.len() {
        return Err(SnapshotError::Truncated {
            section: "symbol records",
            needed: ext_base,
            available: bytes.len(),
        });
    }
    let extended = &bytes[ext_base..];

    let mut tables = Vec::with_capacity(file_count);
    for (uri_idx, start, count) in files {
        let uri = strings.get(uri_idx)?;
        let mut symbols = Vec::with_capacity(count as usize);
        for i in start..start + count {
            let record_start = records_base + i as usize * SYMBOL_RECORD_LEN;
            let mut rec = ByteReader::new(
                bytes
                    .get(record_start..record_start + SYMBOL_RECORD_LEN)
                    .ok_or(SnapshotError::Truncated {
                        section: "symbol records",
                        needed: record_start + SYMBOL_RECORD_LEN,
                        available: bytes.len(),
                    })?,
                "symbol record",
            );
            symbols.push(read_symbol_record(&mut rec, strings, extended)?);
        }
        let table = SymbolTable::hydrate(file_uri(uri.as_ref()), symbols, Vec::new())
            .map_err(|e| SnapshotError::CorruptTable {
                file_uri: uri.to_string(),
                reason: format!("{e:?}"),
            })?;
        tables.push(table);
    }
    Ok(tables)
}

fn read_symbol_record(
    rec: &mut ByteReader<'_>,
    strings: &StringTableReader,
    extended: &[u8],
) -> SnapshotResult<Symbol> {
    let id = strings.get(rec.u32()?)?;
    let name = strings.get(rec.u32()?)?;
    let uri = strings.get(rec.u32()?)?;
    let parent = strings.get_opt(rec.u32()?)?;
    let fqn = strings.get(rec.u32()?)?;
    let namespace = strings.get_opt(rec.u32()?)?;
    let kind = format::byte_to_kind(rec.u8()?)?;
    let visibility = format::byte_to_visibility(rec.u8()?)?;
    let flags = format::mask_to_flags(rec.u16()?);
    let symbol_range = rec.range()?;
    let identifier_range = rec.range()?;
    let ext_offset = rec.u32()?;
    let scope_byte = rec.u8()?;
    rec.skip(3)?;

    let detail = if ext_offset != 0 {
        Some(read_extended_record(extended, ext_offset, strings)?)
    } else if kind == SymbolKind::Block && scope_byte != SCOPE_TYPE_NONE {
        Some(SymbolDetail::Block {
            scope: format::byte_to_scope(scope_byte)?,
        })
    } else {
        None
    };

    let mut symbol = Symbol::assemble(
        SymbolId::from_raw(id.as_ref()),
        name.to_string(),
        kind,
        file_uri(uri.as_ref()),
        SymbolLocation::new(symbol_range, identifier_range),
        parent.map(SymbolId::from_raw),
        namespace.map(|n| n.to_string()),
        Modifiers::new(visibility, flags),
        Vec::new(),
        detail,
    );
    symbol.set_precomputed_fqn(&fqn);
    Ok(symbol)
}

fn read_extended_record(
    extended: &[u8],
    offset: u32,
    strings: &StringTableReader,
) -> SnapshotResult<SymbolDetail> {
    let mut r = ByteReader::new(extended, "extended records");
    r.seek(offset as usize);
    let tag = r.u8()?;
    match tag {
        EXT_METHOD => {
            let return_type = TypeInfo::parse(&strings.get(r.u32()?)?);
            let is_constructor = r.u8()? != 0;
            let has_body = r.u8()? != 0;
            let param_count = r.u16()? as usize;
            let mut parameters = Vec::with_capacity(param_count);
            for _ in 0..param_count {
                let name = strings.get(r.u32()?)?.to_string();
                let type_info = TypeInfo::parse(&strings.get(r.u32()?)?);
                parameters.push(ParameterInfo { name, type_info });
            }
            Ok(SymbolDetail::Method {
                return_type,
                parameters,
                is_constructor,
                has_body,
            })
        }
        EXT_VARIABLE => {
            let value_type = TypeInfo::parse(&strings.get(r.u32()?)?);
            let initial_value = strings.get_opt(r.u32()?)?.map(|s| s.to_string());
            Ok(SymbolDetail::Variable {
                value_type,
                initial_value,
            })
        }
        EXT_TYPE => {
            let super_class = strings
                .get_opt(r.u32()?)?
                .map(|s| TypeInfo::parse(&s));
            let iface_count = r.u16()? as usize;
            let mut interfaces = Vec::with_capacity(iface_count);
            for _ in 0..iface_count {
                interfaces.push(TypeInfo::parse(&strings.get(r.u32()?)?));
            }
            Ok(SymbolDetail::Type {
                super_class,
                interfaces,
            })
        }
        EXT_ENUM => {
            let count = r.u16()? as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(strings.get(r.u32()?)?.to_string());
            }
            Ok(SymbolDetail::Enum { values })
        }
        _ => Err(SnapshotError::UnknownEnumByte {
            field: "extended tag",
            value: tag,
        }),
    }
}

fn read_registry_section(
    bytes: &[u8],
    strings: &StringTableReader,
    expected_count: u32,
) -> SnapshotResult<TypeRegistry> {
    let mut r = ByteReader::new(bytes, "type registry");
    let count = r.u32()?;
    if count != expected_count {
        return Err(SnapshotError::CorruptTable {
            file_uri: "<registry>".to_string(),
            reason: format!("header says {expected_count} entries, section says {count}"),
        });
    }
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let fqn = strings.get(r.u32()?)?.to_string();
        let name = strings.get(r.u32()?)?.to_string();
        let namespace = strings.get_opt(r.u32()?)?.map(|s| s.to_string());
        let symbol_id = SymbolId::from_raw(strings.get(r.u32()?)?);
        let file_uri = strings.get(r.u32()?)?.to_string();
        let kind = format::byte_to_registry_kind(r.u8()?)?;
        let is_stdlib = r.u8()? != 0;
        r.skip(2)?;
        entries.push(TypeRegistryEntry {
            fqn,
            name,
            namespace,
            kind,
            symbol_id,
            file_uri,
            is_stdlib,
        });
    }

    // Indexes come from the stored lists, not from recomputation.
    let fqn_count = r.u32()? as usize;
    let mut fqn_index = HashMap::with_capacity(fqn_count);
    for _ in 0..fqn_count {
        let key = strings.get(r.u32()?)?.to_string();
        let entry = r.u32()? as usize;
        fqn_index.insert(key, entry);
    }

    let name_index = read_index_groups(&mut r, strings)?;
    let file_index = read_index_groups(&mut r, strings)?;

    Ok(TypeRegistry::from_parts(
        entries, fqn_index, name_index, file_index,
    ))
}

fn read_index_groups(
    r: &mut ByteReader<'_>,
    strings: &StringTableReader,
) -> SnapshotResult<HashMap<String, Vec<usize>>> {
    let group_count = r.u32()? as usize;
    let mut index = HashMap::with_capacity(group_count);
    for _ in 0..group_count {
        let key = strings.get(r.u32()?)?.to_string();
        let member_count = r.u32()? as usize;
        let mut members = Vec::with_capacity(member_count);
        for _ in 0..member_count {
            members.push(r.u32()? as usize);
        }
        index.insert(key, members);
    }
    Ok(index)
}
