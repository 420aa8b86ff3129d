//! String interning for the binary snapshot.
//!
//! The builder interns strings to stable `u32` indices in first-insertion
//! order. Index 0 is reserved for the empty string and stands in for absent
//! values. The reader is bounds-checked random access over the serialized
//! block, caching each decode.

use crate::error::{SnapshotError, SnapshotResult};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Interns strings while building a snapshot.
#[derive(Debug, Default)]
pub struct StringTableBuilder {
    entries: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringTableBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        // Index 0 is always the empty string.
        builder.entries.push(String::new());
        builder.index.insert(String::new(), 0);
        builder
    }

    /// Intern a string, returning its stable index. Duplicates return the
    /// first-insertion index; the empty string is always 0.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.entries.len() as u32;
        self.entries.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    /// Absent values intern to index 0.
    pub fn intern_opt(&mut self, s: Option<&str>) -> u32 {
        match s {
            Some(s) => self.intern(s),
            None => 0,
        }
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        // Never true: index 0 exists from construction.
        self.entries.is_empty()
    }

    /// Serialize as a length-prefixed block: `count:u32`, then each entry as
    /// `len:u32` + UTF-8 bytes. Little-endian throughout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.entries.iter().map(|e| 4 + e.len()).sum::<usize>());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            out.extend_from_slice(entry.as_bytes());
        }
        out
    }
}

/// Random-access reader over a serialized string table.
#[derive(Debug)]
pub struct StringTableReader {
    data: Vec<u8>,
    /// Byte spans into `data`, one per entry.
    spans: Vec<(usize, usize)>,
    /// Decoded-string cache, filled on first access per slot.
    cache: Vec<OnceLock<Arc<str>>>,
}

impl StringTableReader {
    /// Parse the block layout, validating every length prefix against the
    /// available bytes. Decoding is deferred until [`get`](Self::get).
    pub fn from_bytes(bytes: &[u8]) -> SnapshotResult<Self> {
        let mut pos = 0usize;
        let count = read_u32(bytes, &mut pos, "string table")? as usize;
        let mut spans = Vec::with_capacity(count);
        for _ in 0..count {
            let len = read_u32(bytes, &mut pos, "string table")? as usize;
            if pos + len > bytes.len() {
                return Err(SnapshotError::Truncated {
                    section: "string table",
                    needed: pos + len,
                    available: bytes.len(),
                });
            }
            spans.push((pos, pos + len));
            pos += len;
        }
        let cache = (0..count).map(|_| OnceLock::new()).collect();
        Ok(Self {
            data: bytes[..pos].to_vec(),
            spans,
            cache,
        })
    }

    pub fn len(&self) -> u32 {
        self.spans.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Fetch the string at `index`. Out-of-range indices fail with a bounds
    /// error; repeated reads hit the decode cache.
    pub fn get(&self, index: u32) -> SnapshotResult<Arc<str>> {
        let slot = self
            .spans
            .get(index as usize)
            .ok_or(SnapshotError::StringIndexOutOfRange {
                index,
                len: self.len(),
            })?;
        let cached = self.cache[index as usize].get_or_init(|| {
            let raw = &self.data[slot.0..slot.1];
            Arc::from(String::from_utf8_lossy(raw).as_ref())
        });
        Ok(cached.clone())
    }

    /// Index 0 (and only index 0) decodes to the empty string and maps back
    /// to `None`.
    pub fn get_opt(&self, index: u32) -> SnapshotResult<Option<Arc<str>>> {
        if index == 0 {
            return Ok(None);
        }
        self.get(index).map(Some)
    }
}

fn read_u32(bytes: &[u8], pos: &mut usize, section: &'static str) -> SnapshotResult<u32> {
    let end = *pos + 4;
    let slice = bytes
        .get(*pos..end)
        .ok_or(SnapshotError::Truncated {
            section,
            needed: end,
            available: bytes.len(),
        })?;
    *pos = end;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}
