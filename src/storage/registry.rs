//! Type registry: locate the declaring file of a type without walking the
//! graph. The stdlib snapshot ships a prebuilt registry; user compilations
//! append to it as files register.

use crate::types::{SymbolId, SymbolKind};
use std::collections::HashMap;

/// One registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRegistryEntry {
    pub fqn: String,
    pub name: String,
    pub namespace: Option<String>,
    /// Class, interface or enum.
    pub kind: SymbolKind,
    pub symbol_id: SymbolId,
    pub file_uri: String,
    pub is_stdlib: bool,
}

/// Registry with case-insensitive FQN/name indexes and a file index.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: Vec<TypeRegistryEntry>,
    /// Lowercased FQN -> entry. At most one id per FQN.
    fqn_index: HashMap<String, usize>,
    /// Lowercased simple name -> entries, insertion order.
    name_index: HashMap<String, Vec<usize>>,
    /// File URI -> entries declared there.
    file_index: HashMap<String, Vec<usize>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from stored prebuilt index lists (snapshot
    /// hydration path; nothing is recomputed from the entries).
    pub fn from_parts(
        entries: Vec<TypeRegistryEntry>,
        fqn_index: HashMap<String, usize>,
        name_index: HashMap<String, Vec<usize>>,
        file_index: HashMap<String, Vec<usize>>,
    ) -> Self {
        Self {
            entries,
            fqn_index,
            name_index,
            file_index,
        }
    }

    pub fn add(&mut self, entry: TypeRegistryEntry) {
        let idx = self.entries.len();
        self.fqn_index.insert(entry.fqn.to_ascii_lowercase(), idx);
        self.name_index
            .entry(entry.name.to_ascii_lowercase())
            .or_default()
            .push(idx);
        self.file_index
            .entry(entry.file_uri.clone())
            .or_default()
            .push(idx);
        self.entries.push(entry);
    }

    pub fn by_fqn(&self, fqn: &str) -> Option<&TypeRegistryEntry> {
        self.fqn_index
            .get(&fqn.to_ascii_lowercase())
            .map(|&i| &self.entries[i])
    }

    pub fn by_name(&self, name: &str) -> Vec<&TypeRegistryEntry> {
        self.name_index
            .get(&name.to_ascii_lowercase())
            .map(|ids| ids.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub fn by_file(&self, file_uri: &str) -> Vec<&TypeRegistryEntry> {
        self.file_index
            .get(file_uri)
            .map(|ids| ids.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &[TypeRegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn fqn_index(&self) -> &HashMap<String, usize> {
        &self.fqn_index
    }

    pub fn name_index(&self) -> &HashMap<String, Vec<usize>> {
        &self.name_index
    }

    pub fn file_index(&self) -> &HashMap<String, Vec<usize>> {
        &self.file_index
    }
}
