//! Per-file symbol table and the scope stack driving collection.
//!
//! The table owns the ordered symbol list, the id map, the root symbol and
//! the raw [`TypeReference`] list captured during the walk. The scope stack
//! is live only while the collector runs; afterwards the table is an
//! immutable record handed to the graph.

use crate::symbol::{Symbol, SymbolDetail};
use crate::types::{
    AccessKind, FileUri, Range, ReferenceKind, ScopeKind, SymbolId, SymbolKind, SymbolLocation,
};
use std::collections::HashMap;

/// A usage site recorded during collection. Raw until the graph links it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeReference {
    pub name: String,
    pub kind: ReferenceKind,
    pub location: Range,
    pub qualifier: Option<String>,
    /// Simple name of the enclosing method, when the usage sits inside one.
    pub parent_context_method: Option<String>,
    pub access: Option<AccessKind>,
    /// Literal/known argument types at a call site, in argument order.
    /// `None` entries are arguments the collector could not type.
    pub argument_type_hints: Option<Vec<Option<String>>>,
    /// Declared type of the assignment target when the call is an
    /// initializer, used by return-type checking.
    pub expected_return_type: Option<String>,
}

impl TypeReference {
    pub fn new(name: impl Into<String>, kind: ReferenceKind, location: Range) -> Self {
        Self {
            name: name.into(),
            kind,
            location,
            qualifier: None,
            parent_context_method: None,
            access: None,
            argument_type_hints: None,
            expected_return_type: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_access(mut self, access: AccessKind) -> Self {
        self.access = Some(access);
        self
    }
}

/// One level of the collection-time scope stack.
#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub kind: ScopeKind,
    pub symbol_ids: Vec<SymbolId>,
}

impl Scope {
    fn new(name: impl Into<String>, kind: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            symbol_ids: Vec::new(),
        }
    }
}

/// Error from a rejected table write. The collector reports these through
/// its diagnostics and keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableWriteError {
    DuplicateId(SymbolId),
    ParentCycle(SymbolId),
    UnknownParent(SymbolId),
}

/// Owner of one file's symbols.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    file_uri: FileUri,
    symbols: Vec<Symbol>,
    by_id: HashMap<SymbolId, usize>,
    root_id: SymbolId,
    scopes: Vec<Scope>,
    references: Vec<TypeReference>,
    block_counter: u32,
}

impl SymbolTable {
    /// Root scope name; first segment of every scope path.
    pub const ROOT_SCOPE: &'static str = "File";

    pub fn new(file_uri: FileUri) -> Self {
        let root = Symbol::assemble(
            SymbolId::derive(&file_uri, &[], SymbolKind::Block, Self::ROOT_SCOPE),
            Self::ROOT_SCOPE.to_string(),
            SymbolKind::Block,
            file_uri.clone(),
            SymbolLocation::default(),
            None,
            None,
            Default::default(),
            Vec::new(),
            Some(SymbolDetail::Block {
                scope: ScopeKind::File,
            }),
        );
        let root_id = root.id.clone();
        let mut by_id = HashMap::new();
        by_id.insert(root_id.clone(), 0);
        Self {
            file_uri,
            symbols: vec![root],
            by_id,
            root_id,
            scopes: vec![Scope::new(Self::ROOT_SCOPE, ScopeKind::File)],
            references: Vec::new(),
            block_counter: 0,
        }
    }

    pub fn file_uri(&self) -> &FileUri {
        &self.file_uri
    }

    pub fn root(&self) -> &Symbol {
        // Index 0 is the root by construction.
        &self.symbols[0]
    }

    pub fn root_id(&self) -> &SymbolId {
        &self.root_id
    }

    // =========================================================================
    // Scope stack
    // =========================================================================

    pub fn push_scope(&mut self, name: impl Into<String>, kind: ScopeKind) {
        self.scopes.push(Scope::new(name, kind));
    }

    pub fn pop_scope(&mut self) -> Option<Scope> {
        // The root scope is never popped.
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Synthetic name for the next block scope. Monotonic per table, so
    /// sibling blocks never alias.
    pub fn next_block_name(&mut self) -> String {
        self.block_counter += 1;
        format!("block{}", self.block_counter)
    }

    /// Ordered scope names from the file root to the innermost scope.
    pub fn scope_path(&self) -> Vec<String> {
        self.scopes.iter().map(|s| s.name.clone()).collect()
    }

    pub fn current_scope(&self) -> &Scope {
        self.scopes.last().unwrap_or(&self.scopes[0])
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert a symbol into the table and the current scope.
    ///
    /// Rejects duplicate ids, unknown parents and parent cycles; the caller
    /// reports the error and continues building.
    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<(), TableWriteError> {
        if self.by_id.contains_key(&symbol.id) {
            return Err(TableWriteError::DuplicateId(symbol.id));
        }
        if let Some(pid) = &symbol.parent_id {
            if !self.by_id.contains_key(pid) {
                return Err(TableWriteError::UnknownParent(pid.clone()));
            }
            if self.would_cycle(&symbol.id, pid) {
                return Err(TableWriteError::ParentCycle(symbol.id));
            }
        }
        let idx = self.symbols.len();
        self.by_id.insert(symbol.id.clone(), idx);
        if let Some(scope) = self.scopes.last_mut() {
            scope.symbol_ids.push(symbol.id.clone());
        }
        self.symbols.push(symbol);
        Ok(())
    }

    fn would_cycle(&self, new_id: &SymbolId, parent: &SymbolId) -> bool {
        let mut cursor = Some(parent.clone());
        while let Some(id) = cursor {
            if &id == new_id {
                return true;
            }
            cursor = self.get(&id).and_then(|s| s.parent_id.clone());
        }
        false
    }

    pub fn add_reference(&mut self, reference: TypeReference) {
        self.references.push(reference);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: &SymbolId) -> Option<&Symbol> {
        self.by_id.get(id).map(|&i| &self.symbols[i])
    }

    pub fn get_mut(&mut self, id: &SymbolId) -> Option<&mut Symbol> {
        let idx = *self.by_id.get(id)?;
        self.symbols.get_mut(idx)
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.by_id.contains_key(id)
    }

    /// All symbols in insertion order, root and blocks included.
    pub fn all_symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Symbols external consumers see: everything except scope containers.
    pub fn user_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| !s.kind.is_scope_only())
    }

    pub fn symbols_of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(move |s| s.kind == kind)
    }

    pub fn references(&self) -> &[TypeReference] {
        &self.references
    }

    pub(crate) fn references_mut(&mut self) -> &mut Vec<TypeReference> {
        &mut self.references
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Case-insensitive lookup in the innermost scope only. Used by the
    /// duplicate policy and by dotted-expression disambiguation.
    pub fn find_in_current_scope(&self, name: &str) -> Option<&Symbol> {
        let scope = self.scopes.last()?;
        scope
            .symbol_ids
            .iter()
            .filter_map(|id| self.get(id))
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitive lookup walking the scope stack outwards.
    pub fn find_in_scope_chain(&self, name: &str) -> Option<&Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(found) = scope
                .symbol_ids
                .iter()
                .filter_map(|id| self.get(id))
                .find(|s| s.name.eq_ignore_ascii_case(name))
            {
                return Some(found);
            }
        }
        None
    }

    /// Direct children of a symbol, in declaration order.
    pub fn children_of(&self, parent: &SymbolId) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|s| s.parent_id.as_ref() == Some(parent))
            .collect()
    }

    /// Methods and constructors declared directly on a type.
    pub fn methods_of(&self, type_id: &SymbolId) -> Vec<&Symbol> {
        self.children_of(type_id)
            .into_iter()
            .filter(|s| matches!(s.kind, SymbolKind::Method | SymbolKind::Constructor))
            .collect()
    }

    /// Type-introducing symbols declared in this file.
    pub fn declared_types(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter().filter(|s| s.kind.is_type())
    }

    // =========================================================================
    // Hydration (binary cache fast path)
    // =========================================================================

    /// Rebuild a table by direct assignment of prebuilt arrays, bypassing the
    /// add-symbol path. The caller guarantees the invariants the write path
    /// would have enforced; parent chains are still verified.
    pub fn hydrate(
        file_uri: FileUri,
        symbols: Vec<Symbol>,
        references: Vec<TypeReference>,
    ) -> Result<Self, TableWriteError> {
        let mut by_id = HashMap::with_capacity(symbols.len());
        for (idx, symbol) in symbols.iter().enumerate() {
            if by_id.insert(symbol.id.clone(), idx).is_some() {
                return Err(TableWriteError::DuplicateId(symbol.id.clone()));
            }
        }
        let root_id = symbols
            .first()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| SymbolId::derive(&file_uri, &[], SymbolKind::Block, Self::ROOT_SCOPE));
        let table = Self {
            file_uri,
            symbols,
            by_id,
            root_id,
            scopes: vec![Scope::new(Self::ROOT_SCOPE, ScopeKind::File)],
            references,
            block_counter: 0,
        };
        // Parent chains must stay acyclic even on the fast path.
        for symbol in &table.symbols {
            if let Some(pid) = &symbol.parent_id {
                if !table.by_id.contains_key(pid) {
                    return Err(TableWriteError::UnknownParent(pid.clone()));
                }
                if table.would_cycle(&symbol.id, pid) {
                    return Err(TableWriteError::ParentCycle(symbol.id.clone()));
                }
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolFactory;
    use crate::types::file_uri;

    fn table_and_factory() -> (SymbolTable, SymbolFactory) {
        let uri = file_uri("file:///Foo.cls");
        (
            SymbolTable::new(uri.clone()),
            SymbolFactory::new(uri, None),
        )
    }

    #[test]
    fn test_scope_path_tracks_stack() {
        let (mut table, _) = table_and_factory();
        assert_eq!(table.scope_path(), vec!["File".to_string()]);
        table.push_scope("Outer", ScopeKind::Class);
        table.push_scope("run", ScopeKind::Method);
        assert_eq!(
            table.scope_path(),
            vec!["File".to_string(), "Outer".to_string(), "run".to_string()]
        );
        table.pop_scope();
        table.pop_scope();
        // Root scope never pops.
        table.pop_scope();
        assert_eq!(table.scope_path(), vec!["File".to_string()]);
    }

    #[test]
    fn test_add_symbol_rejects_duplicate_id() {
        let (mut table, factory) = table_and_factory();
        let sym = factory.full(
            SymbolKind::Class,
            "Foo",
            SymbolLocation::at(Range::new(1, 0, 1, 3)),
            &table.scope_path(),
            None,
            Default::default(),
            Vec::new(),
            None,
        );
        table.add_symbol(sym.clone()).unwrap();
        assert!(matches!(
            table.add_symbol(sym),
            Err(TableWriteError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_add_symbol_rejects_unknown_parent() {
        let (mut table, factory) = table_and_factory();
        let ghost = SymbolId::from_raw("nowhere#class#Ghost");
        let mut sym = factory.full(
            SymbolKind::Method,
            "run",
            SymbolLocation::default(),
            &table.scope_path(),
            None,
            Default::default(),
            Vec::new(),
            None,
        );
        sym.parent_id = Some(ghost);
        assert!(matches!(
            table.add_symbol(sym),
            Err(TableWriteError::UnknownParent(_))
        ));
    }

    #[test]
    fn test_user_symbols_exclude_blocks() {
        let (mut table, factory) = table_and_factory();
        let class = factory.full(
            SymbolKind::Class,
            "Foo",
            SymbolLocation::default(),
            &table.scope_path(),
            None,
            Default::default(),
            Vec::new(),
            None,
        );
        table.add_symbol(class).unwrap();
        let block_name = table.next_block_name();
        let block = factory.full(
            SymbolKind::Block,
            &block_name,
            SymbolLocation::default(),
            &table.scope_path(),
            None,
            Default::default(),
            Vec::new(),
            Some(SymbolDetail::Block {
                scope: ScopeKind::Block,
            }),
        );
        table.add_symbol(block).unwrap();

        let names: Vec<_> = table.user_symbols().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Foo"]);
    }

    #[test]
    fn test_find_in_current_scope_is_case_insensitive() {
        let (mut table, factory) = table_and_factory();
        let sym = factory.full(
            SymbolKind::Variable,
            "counter",
            SymbolLocation::default(),
            &table.scope_path(),
            None,
            Default::default(),
            Vec::new(),
            None,
        );
        table.add_symbol(sym).unwrap();
        assert!(table.find_in_current_scope("COUNTER").is_some());
        table.push_scope("inner", ScopeKind::Block);
        assert!(table.find_in_current_scope("counter").is_none());
        assert!(table.find_in_scope_chain("Counter").is_some());
    }

    #[test]
    fn test_block_names_are_unique() {
        let (mut table, _) = table_and_factory();
        let a = table.next_block_name();
        let b = table.next_block_name();
        assert_ne!(a, b);
    }
}
