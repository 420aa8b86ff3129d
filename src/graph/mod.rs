//! Process-wide symbol graph.
//!
//! Nodes are symbols keyed by id; edges are typed references between them.
//! Side indexes (file, lowercased name, lowercased FQN) are maintained
//! incrementally on every write; there is no rebuild step. Replacing a file
//! is atomic: delete-then-add under one write lock, so no observer ever sees
//! a partial symbol set.
//!
//! The graph is the shared state between concurrently compiled documents;
//! every mutation goes through the public operations here.

pub mod cache;
pub mod export;

pub use cache::UnifiedCache;
pub use export::{GraphData, GraphEdge, GraphMetadata, GraphNode};

use crate::symbol::{Symbol, SymbolTable};
use crate::types::{FileUri, ReferenceKind, SymbolId, SymbolKind};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Weight applied to transitive dependents in the impact score.
const TRANSITIVE_WEIGHT: f64 = 0.5;

/// Depth cap for the transitive-dependent walk.
const TRANSITIVE_DEPTH: usize = 8;

/// Edge flavor. Contains edges derive from `parent_id`; Dependency edges
/// link declaring types across files and feed cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Contains,
    Dependency,
    Reference(ReferenceKind),
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Dependency => "dependency",
            Self::Reference(kind) => kind.as_str(),
        }
    }
}

/// A directed edge between two registered symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    pub source: SymbolId,
    pub target: SymbolId,
    pub kind: EdgeKind,
    pub source_file: FileUri,
    pub target_file: FileUri,
    pub context: Option<String>,
}

/// An incoming or outgoing reference projected for a caller.
#[derive(Debug, Clone)]
pub struct SymbolReference {
    pub symbol: Symbol,
    pub reference_kind: EdgeKind,
    pub context: Option<String>,
}

/// Result of a context-aware name lookup.
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub symbol: Option<Symbol>,
    /// 1.0 single match, 0.5 disambiguated, 0.0 none.
    pub confidence: f64,
    pub is_ambiguous: bool,
    pub candidates: Option<Vec<Symbol>>,
    /// Which rung of the ladder decided: `exact`, `same-file`,
    /// `imported-namespace`, `same-namespace`, `first-candidate` or `none`.
    pub resolution_context: &'static str,
}

/// Hints steering ambiguous name resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    pub source_file: Option<String>,
    pub imported_namespaces: Vec<String>,
    pub namespace: Option<String>,
}

/// Dependency fan-in/fan-out for one symbol.
#[derive(Debug, Clone)]
pub struct DependencyAnalysis {
    pub dependencies: Vec<SymbolId>,
    pub dependents: Vec<SymbolId>,
    pub impact_score: f64,
}

#[derive(Clone)]
enum CachedValue {
    Ids(Vec<SymbolId>),
    Fqn(Option<SymbolId>),
    Analysis(Arc<DependencyAnalysis>),
}

#[derive(Default)]
struct GraphInner {
    /// Insertion-ordered: drives deterministic ambiguity tie-breaks.
    nodes: IndexMap<SymbolId, Symbol>,
    edges: Vec<ReferenceEdge>,
    /// Idempotency set for `(source, target, kind)`.
    edge_keys: HashSet<(SymbolId, SymbolId, EdgeKind)>,
    outgoing: HashMap<SymbolId, Vec<usize>>,
    incoming: HashMap<SymbolId, Vec<usize>>,
    file_index: HashMap<String, IndexSet<SymbolId>>,
    name_index: HashMap<String, IndexSet<SymbolId>>,
    fqn_index: HashMap<String, SymbolId>,
    tables: HashMap<String, Arc<SymbolTable>>,
}

/// The shared multi-file symbol graph. Create one per process and thread a
/// handle through the engine; there is no implicit global.
pub struct SymbolGraph {
    inner: RwLock<GraphInner>,
    cache: UnifiedCache<CachedValue>,
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
            cache: UnifiedCache::new(),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert one symbol. Low-level path; most callers register whole tables.
    pub fn add_symbol(&self, symbol: Symbol, fqn: Option<String>) {
        let mut inner = self.inner.write();
        Self::insert_symbol(&mut inner, symbol, fqn);
        self.invalidate_lookups();
    }

    fn insert_symbol(inner: &mut GraphInner, symbol: Symbol, fqn: Option<String>) {
        let id = symbol.id.clone();
        inner
            .file_index
            .entry(symbol.file_uri.to_string())
            .or_default()
            .insert(id.clone());
        if !symbol.kind.is_scope_only() {
            inner
                .name_index
                .entry(symbol.name.to_ascii_lowercase())
                .or_default()
                .insert(id.clone());
            if let Some(fqn) = fqn {
                inner.fqn_index.insert(fqn.to_ascii_lowercase(), id.clone());
            }
        }
        inner.nodes.insert(id, symbol);
    }

    /// Register a compiled table: atomically replaces the file's previous
    /// symbols, records the table, and links the table's raw references into
    /// edges. Within the file, insertion order is preserved.
    pub fn add_symbols_from_table(&self, table: Arc<SymbolTable>) {
        let uri = table.file_uri().to_string();
        let mut inner = self.inner.write();
        Self::remove_file_locked(&mut inner, &uri);

        for symbol in table.all_symbols() {
            let fqn = if symbol.kind.is_scope_only() {
                None
            } else {
                Some(symbol.fqn(&table).to_string())
            };
            Self::insert_symbol(&mut inner, symbol.clone(), fqn);
        }
        inner.tables.insert(uri.clone(), Arc::clone(&table));

        Self::link_references(&mut inner, &table);
        drop(inner);
        self.invalidate_lookups();
        tracing::debug!("registered {} symbols for {uri}", table.symbol_count());
    }

    /// Register many tables at once (snapshot hydration), yielding
    /// cooperatively between file batches.
    pub async fn register_tables(&self, tables: Vec<Arc<SymbolTable>>) {
        for (processed, table) in tables.into_iter().enumerate() {
            if processed > 0 && processed % export::FILE_YIELD_BATCH == 0 {
                tokio::task::yield_now().await;
            }
            self.add_symbols_from_table(table);
        }
    }

    /// Resolve the table's raw references into edges. The edge source is the
    /// innermost enclosing type of the reference site; unresolved targets
    /// stay raw (no edge).
    fn link_references(inner: &mut GraphInner, table: &SymbolTable) {
        let declared: Vec<SymbolId> = table.declared_types().map(|s| s.id.clone()).collect();
        let fallback_source = declared.first().cloned();

        for reference in table.references() {
            let source = reference
                .parent_context_method
                .as_deref()
                .and_then(|m| {
                    // Enclosing type of the named method.
                    table
                        .symbols_of_kind(SymbolKind::Method)
                        .chain(table.symbols_of_kind(SymbolKind::Constructor))
                        .find(|s| s.name.eq_ignore_ascii_case(m))
                        .and_then(|m| m.parent_id.clone())
                })
                .or_else(|| fallback_source.clone());
            let Some(source) = source else { continue };

            // Resolution: same table first, then the graph-wide name index.
            let target = table
                .user_symbols()
                .find(|s| {
                    s.name.eq_ignore_ascii_case(&reference.name)
                        && s.kind.is_type()
                })
                .map(|s| s.id.clone())
                .or_else(|| {
                    inner
                        .name_index
                        .get(&reference.name.to_ascii_lowercase())
                        .and_then(|ids| ids.first().cloned())
                });
            let Some(target) = target else { continue };
            if target == source {
                continue;
            }

            Self::insert_edge(
                inner,
                source.clone(),
                target.clone(),
                EdgeKind::Reference(reference.kind),
                reference.parent_context_method.clone(),
            );

            // Cross-file type dependency feeds impact and cycle analysis.
            let source_file = inner.nodes.get(&source).map(|s| s.file_uri.clone());
            let target_type = Self::enclosing_type(inner, &target);
            if let (Some(sf), Some(tt)) = (source_file, target_type) {
                let crosses_files = inner
                    .nodes
                    .get(&tt)
                    .is_some_and(|t| t.file_uri.as_ref() != sf.as_ref());
                if crosses_files && tt != source {
                    Self::insert_edge(inner, source, tt, EdgeKind::Dependency, None);
                }
            }
        }
    }

    fn enclosing_type(inner: &GraphInner, id: &SymbolId) -> Option<SymbolId> {
        let mut cursor = Some(id.clone());
        while let Some(current) = cursor {
            let symbol = inner.nodes.get(&current)?;
            if symbol.kind.is_type() {
                return Some(current);
            }
            cursor = symbol.parent_id.clone();
        }
        None
    }

    /// Create or update an edge. Duplicates by `(source, target, kind)` are
    /// idempotent. Both endpoints must be registered; dangling writes are
    /// rejected, never silently recorded.
    pub fn add_edge(
        &self,
        source: &SymbolId,
        target: &SymbolId,
        kind: EdgeKind,
        context: Option<String>,
    ) -> crate::error::GraphResult<()> {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(source) {
            return Err(crate::error::GraphError::DanglingEndpoint { id: source.clone() });
        }
        if !inner.nodes.contains_key(target) {
            return Err(crate::error::GraphError::DanglingEndpoint { id: target.clone() });
        }
        Self::insert_edge(&mut inner, source.clone(), target.clone(), kind, context);
        drop(inner);
        self.cache.invalidate_prefix("rel:");
        self.cache.invalidate_prefix("metrics:");
        Ok(())
    }

    fn insert_edge(
        inner: &mut GraphInner,
        source: SymbolId,
        target: SymbolId,
        kind: EdgeKind,
        context: Option<String>,
    ) {
        let key = (source.clone(), target.clone(), kind);
        if !inner.edge_keys.insert(key) {
            // Idempotent: refresh the context on re-add.
            if let Some(edge) = inner
                .edges
                .iter_mut()
                .find(|e| e.source == source && e.target == target && e.kind == kind)
            {
                if context.is_some() {
                    edge.context = context;
                }
            }
            return;
        }
        let source_file = inner
            .nodes
            .get(&source)
            .map(|s| s.file_uri.clone())
            .unwrap_or_else(|| crate::types::file_uri(""));
        let target_file = inner
            .nodes
            .get(&target)
            .map(|s| s.file_uri.clone())
            .unwrap_or_else(|| crate::types::file_uri(""));
        let index = inner.edges.len();
        inner.outgoing.entry(source.clone()).or_default().push(index);
        inner.incoming.entry(target.clone()).or_default().push(index);
        inner.edges.push(ReferenceEdge {
            source,
            target,
            kind,
            source_file,
            target_file,
            context,
        });
    }

    /// Remove a file: all of its symbols, every edge touching them, and all
    /// index entries. Atomic with respect to readers.
    pub fn remove_file(&self, file_uri: &str) {
        let mut inner = self.inner.write();
        Self::remove_file_locked(&mut inner, file_uri);
        drop(inner);
        self.invalidate_lookups();
        self.cache.invalidate_prefix(&format!("file:{file_uri}"));
    }

    fn remove_file_locked(inner: &mut GraphInner, file_uri: &str) {
        let Some(ids) = inner.file_index.remove(file_uri) else {
            return;
        };
        let doomed: HashSet<SymbolId> = ids.into_iter().collect();

        for id in &doomed {
            if let Some(symbol) = inner.nodes.shift_remove(id) {
                let lower = symbol.name.to_ascii_lowercase();
                let now_empty = inner
                    .name_index
                    .get_mut(&lower)
                    .map(|set| {
                        set.shift_remove(id);
                        set.is_empty()
                    })
                    .unwrap_or(false);
                if now_empty {
                    inner.name_index.remove(&lower);
                }
            }
        }
        inner.fqn_index.retain(|_, id| !doomed.contains(id));
        inner.tables.remove(file_uri);

        // Edges: rebuild the arena without any edge touching a removed node.
        let kept: Vec<ReferenceEdge> = inner
            .edges
            .drain(..)
            .filter(|e| !doomed.contains(&e.source) && !doomed.contains(&e.target))
            .collect();
        inner.edge_keys.clear();
        inner.outgoing.clear();
        inner.incoming.clear();
        for (index, edge) in kept.iter().enumerate() {
            inner
                .edge_keys
                .insert((edge.source.clone(), edge.target.clone(), edge.kind));
            inner.outgoing.entry(edge.source.clone()).or_default().push(index);
            inner.incoming.entry(edge.target.clone()).or_default().push(index);
        }
        inner.edges = kept;
    }

    fn invalidate_lookups(&self) {
        self.cache.invalidate_prefix("name:");
        self.cache.invalidate_prefix("fqn:");
        self.cache.invalidate_prefix("rel:");
        self.cache.invalidate_prefix("metrics:");
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// All symbols with this name, case-insensitive, in insertion order.
    pub fn lookup_by_name(&self, name: &str) -> Vec<Symbol> {
        let key = format!("name:{}", name.to_ascii_lowercase());
        if let Some(CachedValue::Ids(ids)) = self.cache.get(&key) {
            let inner = self.inner.read();
            return ids
                .iter()
                .filter_map(|id| inner.nodes.get(id).cloned())
                .collect();
        }
        let inner = self.inner.read();
        let ids: Vec<SymbolId> = inner
            .name_index
            .get(&name.to_ascii_lowercase())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let symbols: Vec<Symbol> = ids
            .iter()
            .filter_map(|id| inner.nodes.get(id).cloned())
            .collect();
        drop(inner);
        let bytes = 32 + ids.len() * 64;
        self.cache.insert(key, CachedValue::Ids(ids), bytes);
        symbols
    }

    /// FQN lookup, case-insensitive, at most one hit.
    pub fn lookup_by_fqn(&self, fqn: &str) -> Option<Symbol> {
        let key = format!("fqn:{}", fqn.to_ascii_lowercase());
        if let Some(CachedValue::Fqn(id)) = self.cache.get(&key) {
            let inner = self.inner.read();
            return id.and_then(|id| inner.nodes.get(&id).cloned());
        }
        let inner = self.inner.read();
        let id = inner.fqn_index.get(&fqn.to_ascii_lowercase()).cloned();
        let symbol = id.as_ref().and_then(|id| inner.nodes.get(id).cloned());
        drop(inner);
        self.cache.insert(key, CachedValue::Fqn(id), 96);
        symbol
    }

    /// Context-aware disambiguation. The ladder: same-file candidate, then
    /// imported-namespace match, then same-namespace match, then the first
    /// candidate in deterministic insertion order.
    pub fn lookup_with_context(&self, name: &str, context: &ResolutionContext) -> LookupOutcome {
        let candidates = self.lookup_by_name(name);
        match candidates.len() {
            0 => LookupOutcome {
                symbol: None,
                confidence: 0.0,
                is_ambiguous: false,
                candidates: None,
                resolution_context: "none",
            },
            1 => LookupOutcome {
                symbol: Some(candidates[0].clone()),
                confidence: 1.0,
                is_ambiguous: false,
                candidates: None,
                resolution_context: "exact",
            },
            _ => {
                let (chosen, rung) = Self::disambiguate(&candidates, context);
                LookupOutcome {
                    symbol: Some(chosen),
                    confidence: 0.5,
                    is_ambiguous: true,
                    candidates: Some(candidates),
                    resolution_context: rung,
                }
            }
        }
    }

    fn disambiguate(
        candidates: &[Symbol],
        context: &ResolutionContext,
    ) -> (Symbol, &'static str) {
        if let Some(source_file) = &context.source_file {
            if let Some(hit) = candidates
                .iter()
                .find(|c| c.file_uri.as_ref() == source_file.as_str())
            {
                return (hit.clone(), "same-file");
            }
        }
        if !context.imported_namespaces.is_empty() {
            if let Some(hit) = candidates.iter().find(|c| {
                c.namespace.as_deref().is_some_and(|ns| {
                    context
                        .imported_namespaces
                        .iter()
                        .any(|imported| imported.eq_ignore_ascii_case(ns))
                })
            }) {
                return (hit.clone(), "imported-namespace");
            }
        }
        if let Some(namespace) = &context.namespace {
            if let Some(hit) = candidates
                .iter()
                .find(|c| c.namespace.as_deref().is_some_and(|ns| ns.eq_ignore_ascii_case(namespace)))
            {
                return (hit.clone(), "same-namespace");
            }
        }
        (candidates[0].clone(), "first-candidate")
    }

    pub fn get_symbol(&self, id: &SymbolId) -> Option<Symbol> {
        self.inner.read().nodes.get(id).cloned()
    }

    pub fn symbol_table_for(&self, file_uri: &str) -> Option<Arc<SymbolTable>> {
        self.inner.read().tables.get(file_uri).cloned()
    }

    pub fn symbols_in_file(&self, file_uri: &str) -> Vec<Symbol> {
        let inner = self.inner.read();
        inner
            .file_index
            .get(file_uri)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.nodes.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    pub fn file_count(&self) -> usize {
        self.inner.read().tables.len()
    }

    // =========================================================================
    // Relationships
    // =========================================================================

    /// Incoming references: who points at this symbol.
    pub fn find_references_to(&self, id: &SymbolId) -> Vec<SymbolReference> {
        let inner = self.inner.read();
        inner
            .incoming
            .get(id)
            .map(|edges| {
                edges
                    .iter()
                    .filter_map(|&i| {
                        let edge = &inner.edges[i];
                        inner.nodes.get(&edge.source).map(|s| SymbolReference {
                            symbol: s.clone(),
                            reference_kind: edge.kind,
                            context: edge.context.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Outgoing references: what this symbol points at.
    pub fn find_references_from(&self, id: &SymbolId) -> Vec<SymbolReference> {
        let inner = self.inner.read();
        inner
            .outgoing
            .get(id)
            .map(|edges| {
                edges
                    .iter()
                    .filter_map(|&i| {
                        let edge = &inner.edges[i];
                        inner.nodes.get(&edge.target).map(|s| SymbolReference {
                            symbol: s.clone(),
                            reference_kind: edge.kind,
                            context: edge.context.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct fan-out and fan-in, plus an impact score that weights
    /// transitive dependents at half a direct one.
    pub fn analyze_dependencies(&self, id: &SymbolId) -> DependencyAnalysis {
        let key = format!("metrics:{id}");
        if let Some(CachedValue::Analysis(cached)) = self.cache.get(&key) {
            return (*cached).clone();
        }

        let inner = self.inner.read();
        let dependencies: Vec<SymbolId> = inner
            .outgoing
            .get(id)
            .map(|edges| {
                let mut seen = IndexSet::new();
                for &i in edges {
                    seen.insert(inner.edges[i].target.clone());
                }
                seen.into_iter().collect()
            })
            .unwrap_or_default();
        let dependents: Vec<SymbolId> = inner
            .incoming
            .get(id)
            .map(|edges| {
                let mut seen = IndexSet::new();
                for &i in edges {
                    seen.insert(inner.edges[i].source.clone());
                }
                seen.into_iter().collect()
            })
            .unwrap_or_default();

        // Transitive dependents: breadth-first over incoming edges.
        let mut visited: HashSet<SymbolId> = dependents.iter().cloned().collect();
        visited.insert(id.clone());
        let mut frontier: Vec<SymbolId> = dependents.clone();
        let mut transitive = 0usize;
        let mut depth = 0usize;
        while !frontier.is_empty() && depth < TRANSITIVE_DEPTH {
            let mut next = Vec::new();
            for node in frontier {
                if let Some(edges) = inner.incoming.get(&node) {
                    for &i in edges {
                        let source = &inner.edges[i].source;
                        if visited.insert(source.clone()) {
                            transitive += 1;
                            next.push(source.clone());
                        }
                    }
                }
            }
            frontier = next;
            depth += 1;
        }
        drop(inner);

        let analysis = DependencyAnalysis {
            impact_score: dependents.len() as f64 + TRANSITIVE_WEIGHT * transitive as f64,
            dependencies,
            dependents,
        };
        let bytes = 64 * (analysis.dependencies.len() + analysis.dependents.len() + 1);
        self.cache
            .insert(key, CachedValue::Analysis(Arc::new(analysis.clone())), bytes);
        analysis
    }

    /// All elementary cycles over Dependency-typed edges.
    pub fn detect_circular_dependencies(&self) -> Vec<Vec<SymbolId>> {
        let inner = self.inner.read();
        // Adjacency restricted to Dependency edges, in node order.
        let order: Vec<SymbolId> = inner.nodes.keys().cloned().collect();
        let position: HashMap<&SymbolId, usize> =
            order.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for edge in &inner.edges {
            if edge.kind != EdgeKind::Dependency {
                continue;
            }
            if let (Some(&s), Some(&t)) = (position.get(&edge.source), position.get(&edge.target)) {
                adjacency.entry(s).or_default().push(t);
            }
        }

        // Elementary cycles: each is reported once, rooted at its smallest
        // node index.
        let mut cycles = Vec::new();
        for start in 0..order.len() {
            let mut path = vec![start];
            let mut on_path: HashSet<usize> = HashSet::from([start]);
            Self::cycle_dfs(
                start,
                start,
                &adjacency,
                &mut path,
                &mut on_path,
                &mut cycles,
            );
        }
        cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| order[i].clone()).collect())
            .collect()
    }

    fn cycle_dfs(
        start: usize,
        current: usize,
        adjacency: &HashMap<usize, Vec<usize>>,
        path: &mut Vec<usize>,
        on_path: &mut HashSet<usize>,
        cycles: &mut Vec<Vec<usize>>,
    ) {
        let Some(neighbors) = adjacency.get(&current) else {
            return;
        };
        for &next in neighbors {
            if next == start {
                cycles.push(path.clone());
            } else if next > start && !on_path.contains(&next) {
                path.push(next);
                on_path.insert(next);
                Self::cycle_dfs(start, next, adjacency, path, on_path, cycles);
                on_path.remove(&next);
                path.pop();
            }
        }
    }

    /// Stable snapshot of nodes and edges for the export path.
    pub(crate) fn snapshot(&self) -> (Vec<Symbol>, Vec<ReferenceEdge>) {
        let inner = self.inner.read();
        (
            inner.nodes.values().cloned().collect(),
            inner.edges.clone(),
        )
    }

    pub(crate) fn file_uris(&self) -> Vec<String> {
        self.inner.read().tables.keys().cloned().collect()
    }
}

impl Default for SymbolGraph {
    fn default() -> Self {
        Self::new()
    }
}
