//! JSON-serializable graph exports for external tooling.
//!
//! Exports flatten the live graph into `{nodes, edges, metadata}`.
//! Hierarchical contains edges always appear, derived from `parent_id`;
//! reference edges that conflict with a contains edge are suppressed — a
//! constructor-call edge between a type and its inner type is containment,
//! not a call. Bulk traversals yield cooperatively after fixed batches so a
//! large workspace never starves the task.

use crate::graph::{EdgeKind, ReferenceEdge, SymbolGraph};
use crate::symbol::Symbol;
use crate::types::{SymbolId, SymbolKind};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Nodes processed between cooperative yields.
pub const NODE_YIELD_BATCH: usize = 100;

/// Files processed between cooperative yields.
pub const FILE_YIELD_BATCH: usize = 50;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub file_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub visibility: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source_file: String,
    pub target_file: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphMetadata {
    pub node_count: usize,
    pub edge_count: usize,
    pub file_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub metadata: GraphMetadata,
}

impl SymbolGraph {
    /// Export the whole graph.
    pub async fn graph_data(&self) -> GraphData {
        let (symbols, edges) = self.snapshot();
        let file_count = self.file_count();
        flatten(symbols, edges, file_count, None, None).await
    }

    /// Export one file's slice of the graph.
    pub async fn graph_data_for_file(&self, file_uri: &str) -> GraphData {
        let (symbols, edges) = self.snapshot();
        let file_count = self.file_count();
        flatten(symbols, edges, file_count, Some(file_uri.to_string()), None).await
    }

    /// Export only the symbols of one kind (plus edges among them).
    pub async fn graph_data_by_kind(&self, kind: SymbolKind) -> GraphData {
        let (symbols, edges) = self.snapshot();
        let file_count = self.file_count();
        flatten(symbols, edges, file_count, None, Some(kind)).await
    }
}

async fn flatten(
    symbols: Vec<Symbol>,
    edges: Vec<ReferenceEdge>,
    file_count: usize,
    file_filter: Option<String>,
    kind_filter: Option<SymbolKind>,
) -> GraphData {
    let mut nodes = Vec::new();
    let mut included: HashSet<SymbolId> = HashSet::new();
    let mut parents: HashMap<SymbolId, SymbolId> = HashMap::new();

    for (processed, symbol) in symbols.iter().enumerate() {
        if processed > 0 && processed % NODE_YIELD_BATCH == 0 {
            tokio::task::yield_now().await;
        }
        // Blocks are scope containers, never exported.
        if symbol.kind.is_scope_only() {
            continue;
        }
        if let Some(filter) = &file_filter {
            if symbol.file_uri.as_ref() != filter.as_str() {
                continue;
            }
        }
        if let Some(kind) = kind_filter {
            if symbol.kind != kind {
                continue;
            }
        }
        if let Some(parent) = &symbol.parent_id {
            parents.insert(symbol.id.clone(), parent.clone());
        }
        included.insert(symbol.id.clone());
        nodes.push(GraphNode {
            id: symbol.id.to_string(),
            name: symbol.name.clone(),
            kind: symbol.kind.as_str().to_string(),
            file_uri: symbol.file_uri.to_string(),
            namespace: symbol.namespace.clone(),
            visibility: symbol.modifiers.visibility.as_str().to_string(),
        });
    }

    // Contains edges always appear, straight from the parent chain.
    let by_id: HashMap<SymbolId, &Symbol> = symbols.iter().map(|s| (s.id.clone(), s)).collect();
    let mut out_edges = Vec::new();
    let mut contains_pairs: HashSet<(SymbolId, SymbolId)> = HashSet::new();
    for (child, parent) in &parents {
        if !included.contains(child) || !included.contains(parent) {
            continue;
        }
        contains_pairs.insert((parent.clone(), child.clone()));
        let (Some(parent_symbol), Some(child_symbol)) = (by_id.get(parent), by_id.get(child))
        else {
            continue;
        };
        out_edges.push(GraphEdge {
            source: parent.to_string(),
            target: child.to_string(),
            kind: EdgeKind::Contains.as_str().to_string(),
            source_file: parent_symbol.file_uri.to_string(),
            target_file: child_symbol.file_uri.to_string(),
        });
    }

    for (processed, edge) in edges.iter().enumerate() {
        if processed > 0 && processed % NODE_YIELD_BATCH == 0 {
            tokio::task::yield_now().await;
        }
        if !included.contains(&edge.source) || !included.contains(&edge.target) {
            continue;
        }
        // Contains wins over a conflicting constructor-call edge.
        if edge.kind == EdgeKind::Reference(crate::types::ReferenceKind::ConstructorCall) {
            let forward = (edge.source.clone(), edge.target.clone());
            let backward = (edge.target.clone(), edge.source.clone());
            if contains_pairs.contains(&forward) || contains_pairs.contains(&backward) {
                continue;
            }
        }
        out_edges.push(GraphEdge {
            source: edge.source.to_string(),
            target: edge.target.to_string(),
            kind: edge.kind.as_str().to_string(),
            source_file: edge.source_file.to_string(),
            target_file: edge.target_file.to_string(),
        });
    }

    let metadata = GraphMetadata {
        node_count: nodes.len(),
        edge_count: out_edges.len(),
        file_count,
    };
    GraphData {
        nodes,
        edges: out_edges,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SymbolGraph;
    use crate::symbol::{Modifiers, SymbolFactory};
    use crate::types::{Range, SymbolLocation, Visibility, file_uri};

    fn factory(uri: &str) -> SymbolFactory {
        SymbolFactory::new(file_uri(uri), None)
    }

    #[tokio::test]
    async fn test_contains_edge_from_parent_chain() {
        let graph = SymbolGraph::new();
        let f = factory("file:///Outer.cls");
        let outer = f.full(
            SymbolKind::Class,
            "Outer",
            SymbolLocation::at(Range::new(1, 0, 1, 5)),
            &["File".to_string()],
            None,
            Modifiers::with_visibility(Visibility::Public),
            Vec::new(),
            None,
        );
        let inner = f.full(
            SymbolKind::Class,
            "Inner",
            SymbolLocation::at(Range::new(2, 0, 2, 5)),
            &["File".to_string(), "Outer".to_string()],
            Some(outer.id.clone()),
            Modifiers::default(),
            Vec::new(),
            None,
        );
        let (outer_id, inner_id) = (outer.id.clone(), inner.id.clone());
        graph.add_symbol(outer, None);
        graph.add_symbol(inner, None);
        // The constructor-call edge that containment should swallow.
        graph
            .add_edge(
                &outer_id,
                &inner_id,
                EdgeKind::Reference(crate::types::ReferenceKind::ConstructorCall),
                None,
            )
            .unwrap();

        let data = graph.graph_data().await;
        let between: Vec<_> = data
            .edges
            .iter()
            .filter(|e| {
                (e.source == outer_id.to_string() && e.target == inner_id.to_string())
                    || (e.source == inner_id.to_string() && e.target == outer_id.to_string())
            })
            .collect();
        assert_eq!(between.len(), 1);
        assert_eq!(between[0].kind, "contains");
    }

    #[tokio::test]
    async fn test_file_filter() {
        let graph = SymbolGraph::new();
        let a = factory("file:///a.cls").full(
            SymbolKind::Class,
            "A",
            SymbolLocation::default(),
            &["File".to_string()],
            None,
            Modifiers::default(),
            Vec::new(),
            None,
        );
        let b = factory("file:///b.cls").full(
            SymbolKind::Class,
            "B",
            SymbolLocation::default(),
            &["File".to_string()],
            None,
            Modifiers::default(),
            Vec::new(),
            None,
        );
        graph.add_symbol(a, None);
        graph.add_symbol(b, None);

        let data = graph.graph_data_for_file("file:///a.cls").await;
        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.nodes[0].name, "A");
    }

    #[tokio::test]
    async fn test_export_is_json_serializable() {
        let graph = SymbolGraph::new();
        let a = factory("file:///a.cls").full(
            SymbolKind::Class,
            "A",
            SymbolLocation::default(),
            &["File".to_string()],
            None,
            Modifiers::default(),
            Vec::new(),
            None,
        );
        graph.add_symbol(a, None);
        let data = graph.graph_data().await;
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["metadata"]["node_count"], 1);
        assert!(json["nodes"][0]["id"].is_string());
    }
}
