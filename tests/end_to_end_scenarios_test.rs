//! End-to-end scenarios across the compile → graph → validation pipeline.

use apexsense::storage::{self, TypeRegistryEntry};
use apexsense::symbol::{ModifierFlags, Modifiers, SymbolDetail, SymbolFactory};
use apexsense::{
    CompilerService, Range, ReferenceKind, SymbolCollector, SymbolGraph, SymbolKind,
    SymbolLocation, SymbolTable, ValidationEngine, ValidationOptions, ValidationScope, Visibility,
    file_uri,
};
use std::sync::Arc;

fn compile(source: &str, uri: &str) -> apexsense::Compilation<SymbolTable> {
    let mut service = CompilerService::new().unwrap();
    let collector = SymbolCollector::new(file_uri(uri), None, ValidationScope::default());
    service.compile(source, uri, collector).unwrap()
}

#[tokio::test]
async fn scenario_constructor_naming() {
    let out = compile("class MyClass { WrongName() {} }", "file:///MyClass.cls");
    let ctor = out
        .result
        .symbols_of_kind(SymbolKind::Constructor)
        .next()
        .expect("constructor collected");
    assert_eq!(ctor.name, "WrongName");

    let graph = Arc::new(SymbolGraph::new());
    let engine = ValidationEngine::new(graph);
    let mut table = out.result;
    let result = engine.run(&mut table, &ValidationOptions::immediate()).await;

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    let error = &result.errors[0];
    assert!(error.message.contains("WrongName"));
    assert!(error.message.contains("MyClass"));
}

#[tokio::test]
async fn scenario_cross_file_method_resolution() {
    let source_a = "public class Api { public Integer add(Integer a, Integer b) { return 0; } }";
    let source_b = r#"class Caller {
    void run() {
        new Api().add("x", "y");
    }
}"#;

    let graph = Arc::new(SymbolGraph::new());
    let a = compile(source_a, "file:///Api.cls");
    graph.add_symbols_from_table(Arc::new(a.result));
    let b = compile(source_b, "file:///Caller.cls");
    let expected_range = b
        .result
        .references()
        .iter()
        .find(|r| r.kind == ReferenceKind::MethodCall && r.name == "add")
        .expect("call reference")
        .location;
    let mut table_b = b.result;
    graph.add_symbols_from_table(Arc::new(table_b.clone()));

    let engine = ValidationEngine::new(graph);
    let result = engine.run(&mut table_b, &ValidationOptions::thorough()).await;

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
    let error = &result.errors[0];
    assert_eq!(error.code, "METHOD_DOES_NOT_SUPPORT_PARAMETER_TYPE");
    assert_eq!(error.location, Some(expected_range));
    assert_eq!(expected_range.start_line, 3);
}

#[tokio::test]
async fn scenario_duplicate_local() {
    let out = compile(
        "class C { void m() { Integer x = 1; Integer x = 2; } }",
        "file:///C.cls",
    );
    let duplicates: Vec<_> = out
        .errors
        .iter()
        .filter(|e| e.code == "DUPLICATE_DECLARATION")
        .collect();
    assert_eq!(duplicates.len(), 1);
    // Only the first x survives.
    let vars: Vec<_> = out
        .result
        .symbols_of_kind(SymbolKind::Variable)
        .collect();
    assert_eq!(vars.len(), 1);
    // The diagnostic points at the second declarator.
    let dup_range = duplicates[0].location.unwrap();
    assert!(dup_range.start_column > vars[0].location.identifier_range.start_column);
}

#[tokio::test]
async fn scenario_multiple_declarators() {
    let out = compile(
        "class C { void m() { Integer a = 1, b = 2, c = 3; } }",
        "file:///C.cls",
    );
    assert!(out.errors.is_empty(), "{:?}", out.errors);
    let vars: Vec<_> = out
        .result
        .symbols_of_kind(SymbolKind::Variable)
        .collect();
    let names: Vec<_> = vars.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    let ids: std::collections::HashSet<_> = vars.iter().map(|v| v.id.clone()).collect();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn scenario_binary_round_trip() {
    let uri = file_uri("apex://system/TestClass.cls");
    let factory = SymbolFactory::new(uri.clone(), Some("System".to_string()));
    let class = factory.full(
        SymbolKind::Class,
        "TestClass",
        SymbolLocation::new(Range::new(1, 0, 3, 1), Range::new(1, 13, 1, 22)),
        &["File".to_string()],
        None,
        Modifiers::new(Visibility::Public, ModifierFlags::BUILT_IN),
        Vec::new(),
        Some(SymbolDetail::Type {
            super_class: None,
            interfaces: Vec::new(),
        }),
    );
    let entry = TypeRegistryEntry {
        fqn: "system.testclass".to_string(),
        name: "TestClass".to_string(),
        namespace: Some("System".to_string()),
        kind: SymbolKind::Class,
        symbol_id: class.id.clone(),
        file_uri: uri.to_string(),
        is_stdlib: true,
    };
    let table = SymbolTable::hydrate(uri, vec![class], Vec::new()).unwrap();

    let bytes = storage::serialize(std::slice::from_ref(&table), &[entry]).unwrap();
    let snapshot = storage::deserialize(&bytes).unwrap();

    assert_eq!(snapshot.symbol_tables.len(), 1);
    let loaded = &snapshot.symbol_tables[0];
    assert_eq!(loaded.symbol_count(), 1);
    let symbol = &loaded.all_symbols()[0];
    assert_eq!(symbol.name, "TestClass");
    assert_eq!(symbol.kind, SymbolKind::Class);
    assert_eq!(symbol.location.symbol_range.start_line, 1);
    assert_eq!(symbol.modifiers.visibility, Visibility::Public);
    assert!(symbol.modifiers.is_built_in());

    assert!(snapshot.registry.by_fqn("system.testclass").is_some());
    let by_name = snapshot.registry.by_name("testclass");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].fqn, "system.testclass");
}

#[tokio::test]
async fn scenario_graph_export_contains_over_call() {
    let out = compile(
        "class Outer { class Inner {} Outer() { new Inner(); } }",
        "file:///Outer.cls",
    );
    let graph = SymbolGraph::new();
    graph.add_symbols_from_table(Arc::new(out.result));

    let data = graph.graph_data().await;
    let outer = data.nodes.iter().find(|n| n.name == "Outer").unwrap();
    let inner = data.nodes.iter().find(|n| n.name == "Inner").unwrap();
    let between: Vec<_> = data
        .edges
        .iter()
        .filter(|e| {
            (e.source == outer.id && e.target == inner.id)
                || (e.source == inner.id && e.target == outer.id)
        })
        .collect();
    assert_eq!(between.len(), 1, "{between:?}");
    assert_eq!(between[0].kind, "contains");
}
