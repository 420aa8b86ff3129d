//! Binary snapshot boundary behavior: header rejection, checksum
//! verification, and full-pipeline hydration into the graph.

use apexsense::storage::format::{FORMAT_VERSION, HEADER_LEN, MAGIC};
use apexsense::storage::{self, SnapshotStore};
use apexsense::{
    CompilerService, SnapshotError, SymbolCollector, SymbolGraph, SymbolKind, SymbolTable,
    ValidationScope, file_uri,
};
use std::sync::Arc;
use tempfile::TempDir;

fn compile_stdlib(source: &str, uri: &str) -> SymbolTable {
    let mut service = CompilerService::new().unwrap();
    let collector = SymbolCollector::new(
        file_uri(uri),
        Some("System".to_string()),
        ValidationScope::default(),
    );
    service.compile(source, uri, collector).unwrap().result
}

#[test]
fn test_wrong_magic_rejected_with_documented_error() {
    let table = compile_stdlib("public class Assert { }", "apex://system/Assert.cls");
    let mut bytes = storage::serialize(std::slice::from_ref(&table), &[]).unwrap();
    bytes[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());

    match storage::deserialize(&bytes) {
        Err(SnapshotError::BadMagic { found }) => {
            assert_eq!(found, 0xDEAD_BEEF);
            assert_ne!(found, MAGIC);
        }
        other => panic!("expected BadMagic, got {other:?}"),
    }
}

#[test]
fn test_wrong_version_rejected() {
    let table = compile_stdlib("public class Assert { }", "apex://system/Assert.cls");
    let mut bytes = storage::serialize(std::slice::from_ref(&table), &[]).unwrap();
    bytes[4..8].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());

    match storage::deserialize(&bytes) {
        Err(SnapshotError::UnsupportedVersion { found, supported }) => {
            assert_eq!(found, FORMAT_VERSION + 1);
            assert_eq!(supported, FORMAT_VERSION);
        }
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}

#[test]
fn test_payload_corruption_fails_checksum() {
    let table = compile_stdlib("public class Assert { }", "apex://system/Assert.cls");
    let mut bytes = storage::serialize(std::slice::from_ref(&table), &[]).unwrap();
    bytes[HEADER_LEN + 8] ^= 0x01;
    assert!(matches!(
        storage::deserialize(&bytes),
        Err(SnapshotError::ChecksumMismatch { .. })
    ));
}

#[tokio::test]
async fn test_snapshot_survives_disk_and_feeds_graph() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("stdlib.bin"));

    let string_table = compile_stdlib(
        "public class Str { public Integer length() { return 0; } }",
        "apex://system/Str.cls",
    );
    let assert_table = compile_stdlib("public class Assert { }", "apex://system/Assert.cls");
    store
        .save(&[string_table.clone(), assert_table], &[])
        .unwrap();

    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.metadata.file_count, 2);
    assert_eq!(snapshot.metadata.version, FORMAT_VERSION);

    // Snapshot tables hydrate the graph's initial state.
    let graph = SymbolGraph::new();
    graph
        .register_tables(snapshot.symbol_tables.into_iter().map(Arc::new).collect())
        .await;
    assert_eq!(graph.file_count(), 2);
    assert!(graph.lookup_by_fqn("system.str").is_some());
    let methods = graph.lookup_by_name("length");
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].kind, SymbolKind::Method);

    // Round-tripped identity: (name, kind, identifier range) preserved.
    let original: Vec<_> = string_table
        .user_symbols()
        .map(|s| (s.name.clone(), s.kind, s.location.identifier_range))
        .collect();
    let loaded: Vec<_> = graph
        .symbols_in_file("apex://system/Str.cls")
        .into_iter()
        .filter(|s| !s.kind.is_scope_only())
        .map(|s| (s.name.clone(), s.kind, s.location.identifier_range))
        .collect();
    for item in original {
        assert!(loaded.contains(&item), "missing {item:?}");
    }
}
