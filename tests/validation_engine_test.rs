//! Validation engine behavior: tier selection, deduplication, failure
//! isolation, cancellation and the artifact-loading budget.

use apexsense::error::ValidatorFailure;
use apexsense::validation::{
    ArtifactBudget, ArtifactLoader, MAX_ARTIFACTS, ValidationEngine, ValidationOptions,
    ValidationResult, ValidationTier, Validator, ValidatorRegistry,
};
use apexsense::{
    CompilerService, SymbolCollector, SymbolGraph, SymbolTable, ValidationScope, file_uri,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

fn compile(source: &str, uri: &str) -> SymbolTable {
    let mut service = CompilerService::new().unwrap();
    let collector = SymbolCollector::new(file_uri(uri), None, ValidationScope::default());
    service.compile(source, uri, collector).unwrap().result
}

struct ExplodingValidator;

#[async_trait]
impl Validator for ExplodingValidator {
    fn id(&self) -> &'static str {
        "exploding"
    }
    fn name(&self) -> &'static str {
        "Exploding"
    }
    fn tier(&self) -> ValidationTier {
        ValidationTier::Immediate
    }
    fn priority(&self) -> u32 {
        99
    }

    async fn validate(
        &self,
        _table: &SymbolTable,
        _graph: &SymbolGraph,
        _options: &ValidationOptions,
        _budget: &ArtifactBudget,
    ) -> Result<ValidationResult, ValidatorFailure> {
        Err(ValidatorFailure::Internal {
            validator: "exploding".to_string(),
            reason: "synthetic failure".to_string(),
        })
    }
}

/// Records every load request; loads nothing.
#[derive(Default)]
struct RecordingLoader {
    requests: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl ArtifactLoader for RecordingLoader {
    async fn load(&self, type_names: &[String], _context_file: &str) -> Vec<String> {
        self.requests.lock().push(type_names.to_vec());
        Vec::new()
    }
}

#[tokio::test]
async fn test_immediate_tier_skips_thorough_validators() {
    // Unresolved types only bother the thorough tier.
    let mut table = compile("class C { Mystery m; }", "file:///C.cls");
    let engine = ValidationEngine::new(Arc::new(SymbolGraph::new()));

    let immediate = engine.run(&mut table, &ValidationOptions::immediate()).await;
    assert!(immediate.is_valid, "{:?}", immediate.errors);

    let thorough = engine.run(&mut table, &ValidationOptions::thorough()).await;
    assert!(!thorough.is_valid);
    assert!(thorough.errors.iter().any(|e| e.code == "UNRESOLVED_TYPE"));
}

#[tokio::test]
async fn test_engine_is_idempotent() {
    let mut table = compile("class MyClass { WrongName() {} }", "file:///M.cls");
    let engine = ValidationEngine::new(Arc::new(SymbolGraph::new()));
    let options = ValidationOptions::immediate();

    let first = engine.run(&mut table, &options).await;
    let second = engine.run(&mut table, &options).await;
    assert_eq!(first.is_valid, second.is_valid);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.warnings, second.warnings);
}

#[tokio::test]
async fn test_failed_validator_contributes_one_internal_error() {
    let mut registry = ValidatorRegistry::with_defaults();
    registry.register(Arc::new(ExplodingValidator));
    let engine = ValidationEngine::with_registry(Arc::new(SymbolGraph::new()), registry);

    // A file that also trips constructor naming, proving others still ran.
    let mut table = compile("class MyClass { WrongName() {} }", "file:///M.cls");
    let result = engine.run(&mut table, &ValidationOptions::immediate()).await;

    let internal: Vec<_> = result
        .errors
        .iter()
        .filter(|e| e.code == "INTERNAL_VALIDATOR_ERROR")
        .collect();
    assert_eq!(internal.len(), 1);
    assert!(result
        .errors
        .iter()
        .any(|e| e.code == "INVALID_CONSTRUCTOR_NAME"));
}

#[tokio::test]
async fn test_cancellation_stops_between_validators() {
    let mut table = compile("class MyClass { WrongName() {} }", "file:///M.cls");
    let engine = ValidationEngine::new(Arc::new(SymbolGraph::new()));
    let options = ValidationOptions::immediate();
    options.cancellation.cancel();

    let result = engine.run(&mut table, &options).await;
    // Nothing ran; nothing to report.
    assert!(result.errors.is_empty());
    assert!(result.is_valid);
}

#[tokio::test]
async fn test_artifact_budget_caps_requests() {
    // Seven unknown types, but at most five loads per run.
    let mut table = compile(
        "class C { T1 a; T2 b; T3 c; T4 d; T5 e; T6 f; T7 g; }",
        "file:///C.cls",
    );
    let loader = Arc::new(RecordingLoader::default());
    let engine = ValidationEngine::new(Arc::new(SymbolGraph::new()));
    let options = ValidationOptions::thorough().with_loader(loader.clone());

    let result = engine.run(&mut table, &options).await;

    let requested: usize = loader.requests.lock().iter().map(|r| r.len()).sum();
    assert_eq!(requested, MAX_ARTIFACTS);
    // The two over-budget names produced warnings, and all seven stayed
    // unresolved.
    assert_eq!(
        result
            .warnings
            .iter()
            .filter(|w| w.code == "ARTIFACT_BUDGET_EXCEEDED")
            .count(),
        2
    );
    assert_eq!(
        result
            .errors
            .iter()
            .filter(|e| e.code == "UNRESOLVED_TYPE")
            .count(),
        7
    );
}

#[tokio::test]
async fn test_immediate_tier_never_loads_artifacts() {
    let mut table = compile("class C { Mystery m; }", "file:///C.cls");
    let loader = Arc::new(RecordingLoader::default());
    let engine = ValidationEngine::new(Arc::new(SymbolGraph::new()));
    let mut options = ValidationOptions::immediate().with_loader(loader.clone());
    // Even an explicit opt-in cannot arm the immediate tier.
    options.allow_artifact_loading = true;

    engine.run(&mut table, &options).await;
    assert!(loader.requests.lock().is_empty());
}
