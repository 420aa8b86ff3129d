//! Two-tier validation engine.
//!
//! Validators are values with discriminated metadata, held by a registry
//! ordered by `(tier, priority)`. The immediate tier runs on every edit
//! inside a hard per-file budget and never touches other files; the
//! thorough tier runs on save, may load a bounded number of missing
//! artifacts (never transitively) under a global deadline, and keeps
//! whatever partial results a timeout leaves behind.
//!
//! Results are merged with deduplication by `(code, range, message)`.
//! A failed validator is logged, contributes one internal error, and never
//! stops the others. Enrichment from successful runs is applied back to the
//! table atomically at the end.

pub mod constructor_naming;
pub mod method_resolution;
pub mod modifier_semantics;
pub mod type_resolution;

pub use constructor_naming::ConstructorNamingValidator;
pub use method_resolution::MethodResolutionValidator;
pub use modifier_semantics::ModifierSemanticsValidator;
pub use type_resolution::TypeResolutionValidator;

use crate::diagnostics::Diagnostic;
use crate::error::ValidatorFailure;
use crate::graph::SymbolGraph;
use crate::symbol::{SymbolDetail, SymbolTable, TypeInfo};
use crate::types::SymbolId;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-file budget for the immediate tier.
pub const IMMEDIATE_BUDGET: Duration = Duration::from_millis(500);

/// Most artifacts one thorough run may load.
pub const MAX_ARTIFACTS: usize = 5;

/// Artifact loads never recurse into the loaded files.
pub const MAX_ARTIFACT_DEPTH: usize = 1;

/// Global deadline over all artifact loading in one thorough run.
pub const ARTIFACT_TIMEOUT: Duration = Duration::from_secs(5);

/// Language API version assumed when none is configured.
pub const DEFAULT_API_VERSION: u32 = 64;

/// Latency class of a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationTier {
    Immediate,
    Thorough,
}

/// Loads missing files on demand during thorough validation. Returns the
/// URIs of the files it actually compiled and registered.
#[async_trait]
pub trait ArtifactLoader: Send + Sync {
    async fn load(&self, type_names: &[String], context_file: &str) -> Vec<String>;
}

/// Options for one validation run.
#[derive(Clone)]
pub struct ValidationOptions {
    pub tier: ValidationTier,
    pub allow_artifact_loading: bool,
    pub api_version: Option<u32>,
    pub enable_version_specific: bool,
    /// Source text cache, for validators that want to avoid a re-read.
    pub source_content: Option<Arc<str>>,
    pub cancellation: CancellationToken,
    pub artifact_loader: Option<Arc<dyn ArtifactLoader>>,
}

impl ValidationOptions {
    pub fn immediate() -> Self {
        Self {
            tier: ValidationTier::Immediate,
            allow_artifact_loading: false,
            api_version: None,
            enable_version_specific: true,
            source_content: None,
            cancellation: CancellationToken::new(),
            artifact_loader: None,
        }
    }

    pub fn thorough() -> Self {
        Self {
            tier: ValidationTier::Thorough,
            allow_artifact_loading: true,
            ..Self::immediate()
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn ArtifactLoader>) -> Self {
        self.artifact_loader = Some(loader);
        self
    }
}

/// Refinements a validator feeds back into the symbol table.
#[derive(Debug, Default, Clone)]
pub struct EnrichmentData {
    /// Per-symbol refined variable types (e.g. namespace-qualified).
    pub inferred_types: HashMap<SymbolId, TypeInfo>,
}

impl EnrichmentData {
    pub fn is_empty(&self) -> bool {
        self.inferred_types.is_empty()
    }
}

/// Outcome of one validator (or a merged run).
#[derive(Debug, Default, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Id of the producing validator; unset on merged results.
    pub result_type: Option<String>,
    pub enrichment: Option<EnrichmentData>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    pub fn from_diagnostics(errors: Vec<Diagnostic>, warnings: Vec<Diagnostic>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            result_type: None,
            enrichment: None,
        }
    }
}

/// Shared artifact-loading budget for one thorough run: a count and a
/// deadline, enforced across every validator in the run.
pub struct ArtifactBudget {
    deadline: Instant,
    remaining: AtomicUsize,
}

impl ArtifactBudget {
    fn new() -> Self {
        Self {
            deadline: Instant::now() + ARTIFACT_TIMEOUT,
            remaining: AtomicUsize::new(MAX_ARTIFACTS),
        }
    }

    fn exhausted() -> Self {
        Self {
            deadline: Instant::now(),
            remaining: AtomicUsize::new(0),
        }
    }

    /// Request loads for `type_names`. Requests beyond the artifact budget
    /// are dropped with a warning; a deadline hit cancels the pending load
    /// and the caller proceeds with what it has.
    pub async fn load(
        &self,
        options: &ValidationOptions,
        type_names: &[String],
        context_file: &str,
        warnings: &mut Vec<Diagnostic>,
    ) -> Vec<String> {
        if !options.allow_artifact_loading || type_names.is_empty() {
            return Vec::new();
        }
        let Some(loader) = &options.artifact_loader else {
            return Vec::new();
        };

        let mut granted = Vec::new();
        for name in type_names {
            let claimed = self
                .remaining
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                .is_ok();
            if claimed {
                granted.push(name.clone());
            } else {
                warnings.push(Diagnostic::unlocated(
                    "ARTIFACT_BUDGET_EXCEEDED",
                    format!(
                        "Skipped loading '{name}': at most {MAX_ARTIFACTS} artifacts per run"
                    ),
                ));
            }
        }
        if granted.is_empty() {
            return Vec::new();
        }

        match tokio::time::timeout_at(self.deadline, loader.load(&granted, context_file)).await {
            Ok(loaded) => loaded,
            Err(_) => {
                tracing::warn!("artifact loading deadline hit; continuing with partial data");
                warnings.push(Diagnostic::unlocated(
                    "ARTIFACT_LOAD_TIMEOUT",
                    "Artifact loading timed out; validated with available data".to_string(),
                ));
                Vec::new()
            }
        }
    }
}

/// One named validation rule.
#[async_trait]
pub trait Validator: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn tier(&self) -> ValidationTier;
    fn priority(&self) -> u32;

    async fn validate(
        &self,
        table: &SymbolTable,
        graph: &SymbolGraph,
        options: &ValidationOptions,
        budget: &ArtifactBudget,
    ) -> Result<ValidationResult, ValidatorFailure>;
}

/// Holds validators ordered by `(tier, priority)`.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in validator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ConstructorNamingValidator));
        registry.register(Arc::new(ModifierSemanticsValidator));
        registry.register(Arc::new(TypeResolutionValidator));
        registry.register(Arc::new(MethodResolutionValidator));
        registry
    }

    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
        self.validators
            .sort_by_key(|v| (v.tier(), v.priority(), v.id()));
    }

    pub fn validators_for(&self, tier: ValidationTier) -> Vec<Arc<dyn Validator>> {
        self.validators
            .iter()
            .filter(|v| v.tier() == tier)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

/// Runs the registered validators for a tier and merges their results.
pub struct ValidationEngine {
    registry: ValidatorRegistry,
    graph: Arc<SymbolGraph>,
}

impl ValidationEngine {
    pub fn new(graph: Arc<SymbolGraph>) -> Self {
        Self {
            registry: ValidatorRegistry::with_defaults(),
            graph,
        }
    }

    pub fn with_registry(graph: Arc<SymbolGraph>, registry: ValidatorRegistry) -> Self {
        Self { registry, graph }
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Run all validators of the requested tier against `table`.
    ///
    /// Never blocks editing on failures: validator errors become
    /// diagnostics, a thrown validator becomes one internal error, and
    /// cancellation simply stops between validators.
    pub async fn run(
        &self,
        table: &mut SymbolTable,
        options: &ValidationOptions,
    ) -> ValidationResult {
        let budget = if options.tier == ValidationTier::Thorough {
            ArtifactBudget::new()
        } else {
            // The immediate tier may not trigger artifact loading at all.
            ArtifactBudget::exhausted()
        };
        let started = Instant::now();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut enrichment = EnrichmentData::default();

        for validator in self.registry.validators_for(options.tier) {
            if options.cancellation.is_cancelled() {
                tracing::debug!("validation cancelled before '{}'", validator.id());
                break;
            }

            let outcome = match options.tier {
                ValidationTier::Immediate => {
                    let left = IMMEDIATE_BUDGET.saturating_sub(started.elapsed());
                    match tokio::time::timeout(
                        left,
                        validator.validate(table, &self.graph, options, &budget),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(ValidatorFailure::TimedOut {
                            validator: validator.id().to_string(),
                        }),
                    }
                }
                ValidationTier::Thorough => {
                    validator.validate(table, &self.graph, options, &budget).await
                }
            };

            match outcome {
                Ok(result) => {
                    errors.extend(result.errors);
                    warnings.extend(result.warnings);
                    if let Some(extra) = result.enrichment {
                        enrichment.inferred_types.extend(extra.inferred_types);
                    }
                }
                Err(failure) => {
                    tracing::warn!("validator '{}' failed: {failure}", validator.id());
                    errors.push(Diagnostic::unlocated(
                        "INTERNAL_VALIDATOR_ERROR",
                        format!("{failure}"),
                    ));
                    if matches!(failure, ValidatorFailure::TimedOut { .. })
                        && options.tier == ValidationTier::Immediate
                    {
                        // The per-file budget is spent; stop here.
                        break;
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        let errors = dedup_diagnostics(errors);
        let warnings = dedup_diagnostics(warnings);

        // Enrichment lands atomically, after every validator has run.
        if !options.cancellation.is_cancelled() {
            apply_enrichment(table, &enrichment);
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            result_type: None,
            enrichment: if enrichment.is_empty() {
                None
            } else {
                Some(enrichment)
            },
        }
    }
}

/// Collapse duplicates by `(code, range, message)`, keeping first
/// occurrences in order. Idempotent by construction.
pub fn dedup_diagnostics(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(diagnostics.len());
    for diagnostic in diagnostics {
        if seen.insert(diagnostic.dedup_key()) {
            out.push(diagnostic);
        }
    }
    out
}

fn apply_enrichment(table: &mut SymbolTable, enrichment: &EnrichmentData) {
    for (id, inferred) in &enrichment.inferred_types {
        if let Some(symbol) = table.get_mut(id) {
            if let Some(SymbolDetail::Variable { value_type, .. }) = &mut symbol.detail {
                *value_type = inferred.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Range;

    #[test]
    fn test_dedup_is_idempotent_subset() {
        let diags = vec![
            Diagnostic::error("A", "first", Range::new(1, 0, 1, 1)),
            Diagnostic::error("A", "first", Range::new(1, 0, 1, 1)),
            Diagnostic::error("A", "first", Range::new(2, 0, 2, 1)),
            Diagnostic::unlocated("B", "no range"),
            Diagnostic::unlocated("B", "no range"),
        ];
        let once = dedup_diagnostics(diags.clone());
        assert_eq!(once.len(), 3);
        // dedup(dedup(E)) == dedup(E)
        let twice = dedup_diagnostics(once.clone());
        assert_eq!(once, twice);
        // dedup(E) ⊆ E
        for d in &once {
            assert!(diags.contains(d));
        }
    }

    #[test]
    fn test_registry_orders_by_tier_then_priority() {
        let registry = ValidatorRegistry::with_defaults();
        let immediate = registry.validators_for(ValidationTier::Immediate);
        assert_eq!(immediate[0].id(), "constructor-naming");
        assert_eq!(immediate[1].id(), "modifier-semantics");
        let thorough = registry.validators_for(ValidationTier::Thorough);
        assert_eq!(thorough[0].id(), "type-resolution");
        assert_eq!(thorough[1].id(), "method-resolution");
    }
}
