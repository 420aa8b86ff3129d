//! Cross-file type resolution.
//!
//! Walks the declaration-type references a table captured and checks every
//! named type resolves: built-ins, same-file declarations, then the shared
//! graph. Unresolved names may trigger bounded artifact loading before they
//! become errors. As enrichment, variables whose declared type resolves to
//! exactly one namespaced symbol get their `TypeInfo` namespace filled in.

use crate::diagnostics::Diagnostic;
use crate::error::ValidatorFailure;
use crate::graph::SymbolGraph;
use crate::symbol::{SymbolTable, TypeInfo};
use crate::types::{Range, ReferenceKind};
use crate::validation::{
    ArtifactBudget, EnrichmentData, ValidationOptions, ValidationResult, ValidationTier, Validator,
};
use async_trait::async_trait;
use indexmap::IndexMap;

pub struct TypeResolutionValidator;

impl TypeResolutionValidator {
    /// Simple names this reference requires to resolve, generics unwrapped.
    fn required_names(info: &TypeInfo, out: &mut Vec<String>) {
        if !info.is_primitive && !info.is_collection && !info.is_built_in && !info.is_void() {
            out.push(info.name.clone());
        }
        for param in &info.type_parameters {
            Self::required_names(param, out);
        }
        if let Some(key) = &info.key_type {
            Self::required_names(key, out);
        }
    }

    fn resolves(name: &str, table: &SymbolTable, graph: &SymbolGraph) -> bool {
        table
            .declared_types()
            .any(|t| t.name.eq_ignore_ascii_case(name))
            || !graph.lookup_by_name(name).is_empty()
            || graph.lookup_by_fqn(name).is_some()
    }
}

#[async_trait]
impl Validator for TypeResolutionValidator {
    fn id(&self) -> &'static str {
        "type-resolution"
    }

    fn name(&self) -> &'static str {
        "Type resolution"
    }

    fn tier(&self) -> ValidationTier {
        ValidationTier::Thorough
    }

    fn priority(&self) -> u32 {
        5
    }

    async fn validate(
        &self,
        table: &SymbolTable,
        graph: &SymbolGraph,
        options: &ValidationOptions,
        budget: &ArtifactBudget,
    ) -> Result<ValidationResult, ValidatorFailure> {
        let mut warnings = Vec::new();

        // First pass: gather unresolved names, first location wins.
        let mut unresolved: IndexMap<String, Range> = IndexMap::new();
        for reference in table.references() {
            if !matches!(
                reference.kind,
                ReferenceKind::TypeDeclaration
                    | ReferenceKind::ParameterType
                    | ReferenceKind::ClassReference
            ) {
                continue;
            }
            let info = TypeInfo::parse(&reference.name);
            let mut names = Vec::new();
            Self::required_names(&info, &mut names);
            for name in names {
                if !Self::resolves(&name, table, graph) {
                    unresolved
                        .entry(name.to_ascii_lowercase())
                        .or_insert(reference.location);
                }
            }
        }

        // One bounded load round, never transitive.
        if !unresolved.is_empty() {
            let wanted: Vec<String> = unresolved.keys().cloned().collect();
            let loaded = budget
                .load(options, &wanted, table.file_uri(), &mut warnings)
                .await;
            if !loaded.is_empty() {
                unresolved.retain(|name, _| !Self::resolves(name, table, graph));
            }
        }

        let errors: Vec<Diagnostic> = unresolved
            .iter()
            .map(|(name, range)| {
                Diagnostic::error(
                    "UNRESOLVED_TYPE",
                    format!("Type '{name}' cannot be resolved"),
                    *range,
                )
            })
            .collect();

        // Enrichment: qualify variable types that resolve unambiguously.
        let mut enrichment = EnrichmentData::default();
        for symbol in table.user_symbols() {
            let Some(value_type) = symbol.variable_type() else {
                continue;
            };
            if value_type.namespace.is_some() || value_type.is_primitive || value_type.is_collection
            {
                continue;
            }
            let candidates = graph.lookup_by_name(&value_type.name);
            if candidates.len() == 1 {
                if let Some(namespace) = &candidates[0].namespace {
                    let mut refined = value_type.clone();
                    refined.namespace = Some(namespace.clone());
                    enrichment.inferred_types.insert(symbol.id.clone(), refined);
                }
            }
        }

        let mut result = ValidationResult::from_diagnostics(errors, warnings);
        result.result_type = Some(self.id().to_string());
        if !enrichment.is_empty() {
            result.enrichment = Some(enrichment);
        }
        Ok(result)
    }
}
