//! Cross-file method resolution.
//!
//! Resolves method-call references to a concrete method by receiver type,
//! name and parameter-type compatibility. The receiver is either a value in
//! the calling table (its declared type decides) or a type name resolved
//! through the shared graph, with one bounded artifact-load round for types
//! the graph has not seen. Incompatible argument or expected-return types
//! produce errors anchored at the call-site identifier range.

use crate::diagnostics::Diagnostic;
use crate::error::ValidatorFailure;
use crate::graph::{ResolutionContext, SymbolGraph};
use crate::symbol::{Symbol, SymbolTable, TypeInfo};
use crate::types::{SymbolId, SymbolKind};
use crate::validation::{
    ArtifactBudget, ValidationOptions, ValidationResult, ValidationTier, Validator,
};
use async_trait::async_trait;
use std::sync::Arc;

pub struct MethodResolutionValidator;

/// Widening and equivalence rules for argument-to-parameter flow.
fn is_assignable(from: &str, to: &str) -> bool {
    let from = TypeInfo::parse(from).normalized();
    let to = TypeInfo::parse(to).normalized();
    if from == to {
        return true;
    }
    match (from.as_str(), to.as_str()) {
        // Everything flows into Object.
        (_, "object") => true,
        ("integer", "long" | "decimal" | "double") => true,
        ("long", "decimal" | "double") => true,
        ("decimal", "double") | ("double", "decimal") => true,
        ("id", "string") | ("string", "id") => true,
        _ => false,
    }
}

struct ResolvedReceiver {
    type_id: SymbolId,
    table: Arc<SymbolTable>,
}

impl MethodResolutionValidator {
    /// Declared type of the receiver: a value's declared type when the
    /// qualifier names a variable, parameter or field, otherwise the
    /// qualifier itself as a type name.
    fn receiver_type_name(table: &SymbolTable, qualifier: &str) -> String {
        table
            .user_symbols()
            .find(|s| {
                s.name.eq_ignore_ascii_case(qualifier)
                    && matches!(
                        s.kind,
                        SymbolKind::Variable | SymbolKind::Parameter | SymbolKind::Field
                    )
            })
            .and_then(|s| s.variable_type())
            .map(|t| t.name.clone())
            .unwrap_or_else(|| qualifier.to_string())
    }

    fn resolve_type(
        table: &SymbolTable,
        graph: &SymbolGraph,
        type_name: &str,
    ) -> Option<ResolvedReceiver> {
        if let Some(own) = table
            .declared_types()
            .find(|t| t.name.eq_ignore_ascii_case(type_name))
        {
            // Same-file receiver: the live table is authoritative.
            return graph
                .symbol_table_for(table.file_uri())
                .map(|shared| ResolvedReceiver {
                    type_id: own.id.clone(),
                    table: shared,
                })
                .or_else(|| {
                    Some(ResolvedReceiver {
                        type_id: own.id.clone(),
                        table: Arc::new(table.clone()),
                    })
                });
        }

        let context = ResolutionContext {
            source_file: Some(table.file_uri().to_string()),
            ..Default::default()
        };
        let outcome = graph.lookup_with_context(type_name, &context);
        let symbol = outcome.symbol.filter(|s| s.kind.is_type())?;
        let shared = graph.symbol_table_for(&symbol.file_uri)?;
        Some(ResolvedReceiver {
            type_id: symbol.id,
            table: shared,
        })
    }

    fn methods_named<'t>(receiver: &'t ResolvedReceiver, name: &str) -> Vec<&'t Symbol> {
        receiver
            .table
            .methods_of(&receiver.type_id)
            .into_iter()
            .filter(|m| m.kind == SymbolKind::Method && m.name.eq_ignore_ascii_case(name))
            .collect()
    }
}

#[async_trait]
impl Validator for MethodResolutionValidator {
    fn id(&self) -> &'static str {
        "method-resolution"
    }

    fn name(&self) -> &'static str {
        "Method resolution"
    }

    fn tier(&self) -> ValidationTier {
        ValidationTier::Thorough
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn validate(
        &self,
        table: &SymbolTable,
        graph: &SymbolGraph,
        options: &ValidationOptions,
        budget: &ArtifactBudget,
    ) -> Result<ValidationResult, ValidatorFailure> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for reference in table.references() {
            if reference.kind != crate::types::ReferenceKind::MethodCall {
                continue;
            }
            let Some(qualifier) = &reference.qualifier else {
                // Unqualified calls resolve against the enclosing type and
                // its inheritance chain; out of reach for a per-call check.
                continue;
            };

            let type_name = Self::receiver_type_name(table, qualifier);
            let mut receiver = Self::resolve_type(table, graph, &type_name);
            if receiver.is_none() {
                let loaded = budget
                    .load(
                        options,
                        &[type_name.clone()],
                        table.file_uri(),
                        &mut warnings,
                    )
                    .await;
                if !loaded.is_empty() {
                    receiver = Self::resolve_type(table, graph, &type_name);
                }
            }
            let Some(receiver) = receiver else {
                // Receiver type unknown to the graph; the type-resolution
                // pass owns that diagnostic.
                continue;
            };

            let candidates = Self::methods_named(&receiver, &reference.name);
            if candidates.is_empty() {
                errors.push(Diagnostic::error(
                    "UNRESOLVED_METHOD",
                    format!(
                        "Method '{}' does not exist on type '{type_name}'",
                        reference.name
                    ),
                    reference.location,
                ));
                continue;
            }

            let Some(hints) = &reference.argument_type_hints else {
                continue;
            };

            let mut chosen = None;
            for method in &candidates {
                let Some((_, params, _, _)) = method.method_detail() else {
                    continue;
                };
                if params.len() != hints.len() {
                    continue;
                }
                let compatible = params.iter().zip(hints).all(|(param, hint)| {
                    hint.as_deref()
                        .is_none_or(|h| is_assignable(h, &param.type_info.original_type_string))
                });
                if compatible {
                    chosen = Some(*method);
                    break;
                }
            }

            let Some(chosen) = chosen else {
                let shown: Vec<&str> = hints
                    .iter()
                    .map(|h| h.as_deref().unwrap_or("null"))
                    .collect();
                errors.push(Diagnostic::error(
                    "METHOD_DOES_NOT_SUPPORT_PARAMETER_TYPE",
                    format!(
                        "Method '{}' on type '{type_name}' does not accept ({})",
                        reference.name,
                        shown.join(", ")
                    ),
                    reference.location,
                ));
                continue;
            };

            if let Some(expected) = &reference.expected_return_type {
                if let Some((return_type, _, _, _)) = chosen.method_detail() {
                    if !is_assignable(&return_type.original_type_string, expected) {
                        errors.push(Diagnostic::error(
                            "METHOD_DOES_NOT_SUPPORT_RETURN_TYPE",
                            format!(
                                "Method '{}' returns '{}', which does not convert to '{expected}'",
                                reference.name, return_type.original_type_string
                            ),
                            reference.location,
                        ));
                    }
                }
            }
        }

        let mut result = ValidationResult::from_diagnostics(errors, warnings);
        result.result_type = Some(self.id().to_string());
        Ok(result)
    }
}
