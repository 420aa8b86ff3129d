//! Table-wide modifier semantics.
//!
//! Checks the finished symbol table for what declaration sites cannot see:
//! visibility widening against the container, mutually-exclusive flags,
//! webService reach, constructor flag restrictions and interface-method
//! modifier erasure.

use crate::diagnostics::Diagnostic;
use crate::error::ValidatorFailure;
use crate::graph::SymbolGraph;
use crate::parsing::declarations::EXCLUSIVE_FLAG_PAIRS;
use crate::symbol::{ModifierFlags, SymbolTable};
use crate::types::{SymbolKind, Visibility};
use crate::validation::{
    ArtifactBudget, ValidationOptions, ValidationResult, ValidationTier, Validator,
};
use async_trait::async_trait;

pub struct ModifierSemanticsValidator;

#[async_trait]
impl Validator for ModifierSemanticsValidator {
    fn id(&self) -> &'static str {
        "modifier-semantics"
    }

    fn name(&self) -> &'static str {
        "Modifier semantics"
    }

    fn tier(&self) -> ValidationTier {
        ValidationTier::Immediate
    }

    fn priority(&self) -> u32 {
        5
    }

    async fn validate(
        &self,
        table: &SymbolTable,
        _graph: &SymbolGraph,
        _options: &ValidationOptions,
        _budget: &ArtifactBudget,
    ) -> Result<ValidationResult, ValidatorFailure> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for symbol in table.user_symbols() {
            let range = symbol.location.identifier_range;

            for (a, b, label) in EXCLUSIVE_FLAG_PAIRS {
                if symbol.modifiers.flags.contains(a | b) {
                    errors.push(Diagnostic::error(
                        "ILLEGAL_MODIFIER_COMBINATION",
                        format!("'{}' cannot be both {label}", symbol.name),
                        range,
                    ));
                }
            }

            if symbol.modifiers.flags.contains(ModifierFlags::WEB_SERVICE)
                && symbol.modifiers.visibility != Visibility::Global
            {
                errors.push(Diagnostic::error(
                    "WEBSERVICE_REQUIRES_GLOBAL",
                    format!("webService member '{}' must be declared global", symbol.name),
                    range,
                ));
            }

            if symbol.kind == SymbolKind::Constructor {
                for (flag, label) in [
                    (ModifierFlags::ABSTRACT, "abstract"),
                    (ModifierFlags::VIRTUAL, "virtual"),
                    (ModifierFlags::OVERRIDE, "override"),
                ] {
                    if symbol.modifiers.flags.contains(flag) {
                        errors.push(Diagnostic::error(
                            "ILLEGAL_MODIFIER_COMBINATION",
                            format!("Constructor '{}' cannot be declared {label}", symbol.name),
                            range,
                        ));
                    }
                }
            }

            // Properties reach the table through the binary cache or an
            // external builder; their modifier rules live here rather than
            // at a collector declaration site.
            if symbol.kind == SymbolKind::Property {
                for (flag, label) in [
                    (ModifierFlags::FINAL, "final"),
                    (ModifierFlags::TRANSIENT, "transient"),
                    (ModifierFlags::ABSTRACT, "abstract"),
                ] {
                    if symbol.modifiers.flags.contains(flag) {
                        errors.push(Diagnostic::error(
                            "ILLEGAL_MODIFIER_COMBINATION",
                            format!("Property '{}' cannot be declared {label}", symbol.name),
                            range,
                        ));
                    }
                }
            }

            let Some(container) = symbol.parent_id.as_ref().and_then(|p| table.get(p)) else {
                continue;
            };
            if !container.kind.is_type() {
                continue;
            }

            // Interface members carry no modifiers of their own.
            if container.kind == SymbolKind::Interface {
                if symbol.modifiers.visibility != Visibility::Default
                    || !symbol.modifiers.flags.is_empty()
                {
                    warnings.push(Diagnostic::warning(
                        "INTERFACE_METHOD_MODIFIERS",
                        format!("Modifiers on interface member '{}' are ignored", symbol.name),
                        range,
                    ));
                }
                continue;
            }

            // A member cannot widen its container's visibility.
            if symbol.modifiers.visibility.rank() > container.modifiers.visibility.rank() {
                errors.push(Diagnostic::error(
                    "VISIBILITY_EXCEEDS_CONTAINER",
                    format!(
                        "'{}' is {} but its containing {} '{}' is {}",
                        symbol.name,
                        symbol.modifiers.visibility.as_str(),
                        container.kind,
                        container.name,
                        container.modifiers.visibility.as_str(),
                    ),
                    range,
                ));
            }
        }

        let mut result = ValidationResult::from_diagnostics(errors, warnings);
        result.result_type = Some(self.id().to_string());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{CompilerService, SymbolCollector, ValidationScope};
    use crate::types::file_uri;

    async fn check(source: &str) -> ValidationResult {
        let mut service = CompilerService::new().unwrap();
        let collector =
            SymbolCollector::new(file_uri("file:///T.cls"), None, ValidationScope::default());
        let out = service.compile(source, "file:///T.cls", collector).unwrap();
        let graph = SymbolGraph::new();
        ModifierSemanticsValidator
            .validate(
                &out.result,
                &graph,
                &ValidationOptions::immediate(),
                &ArtifactBudget::exhausted(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_member_cannot_widen_container_visibility() {
        let result = check("class Quiet { public Integer loud() { return 1; } }").await;
        // Container is default-visible; a public member widens it.
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].code, "VISIBILITY_EXCEEDS_CONTAINER");
    }

    #[tokio::test]
    async fn test_private_member_in_public_class_is_fine() {
        let result = check("public class Api { private Integer helper() { return 1; } }").await;
        assert!(result.is_valid, "{:?}", result.errors);
    }

    #[tokio::test]
    async fn test_abstract_final_combination_flagged() {
        let result = check("public abstract final class Odd { }").await;
        assert!(!result.is_valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == "ILLEGAL_MODIFIER_COMBINATION"));
    }

    #[tokio::test]
    async fn test_property_modifier_rules() {
        use crate::symbol::{Modifiers, SymbolDetail, SymbolFactory, SymbolTable, TypeInfo};
        use crate::types::{Range, ScopeKind, SymbolKind, SymbolLocation, file_uri};

        // Properties are not produced by the grammar front end; build the
        // table the way the binary cache does.
        let uri = file_uri("apex://acct/Account.cls");
        let mut table = SymbolTable::new(uri.clone());
        let factory = SymbolFactory::new(uri, None);
        let class = factory.full(
            SymbolKind::Class,
            "Account",
            SymbolLocation::at(Range::new(1, 0, 5, 1)),
            &table.scope_path(),
            None,
            Modifiers::with_visibility(crate::types::Visibility::Public),
            Vec::new(),
            None,
        );
        let class_id = class.id.clone();
        table.add_symbol(class).unwrap();
        table.push_scope("Account", ScopeKind::Class);
        let property = factory.full(
            SymbolKind::Property,
            "Name",
            SymbolLocation::at(Range::new(2, 4, 2, 8)),
            &table.scope_path(),
            Some(class_id),
            Modifiers::new(
                crate::types::Visibility::Public,
                crate::symbol::ModifierFlags::FINAL,
            ),
            Vec::new(),
            Some(SymbolDetail::Variable {
                value_type: TypeInfo::parse("String"),
                initial_value: None,
            }),
        );
        table.add_symbol(property).unwrap();
        table.pop_scope();

        let graph = SymbolGraph::new();
        let result = ModifierSemanticsValidator
            .validate(
                &table,
                &graph,
                &ValidationOptions::immediate(),
                &ArtifactBudget::exhausted(),
            )
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("Name"));
        assert!(result.errors[0].message.contains("final"));
    }

    #[tokio::test]
    async fn test_interface_member_modifiers_warn() {
        let result = check("public interface Api { public Integer run(); }").await;
        assert!(result.is_valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.code == "INTERFACE_METHOD_MODIFIERS"));
    }
}
