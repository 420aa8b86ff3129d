//! Constructor naming rule: a constructor must carry its class's name.

use crate::diagnostics::Diagnostic;
use crate::error::ValidatorFailure;
use crate::graph::SymbolGraph;
use crate::symbol::SymbolTable;
use crate::types::SymbolKind;
use crate::validation::{
    ArtifactBudget, ValidationOptions, ValidationResult, ValidationTier, Validator,
};
use async_trait::async_trait;

pub struct ConstructorNamingValidator;

#[async_trait]
impl Validator for ConstructorNamingValidator {
    fn id(&self) -> &'static str {
        "constructor-naming"
    }

    fn name(&self) -> &'static str {
        "Constructor naming"
    }

    fn tier(&self) -> ValidationTier {
        ValidationTier::Immediate
    }

    fn priority(&self) -> u32 {
        1
    }

    async fn validate(
        &self,
        table: &SymbolTable,
        _graph: &SymbolGraph,
        _options: &ValidationOptions,
        _budget: &ArtifactBudget,
    ) -> Result<ValidationResult, ValidatorFailure> {
        let mut errors = Vec::new();

        for ctor in table.symbols_of_kind(SymbolKind::Constructor) {
            let Some(class) = ctor.parent_id.as_ref().and_then(|p| table.get(p)) else {
                continue;
            };
            if !class.kind.is_type() {
                continue;
            }
            if !ctor.name.eq_ignore_ascii_case(&class.name) {
                errors.push(Diagnostic::error(
                    "INVALID_CONSTRUCTOR_NAME",
                    format!(
                        "Constructor '{}' must be named after its class '{}'",
                        ctor.name, class.name
                    ),
                    ctor.location.identifier_range,
                ));
            }
        }

        let mut result = ValidationResult::from_diagnostics(errors, Vec::new());
        result.result_type = Some(self.id().to_string());
        Ok(result)
    }
}
