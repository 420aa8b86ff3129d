//! Declaration-site modifier validators.
//!
//! Small checks invoked by the collector at each declaration boundary.
//! They report through [`ErrorReporter`] and never stop the walk; the
//! table-wide semantic pass lives in the validation engine.

use crate::diagnostics::ErrorReporter;
use crate::symbol::{ModifierFlags, Modifiers};
use crate::types::{Range, Visibility};

/// Flag pairs that can never appear together on one declaration.
pub const EXCLUSIVE_FLAG_PAIRS: [(ModifierFlags, ModifierFlags, &str); 4] = [
    (ModifierFlags::ABSTRACT, ModifierFlags::FINAL, "abstract and final"),
    (ModifierFlags::VIRTUAL, ModifierFlags::FINAL, "virtual and final"),
    (ModifierFlags::ABSTRACT, ModifierFlags::STATIC, "abstract and static"),
    (
        ModifierFlags::ABSTRACT,
        ModifierFlags::VIRTUAL,
        "abstract and virtual",
    ),
];

fn check_exclusive_flags(
    modifiers: Modifiers,
    what: &str,
    name: &str,
    location: Range,
    reporter: &mut dyn ErrorReporter,
) {
    for (a, b, label) in EXCLUSIVE_FLAG_PAIRS {
        if modifiers.flags.contains(a | b) {
            reporter.report_error(
                "ILLEGAL_MODIFIER_COMBINATION",
                format!("{what} '{name}' cannot be both {label}"),
                location,
            );
        }
    }
}

/// Class and inner-class declarations.
pub struct ClassModifierValidator;

impl ClassModifierValidator {
    pub fn check(
        modifiers: Modifiers,
        name: &str,
        location: Range,
        reporter: &mut dyn ErrorReporter,
    ) {
        check_exclusive_flags(modifiers, "Class", name, location, reporter);
        if modifiers.flags.contains(ModifierFlags::WEB_SERVICE) {
            reporter.report_error(
                "ILLEGAL_MODIFIER_COMBINATION",
                format!("Class '{name}' cannot be declared webService"),
                location,
            );
        }
    }
}

/// Method declarations (non-constructor).
pub struct MethodModifierValidator;

impl MethodModifierValidator {
    pub fn check(
        modifiers: Modifiers,
        name: &str,
        has_body: bool,
        location: Range,
        reporter: &mut dyn ErrorReporter,
    ) {
        check_exclusive_flags(modifiers, "Method", name, location, reporter);
        if modifiers.is_abstract() && has_body {
            reporter.report_error(
                "ILLEGAL_MODIFIER_COMBINATION",
                format!("Abstract method '{name}' cannot have a body"),
                location,
            );
        }
        if !modifiers.is_abstract() && !has_body {
            reporter.report_error(
                "MISSING_METHOD_BODY",
                format!("Method '{name}' must have a body or be declared abstract"),
                location,
            );
        }
        if modifiers.flags.contains(ModifierFlags::WEB_SERVICE)
            && modifiers.visibility != Visibility::Global
        {
            reporter.report_error(
                "ILLEGAL_MODIFIER_COMBINATION",
                format!("webService method '{name}' must be global"),
                location,
            );
        }
        if modifiers.is_abstract() && modifiers.visibility == Visibility::Private {
            reporter.report_error(
                "ILLEGAL_MODIFIER_COMBINATION",
                format!("Abstract method '{name}' cannot be private"),
                location,
            );
        }
    }
}

/// Constructor declarations.
pub struct ConstructorModifierValidator;

impl ConstructorModifierValidator {
    pub fn check(
        modifiers: Modifiers,
        name: &str,
        location: Range,
        reporter: &mut dyn ErrorReporter,
    ) {
        for flag in [
            (ModifierFlags::ABSTRACT, "abstract"),
            (ModifierFlags::VIRTUAL, "virtual"),
            (ModifierFlags::OVERRIDE, "override"),
            (ModifierFlags::STATIC, "static"),
        ] {
            if modifiers.flags.contains(flag.0) {
                reporter.report_error(
                    "ILLEGAL_MODIFIER_COMBINATION",
                    format!("Constructor '{name}' cannot be declared {}", flag.1),
                    location,
                );
            }
        }
    }
}

/// Field declarations. Property symbols never pass through the collector
/// (no grammar production); their rules live in the table-wide
/// modifier-semantics validator.
pub struct FieldModifierValidator;

impl FieldModifierValidator {
    pub fn check(
        modifiers: Modifiers,
        name: &str,
        location: Range,
        reporter: &mut dyn ErrorReporter,
    ) {
        for flag in [
            (ModifierFlags::ABSTRACT, "abstract"),
            (ModifierFlags::VIRTUAL, "virtual"),
            (ModifierFlags::OVERRIDE, "override"),
        ] {
            if modifiers.flags.contains(flag.0) {
                reporter.report_error(
                    "ILLEGAL_MODIFIER_COMBINATION",
                    format!("Field '{name}' cannot be declared {}", flag.1),
                    location,
                );
            }
        }
    }
}

/// Members inside an interface body: only methods are legal, and they carry
/// no modifiers of their own.
pub struct InterfaceBodyValidator;

impl InterfaceBodyValidator {
    pub fn check_field(name: &str, location: Range, reporter: &mut dyn ErrorReporter) {
        reporter.report_error(
            "ILLEGAL_PLACEMENT",
            format!("Field '{name}' is not allowed in an interface body"),
            location,
        );
    }

    pub fn check_method(
        modifiers: Modifiers,
        name: &str,
        location: Range,
        reporter: &mut dyn ErrorReporter,
    ) {
        if modifiers.visibility != Visibility::Default || !modifiers.flags.is_empty() {
            reporter.report_warning(
                "INTERFACE_METHOD_MODIFIERS",
                format!("Modifiers on interface method '{name}' are ignored"),
                location,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticBuffer;

    #[test]
    fn test_abstract_final_class_rejected() {
        let mut buffer = DiagnosticBuffer::new();
        let modifiers = Modifiers::new(
            Visibility::Public,
            ModifierFlags::ABSTRACT | ModifierFlags::FINAL,
        );
        ClassModifierValidator::check(modifiers, "Bad", Range::default(), &mut buffer);
        assert_eq!(buffer.errors.len(), 1);
        assert_eq!(buffer.errors[0].code, "ILLEGAL_MODIFIER_COMBINATION");
    }

    #[test]
    fn test_abstract_method_with_body_rejected() {
        let mut buffer = DiagnosticBuffer::new();
        let modifiers = Modifiers::new(Visibility::Public, ModifierFlags::ABSTRACT);
        MethodModifierValidator::check(modifiers, "run", true, Range::default(), &mut buffer);
        assert_eq!(buffer.errors.len(), 1);
    }

    #[test]
    fn test_concrete_method_without_body_rejected() {
        let mut buffer = DiagnosticBuffer::new();
        MethodModifierValidator::check(
            Modifiers::default(),
            "run",
            false,
            Range::default(),
            &mut buffer,
        );
        assert_eq!(buffer.errors[0].code, "MISSING_METHOD_BODY");
    }

    #[test]
    fn test_constructor_flags_rejected() {
        let mut buffer = DiagnosticBuffer::new();
        let modifiers = Modifiers::new(
            Visibility::Public,
            ModifierFlags::ABSTRACT | ModifierFlags::OVERRIDE,
        );
        ConstructorModifierValidator::check(modifiers, "Ctor", Range::default(), &mut buffer);
        assert_eq!(buffer.errors.len(), 2);
    }

    #[test]
    fn test_interface_field_is_illegal_placement() {
        let mut buffer = DiagnosticBuffer::new();
        InterfaceBodyValidator::check_field("x", Range::default(), &mut buffer);
        assert_eq!(buffer.errors[0].code, "ILLEGAL_PLACEMENT");
    }

    #[test]
    fn test_interface_method_modifiers_warn_only() {
        let mut buffer = DiagnosticBuffer::new();
        InterfaceBodyValidator::check_method(
            Modifiers::with_visibility(Visibility::Public),
            "run",
            Range::default(),
            &mut buffer,
        );
        assert!(buffer.errors.is_empty());
        assert_eq!(buffer.warnings.len(), 1);
    }
}
