//! Identifier validation.
//!
//! Reserved words, length limits and version-gated rules, checked at every
//! declaration site. The collector keeps the symbol on error; the diagnostic
//! is what the user sees.

use crate::diagnostics::ErrorReporter;
use crate::types::Range;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Platform identifier length cap.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// API version that promoted `switch`/`when` to reserved words.
const SWITCH_RESERVED_SINCE: u32 = 43;

/// Words that can never name a declaration.
static RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "abstract", "break", "catch", "class", "continue", "delete", "do", "else", "enum",
        "extends", "false", "final", "finally", "for", "global", "if", "implements", "insert",
        "instanceof", "interface", "new", "null", "override", "private", "protected", "public",
        "return", "static", "super", "this", "throw", "transient", "trigger", "true", "try",
        "undelete", "update", "upsert", "virtual", "void", "webservice", "while",
    ])
});

/// Reserved only from [`SWITCH_RESERVED_SINCE`] onwards.
static VERSIONED_RESERVED_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| HashSet::from(["switch", "when"]));

/// Version-aware identifier rules for one compilation.
#[derive(Debug, Clone, Copy)]
pub struct ValidationScope {
    api_version: u32,
    version_specific: bool,
}

impl ValidationScope {
    pub fn new(api_version: u32, version_specific: bool) -> Self {
        Self {
            api_version,
            version_specific,
        }
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Check a declared identifier, reporting problems through `reporter`.
    /// Returns false when the name is unusable (the caller still builds the
    /// symbol to maximize recovery).
    pub fn validate_identifier(
        &self,
        name: &str,
        location: Range,
        reporter: &mut dyn ErrorReporter,
    ) -> bool {
        let lower = name.to_ascii_lowercase();
        let mut ok = true;

        if RESERVED_WORDS.contains(lower.as_str()) {
            reporter.report_error(
                "RESERVED_WORD",
                format!("'{name}' is a reserved word and cannot be used as an identifier"),
                location,
            );
            ok = false;
        } else if self.version_specific
            && self.api_version >= SWITCH_RESERVED_SINCE
            && VERSIONED_RESERVED_WORDS.contains(lower.as_str())
        {
            reporter.report_error(
                "RESERVED_WORD",
                format!(
                    "'{name}' is reserved from API version {SWITCH_RESERVED_SINCE} onwards"
                ),
                location,
            );
            ok = false;
        }

        if name.len() > MAX_IDENTIFIER_LENGTH {
            reporter.report_error(
                "IDENTIFIER_TOO_LONG",
                format!(
                    "Identifier '{}...' exceeds the {MAX_IDENTIFIER_LENGTH} character limit",
                    &name[..16.min(name.len())]
                ),
                location,
            );
            ok = false;
        }

        if name.ends_with('_') || name.contains("__") {
            reporter.report_error(
                "INVALID_IDENTIFIER",
                format!("Identifier '{name}' cannot end with or contain consecutive underscores"),
                location,
            );
            ok = false;
        }

        ok
    }
}

impl Default for ValidationScope {
    fn default() -> Self {
        Self::new(crate::validation::DEFAULT_API_VERSION, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticBuffer;

    fn check(scope: ValidationScope, name: &str) -> DiagnosticBuffer {
        let mut buffer = DiagnosticBuffer::new();
        scope.validate_identifier(name, Range::default(), &mut buffer);
        buffer
    }

    #[test]
    fn test_plain_identifier_passes() {
        assert!(check(ValidationScope::default(), "accountList").is_empty());
    }

    #[test]
    fn test_reserved_word_rejected() {
        let buffer = check(ValidationScope::default(), "Class");
        assert_eq!(buffer.errors.len(), 1);
        assert_eq!(buffer.errors[0].code, "RESERVED_WORD");
    }

    #[test]
    fn test_switch_is_version_gated() {
        // Pre-43 compilations may still use `switch` as a name.
        assert!(check(ValidationScope::new(40, true), "switch").is_empty());
        let buffer = check(ValidationScope::new(55, true), "switch");
        assert_eq!(buffer.errors.len(), 1);
        // Gates off entirely when version-specific validation is disabled.
        assert!(check(ValidationScope::new(55, false), "switch").is_empty());
    }

    #[test]
    fn test_underscore_rules() {
        assert_eq!(check(ValidationScope::default(), "bad_").errors.len(), 1);
        assert_eq!(check(ValidationScope::default(), "ba__d").errors.len(), 1);
        assert!(check(ValidationScope::default(), "fine_name").is_empty());
    }
}
