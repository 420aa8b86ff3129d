//! Core identity and location types shared by every subsystem.
//!
//! Symbol identities are string handles derived from the declaring file, the
//! scope path, the symbol kind and the simple name, so identical names in
//! sibling scopes stay distinguishable for the lifetime of their table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable, process-unique handle for a symbol.
///
/// Derived from `(file URI, scope path, kind, name)`. Cheap to clone and to
/// use as a map key; the underlying string is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(Arc<str>);

impl SymbolId {
    /// Derive an id from the identity tuple. The scope path is joined as-is;
    /// sibling scopes carry distinct synthetic names (`block1`, `block2`, ...)
    /// so same-named locals in different blocks get different ids.
    pub fn derive(file_uri: &str, scope_path: &[String], kind: SymbolKind, name: &str) -> Self {
        let path = scope_path.join("/");
        Self(Arc::from(
            format!("{file_uri}#{path}#{}#{name}", kind.as_str()).as_str(),
        ))
    }

    /// Rehydrate an id from its serialized form (binary cache path).
    pub fn from_raw(raw: impl AsRef<str>) -> Self {
        Self(Arc::from(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SymbolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shared file URI handle. Files are keyed by their URI everywhere; the graph
/// and the symbol tables clone these freely.
pub type FileUri = Arc<str>;

/// Make a [`FileUri`] from any string-ish value.
pub fn file_uri(s: impl AsRef<str>) -> FileUri {
    Arc::from(s.as_ref())
}

/// A source span. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Range {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    pub fn contains(&self, line: u32, column: u32) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && column < self.start_column {
            return false;
        }
        if line == self.end_line && column > self.end_column {
            return false;
        }
        true
    }
}

/// The two extents a symbol carries: the full declaration and the identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub symbol_range: Range,
    pub identifier_range: Range,
}

impl SymbolLocation {
    pub fn new(symbol_range: Range, identifier_range: Range) -> Self {
        Self {
            symbol_range,
            identifier_range,
        }
    }

    /// Location where both extents collapse to the identifier.
    pub fn at(range: Range) -> Self {
        Self {
            symbol_range: range,
            identifier_range: range,
        }
    }
}

/// Every kind of entity the collector can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Class,
    Interface,
    Enum,
    Trigger,
    Method,
    Constructor,
    Field,
    Property,
    Variable,
    Parameter,
    EnumValue,
    Block,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Trigger => "trigger",
            Self::Method => "method",
            Self::Constructor => "constructor",
            Self::Field => "field",
            Self::Property => "property",
            Self::Variable => "variable",
            Self::Parameter => "parameter",
            Self::EnumValue => "enumvalue",
            Self::Block => "block",
        }
    }

    /// Type-introducing kinds get FQN and registry entries.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Self::Class | Self::Interface | Self::Enum | Self::Trigger
        )
    }

    /// Block symbols are scope containers only and never reach external
    /// consumers asking for user symbols.
    pub fn is_scope_only(&self) -> bool {
        matches!(self, Self::Block)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared visibility. `Default` is what a declaration gets when no access
/// modifier is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Default,
    Private,
    Protected,
    Public,
    Global,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Public => "public",
            Self::Global => "global",
        }
    }

    /// Rank used for the monotonicity check: a member may not be wider than
    /// its container.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Private => 0,
            Self::Default => 1,
            Self::Protected => 2,
            Self::Public => 3,
            Self::Global => 4,
        }
    }
}

/// Scope flavors pushed on the collector's scope stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    File,
    Class,
    Interface,
    Enum,
    Trigger,
    Method,
    Block,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Trigger => "trigger",
            Self::Method => "method",
            Self::Block => "block",
        }
    }
}

/// Semantic kind of a usage site captured during collection. Resolved to a
/// graph edge later; raw at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    ClassReference,
    MethodCall,
    FieldAccess,
    VariableUsage,
    ConstructorCall,
    TypeDeclaration,
    ParameterType,
    ImportReference,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassReference => "class_reference",
            Self::MethodCall => "method_call",
            Self::FieldAccess => "field_access",
            Self::VariableUsage => "variable_usage",
            Self::ConstructorCall => "constructor_call",
            Self::TypeDeclaration => "type_declaration",
            Self::ParameterType => "parameter_type",
            Self::ImportReference => "import_reference",
        }
    }
}

/// Read/write disposition of a variable or field usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
    ReadWrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_id_distinguishes_scopes() {
        let a = SymbolId::derive(
            "file:///X.cls",
            &["File".into(), "Outer".into(), "m".into(), "block1".into()],
            SymbolKind::Variable,
            "x",
        );
        let b = SymbolId::derive(
            "file:///X.cls",
            &["File".into(), "Outer".into(), "m".into(), "block2".into()],
            SymbolKind::Variable,
            "x",
        );
        assert_ne!(a, b);
    }

    #[test]
    fn test_symbol_id_stable() {
        let path = vec!["File".to_string(), "Outer".to_string()];
        let a = SymbolId::derive("file:///X.cls", &path, SymbolKind::Method, "run");
        let b = SymbolId::derive("file:///X.cls", &path, SymbolKind::Method, "run");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_range_contains() {
        let range = Range::new(10, 5, 15, 20);
        assert!(range.contains(12, 0));
        assert!(range.contains(10, 5));
        assert!(range.contains(15, 20));
        assert!(!range.contains(9, 10));
        assert!(!range.contains(10, 4));
        assert!(!range.contains(15, 21));
    }

    #[test]
    fn test_visibility_rank_orders_widening() {
        assert!(Visibility::Private.rank() < Visibility::Default.rank());
        assert!(Visibility::Default.rank() < Visibility::Protected.rank());
        assert!(Visibility::Protected.rank() < Visibility::Public.rank());
        assert!(Visibility::Public.rank() < Visibility::Global.rank());
    }

    #[test]
    fn test_block_symbols_are_scope_only() {
        assert!(SymbolKind::Block.is_scope_only());
        assert!(!SymbolKind::Variable.is_scope_only());
        assert!(SymbolKind::Trigger.is_type());
    }
}
