//! Symbol construction.
//!
//! The factory is the only place identities are assigned. The minimal
//! constructor covers hydration and tests; the full constructor is what the
//! collector uses and folds the current scope path into the id so same-named
//! locals in sibling scopes stay distinct.

use crate::symbol::{Annotation, Modifiers, Symbol, SymbolDetail};
use crate::types::{FileUri, Range, SymbolId, SymbolKind, SymbolLocation};

/// Builds symbols for one file.
#[derive(Debug, Clone)]
pub struct SymbolFactory {
    file_uri: FileUri,
    namespace: Option<String>,
}

impl SymbolFactory {
    pub fn new(file_uri: FileUri, namespace: Option<String>) -> Self {
        Self {
            file_uri,
            namespace,
        }
    }

    pub fn file_uri(&self) -> &FileUri {
        &self.file_uri
    }

    /// Project namespace applied to type-introducing symbols.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Minimal constructor: kind, name, location, parent. The id is derived
    /// from the parent's name as the scope path.
    pub fn minimal(
        &self,
        kind: SymbolKind,
        name: &str,
        range: Range,
        parent: Option<&Symbol>,
    ) -> Symbol {
        let path: Vec<String> = parent.map(|p| p.name.clone()).into_iter().collect();
        let id = SymbolId::derive(&self.file_uri, &path, kind, name);
        Symbol::assemble(
            id,
            name.to_string(),
            kind,
            self.file_uri.clone(),
            SymbolLocation::at(range),
            parent.map(|p| p.id.clone()),
            None,
            Modifiers::default(),
            Vec::new(),
            None,
        )
    }

    /// Full constructor used by the collector. `scope_path` is the table's
    /// current scope path and is hashed into the identity.
    #[allow(clippy::too_many_arguments)]
    pub fn full(
        &self,
        kind: SymbolKind,
        name: &str,
        location: SymbolLocation,
        scope_path: &[String],
        parent_id: Option<SymbolId>,
        modifiers: Modifiers,
        annotations: Vec<Annotation>,
        detail: Option<SymbolDetail>,
    ) -> Symbol {
        let id = SymbolId::derive(&self.file_uri, scope_path, kind, name);
        let namespace = if kind.is_type() {
            self.namespace.clone()
        } else {
            None
        };
        Symbol::assemble(
            id,
            name.to_string(),
            kind,
            self.file_uri.clone(),
            location,
            parent_id,
            namespace,
            modifiers,
            annotations,
            detail,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::file_uri;

    fn factory() -> SymbolFactory {
        SymbolFactory::new(file_uri("file:///Foo.cls"), Some("myns".to_string()))
    }

    #[test]
    fn test_full_assigns_namespace_to_types_only() {
        let f = factory();
        let class = f.full(
            SymbolKind::Class,
            "Foo",
            SymbolLocation::at(Range::new(1, 0, 3, 1)),
            &["File".into()],
            None,
            Modifiers::default(),
            Vec::new(),
            None,
        );
        assert_eq!(class.namespace.as_deref(), Some("myns"));

        let var = f.full(
            SymbolKind::Variable,
            "x",
            SymbolLocation::at(Range::new(2, 4, 2, 5)),
            &["File".into(), "Foo".into()],
            Some(class.id.clone()),
            Modifiers::default(),
            Vec::new(),
            None,
        );
        assert!(var.namespace.is_none());
        assert_eq!(var.parent_id.as_ref(), Some(&class.id));
    }

    #[test]
    fn test_scope_path_changes_identity() {
        let f = factory();
        let loc = SymbolLocation::at(Range::new(4, 8, 4, 9));
        let a = f.full(
            SymbolKind::Variable,
            "x",
            loc,
            &["File".into(), "Foo".into(), "m".into(), "block1".into()],
            None,
            Modifiers::default(),
            Vec::new(),
            None,
        );
        let b = f.full(
            SymbolKind::Variable,
            "x",
            loc,
            &["File".into(), "Foo".into(), "m".into(), "block2".into()],
            None,
            Modifiers::default(),
            Vec::new(),
            None,
        );
        assert_ne!(a.id, b.id);
    }
}
