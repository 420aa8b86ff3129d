//! Symbol model: entities, modifiers, annotations and type descriptors.
//!
//! A [`Symbol`] is one entity in a source unit. Kind-specific payloads hang
//! off [`SymbolDetail`] so the common shape stays flat and cheap to move
//! through the binary cache.

pub mod factory;
pub mod table;

pub use factory::SymbolFactory;
pub use table::{Scope, SymbolTable, TypeReference};

use crate::types::{
    AccessKind, FileUri, Range, ScopeKind, SymbolId, SymbolKind, SymbolLocation, Visibility,
};
use bitflags::bitflags;
use std::collections::HashSet;
use std::sync::{LazyLock, OnceLock};

bitflags! {
    /// Non-visibility modifier flags. Bit positions are part of the binary
    /// format and must stay stable within a major version.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ModifierFlags: u16 {
        const STATIC      = 1 << 0;
        const FINAL       = 1 << 1;
        const ABSTRACT    = 1 << 2;
        const VIRTUAL     = 1 << 3;
        const OVERRIDE    = 1 << 4;
        const TRANSIENT   = 1 << 5;
        const TEST_METHOD = 1 << 6;
        const WEB_SERVICE = 1 << 7;
        const BUILT_IN    = 1 << 8;
    }
}

/// Visibility plus flags, resolved from the tokens preceding a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub flags: ModifierFlags,
}

impl Modifiers {
    pub fn new(visibility: Visibility, flags: ModifierFlags) -> Self {
        Self { visibility, flags }
    }

    pub fn with_visibility(visibility: Visibility) -> Self {
        Self {
            visibility,
            flags: ModifierFlags::empty(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(ModifierFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(ModifierFlags::ABSTRACT)
    }

    pub fn is_built_in(&self) -> bool {
        self.flags.contains(ModifierFlags::BUILT_IN)
    }
}

/// One `name=value` (or positional `value`) inside an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationParameter {
    pub name: Option<String>,
    pub value: String,
}

/// An annotation attached to a declaration, e.g. `@IsTest(SeeAllData=true)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub location: Range,
    pub parameters: Vec<AnnotationParameter>,
}

impl Annotation {
    pub fn new(name: impl Into<String>, location: Range) -> Self {
        Self {
            name: name.into(),
            location,
            parameters: Vec::new(),
        }
    }
}

/// Primitive type names, lowercase. `Id` and `String` are distinct types to
/// the method-resolution compatibility check even though values flow between
/// them.
static PRIMITIVE_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    HashSet::from([
        "blob", "boolean", "date", "datetime", "decimal", "double", "id", "integer", "long",
        "object", "string", "time", "void",
    ])
});

/// Built-in namespaces whose types ship in the stdlib snapshot.
static BUILT_IN_NAMESPACES: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| HashSet::from(["system", "schema", "database", "apexpages", "messaging"]));

const LIST_TYPES: [&str; 2] = ["list", "set"];
const MAP_TYPE: &str = "map";

/// Structured description of a type as written in source. Built from the raw
/// token at collection time and never aliased; resolution happens later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub original_type_string: String,
    pub is_array: bool,
    pub is_collection: bool,
    pub is_primitive: bool,
    pub is_built_in: bool,
    pub namespace: Option<String>,
    pub type_parameters: Vec<TypeInfo>,
    pub key_type: Option<Box<TypeInfo>>,
}

impl TypeInfo {
    /// Parse a raw type token: qualified names, `T[]` arrays, and the
    /// `List<T>` / `Set<T>` / `Map<K,V>` collection forms.
    pub fn parse(raw: &str) -> Self {
        let original = raw.trim().to_string();
        let mut body = original.as_str();

        let is_array = body.ends_with("[]");
        if is_array {
            body = body[..body.len() - 2].trim_end();
        }

        // Generic arguments, if any.
        let (head, args) = match body.find('<') {
            Some(open) if body.ends_with('>') => {
                let inner = &body[open + 1..body.len() - 1];
                (body[..open].trim(), split_type_arguments(inner))
            }
            _ => (body, Vec::new()),
        };

        let (namespace, simple) = match head.rsplit_once('.') {
            Some((ns, simple)) => (Some(ns.to_string()), simple),
            None => (None, head),
        };

        let lower = simple.to_ascii_lowercase();
        let is_collection = LIST_TYPES.contains(&lower.as_str()) || lower == MAP_TYPE;
        let is_primitive = !is_array && !is_collection && PRIMITIVE_TYPES.contains(lower.as_str());
        let ns_lower = namespace.as_deref().map(|n| n.to_ascii_lowercase());
        let is_built_in = is_primitive
            || is_collection
            || ns_lower
                .as_deref()
                .is_some_and(|n| BUILT_IN_NAMESPACES.contains(n));

        let mut type_parameters: Vec<TypeInfo> =
            args.iter().map(|a| TypeInfo::parse(a)).collect();
        let key_type = if lower == MAP_TYPE && type_parameters.len() == 2 {
            Some(Box::new(type_parameters.remove(0)))
        } else {
            None
        };

        Self {
            name: simple.to_string(),
            original_type_string: original,
            is_array,
            is_collection,
            is_primitive,
            is_built_in,
            namespace,
            type_parameters,
            key_type,
        }
    }

    pub fn void() -> Self {
        Self::parse("void")
    }

    pub fn is_void(&self) -> bool {
        self.name.eq_ignore_ascii_case("void")
    }

    /// Canonical lowercase form used for overload comparison.
    pub fn normalized(&self) -> String {
        self.original_type_string
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase()
    }
}

/// Split `K, List<V>` style argument lists at top-level commas only.
fn split_type_arguments(inner: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = inner[start..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

/// A declared method or constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub type_info: TypeInfo,
}

/// Kind-specific payload carried by a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolDetail {
    /// Classes, interfaces, triggers.
    Type {
        super_class: Option<TypeInfo>,
        interfaces: Vec<TypeInfo>,
    },
    Method {
        return_type: TypeInfo,
        parameters: Vec<ParameterInfo>,
        is_constructor: bool,
        has_body: bool,
    },
    /// Fields, properties, locals and parameters.
    Variable {
        value_type: TypeInfo,
        initial_value: Option<String>,
    },
    Enum { values: Vec<String> },
    Block { scope: ScopeKind },
}

/// One entity in a source unit.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub file_uri: FileUri,
    pub location: SymbolLocation,
    pub parent_id: Option<SymbolId>,
    pub namespace: Option<String>,
    pub modifiers: Modifiers,
    pub annotations: Vec<Annotation>,
    pub detail: Option<SymbolDetail>,
    fqn: OnceLock<Box<str>>,
}

impl Symbol {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        id: SymbolId,
        name: String,
        kind: SymbolKind,
        file_uri: FileUri,
        location: SymbolLocation,
        parent_id: Option<SymbolId>,
        namespace: Option<String>,
        modifiers: Modifiers,
        annotations: Vec<Annotation>,
        detail: Option<SymbolDetail>,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            file_uri,
            location,
            parent_id,
            namespace,
            modifiers,
            annotations,
            detail,
            fqn: OnceLock::new(),
        }
    }

    /// Fully-qualified name, computed lazily from the parent chain on first
    /// access (e.g. `Outer.Inner.method`, namespace-prefixed when set). Block
    /// scopes do not contribute segments.
    pub fn fqn(&self, table: &SymbolTable) -> &str {
        self.fqn.get_or_init(|| {
            let mut segments = vec![self.name.clone()];
            // The outermost type's namespace prefixes the whole chain.
            let mut namespace = self.namespace.clone();
            let mut cursor = self.parent_id.clone();
            while let Some(pid) = cursor {
                match table.get(&pid) {
                    Some(parent) => {
                        if !parent.kind.is_scope_only() {
                            segments.push(parent.name.clone());
                            if parent.namespace.is_some() {
                                namespace = parent.namespace.clone();
                            }
                        }
                        cursor = parent.parent_id.clone();
                    }
                    None => break,
                }
            }
            if let Some(ns) = namespace {
                segments.push(ns);
            }
            segments.reverse();
            segments.join(".").into_boxed_str()
        })
    }

    /// Pre-computed FQN injected by the binary cache so hydration skips the
    /// parent-chain walk.
    pub(crate) fn set_precomputed_fqn(&mut self, fqn: &str) {
        let _ = self.fqn.set(fqn.into());
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == SymbolKind::Constructor
    }

    pub fn method_detail(&self) -> Option<(&TypeInfo, &[ParameterInfo], bool, bool)> {
        match &self.detail {
            Some(SymbolDetail::Method {
                return_type,
                parameters,
                is_constructor,
                has_body,
            }) => Some((return_type, parameters, *is_constructor, *has_body)),
            _ => None,
        }
    }

    pub fn variable_type(&self) -> Option<&TypeInfo> {
        match &self.detail {
            Some(SymbolDetail::Variable { value_type, .. }) => Some(value_type),
            _ => None,
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_info_simple() {
        let t = TypeInfo::parse("Integer");
        assert_eq!(t.name, "Integer");
        assert!(t.is_primitive);
        assert!(t.is_built_in);
        assert!(!t.is_array);
        assert!(!t.is_collection);
        assert!(t.namespace.is_none());
    }

    #[test]
    fn test_type_info_qualified() {
        let t = TypeInfo::parse("System.String");
        assert_eq!(t.name, "String");
        assert_eq!(t.namespace.as_deref(), Some("System"));
        assert!(t.is_built_in);
    }

    #[test]
    fn test_type_info_array() {
        let t = TypeInfo::parse("Account[]");
        assert!(t.is_array);
        assert_eq!(t.name, "Account");
        assert_eq!(t.original_type_string, "Account[]");
        assert!(!t.is_primitive);
    }

    #[test]
    fn test_type_info_list() {
        let t = TypeInfo::parse("List<String>");
        assert!(t.is_collection);
        assert_eq!(t.type_parameters.len(), 1);
        assert_eq!(t.type_parameters[0].name, "String");
        assert!(t.key_type.is_none());
    }

    #[test]
    fn test_type_info_map_key_type() {
        let t = TypeInfo::parse("Map<Id, List<Account>>");
        assert!(t.is_collection);
        let key = t.key_type.as_deref().expect("map key");
        assert_eq!(key.name, "Id");
        assert_eq!(t.type_parameters.len(), 1);
        assert_eq!(t.type_parameters[0].name, "List");
        assert_eq!(t.type_parameters[0].type_parameters[0].name, "Account");
    }

    #[test]
    fn test_type_info_normalized() {
        assert_eq!(
            TypeInfo::parse("Map< Id , String >").normalized(),
            "map<id,string>"
        );
        assert_eq!(TypeInfo::parse("INTEGER").normalized(), "integer");
    }

    #[test]
    fn test_modifier_flags_bit_positions() {
        // Bit positions are format-stable; this pins them.
        assert_eq!(ModifierFlags::STATIC.bits(), 0x0001);
        assert_eq!(ModifierFlags::FINAL.bits(), 0x0002);
        assert_eq!(ModifierFlags::ABSTRACT.bits(), 0x0004);
        assert_eq!(ModifierFlags::VIRTUAL.bits(), 0x0008);
        assert_eq!(ModifierFlags::OVERRIDE.bits(), 0x0010);
        assert_eq!(ModifierFlags::TRANSIENT.bits(), 0x0020);
        assert_eq!(ModifierFlags::TEST_METHOD.bits(), 0x0040);
        assert_eq!(ModifierFlags::WEB_SERVICE.bits(), 0x0080);
        assert_eq!(ModifierFlags::BUILT_IN.bits(), 0x0100);
    }
}
