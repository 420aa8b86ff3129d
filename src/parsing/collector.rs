//! Symbol collector: parse tree in, symbol table and raw references out.
//!
//! A single-threaded walker with a scope stack. Each declaration resolves
//! its modifiers and annotations, validates its identifier, builds a symbol
//! with the current scope path folded into the id, and attaches its parent
//! from the stack. Expression nodes emit usage references with precise
//! identifier ranges; assignment left-hand sides suppress child listeners
//! and emit exactly one write (or readwrite) reference themselves.
//!
//! No collector error aborts the file: duplicates are skipped with a
//! diagnostic, invalid identifiers still produce symbols, and unknown node
//! kinds fall through a generic descent.

use crate::diagnostics::{DiagnosticBuffer, ErrorReporter};
use crate::parsing::compiler::{CompilationListener, ListenerResult, node_range};
use crate::parsing::declarations::{
    ClassModifierValidator, ConstructorModifierValidator, FieldModifierValidator,
    InterfaceBodyValidator, MethodModifierValidator,
};
use crate::parsing::identifiers::ValidationScope;
use crate::symbol::{
    Annotation, AnnotationParameter, ModifierFlags, Modifiers, ParameterInfo, SymbolDetail,
    SymbolFactory, SymbolTable, TypeInfo, TypeReference,
};
use crate::types::{
    AccessKind, FileUri, Range, ReferenceKind, ScopeKind, SymbolId, SymbolKind, SymbolLocation,
    Visibility,
};
use tree_sitter::Node;

// Node kind constants from the grammar.
const NODE_CLASS_DECLARATION: &str = "class_declaration";
const NODE_INTERFACE_DECLARATION: &str = "interface_declaration";
const NODE_ENUM_DECLARATION: &str = "enum_declaration";
const NODE_METHOD_DECLARATION: &str = "method_declaration";
const NODE_CONSTRUCTOR_DECLARATION: &str = "constructor_declaration";
const NODE_FIELD_DECLARATION: &str = "field_declaration";
const NODE_LOCAL_VARIABLE_DECLARATION: &str = "local_variable_declaration";
const NODE_VARIABLE_DECLARATOR: &str = "variable_declarator";
const NODE_FORMAL_PARAMETER: &str = "formal_parameter";
const NODE_MODIFIERS: &str = "modifiers";
const NODE_MARKER_ANNOTATION: &str = "marker_annotation";
const NODE_ANNOTATION: &str = "annotation";
const NODE_BLOCK: &str = "block";
const NODE_IDENTIFIER: &str = "identifier";
const NODE_METHOD_INVOCATION: &str = "method_invocation";
const NODE_FIELD_ACCESS: &str = "field_access";
const NODE_OBJECT_CREATION: &str = "object_creation_expression";
const NODE_ASSIGNMENT: &str = "assignment_expression";
const NODE_ENUM_CONSTANT: &str = "enum_constant";
const NODE_IMPORT_DECLARATION: &str = "import_declaration";

/// Recursion ceiling for pathological nesting; deeper subtrees are skipped.
const MAX_TREE_DEPTH: usize = 400;

/// Collects one file's symbols and references.
pub struct SymbolCollector {
    factory: SymbolFactory,
    table: SymbolTable,
    diagnostics: DiagnosticBuffer,
    validation: ValidationScope,
    /// Enclosing symbol ids, innermost last. Drives `parent_id`.
    parent_stack: Vec<SymbolId>,
    /// Simple name of the enclosing method, mixed into usage references.
    current_method: Option<String>,
}

impl SymbolCollector {
    pub fn new(file_uri: FileUri, namespace: Option<String>, validation: ValidationScope) -> Self {
        Self {
            factory: SymbolFactory::new(file_uri.clone(), namespace),
            table: SymbolTable::new(file_uri),
            diagnostics: DiagnosticBuffer::new(),
            validation,
            parent_stack: Vec::new(),
            current_method: None,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn text<'a>(&self, code: &'a str, node: Node<'_>) -> &'a str {
        &code[node.byte_range()]
    }

    fn parent_id(&self) -> Option<SymbolId> {
        self.parent_stack.last().cloned()
    }

    fn push_ref(&mut self, mut reference: TypeReference) {
        reference.parent_context_method = self.current_method.clone();
        self.table.add_reference(reference);
    }

    /// Whether `name` currently resolves to a value (variable, parameter or
    /// field) somewhere up the scope chain. Decides dotted-expression
    /// disambiguation: value receivers emit `VariableUsage`, everything else
    /// is read as a type name.
    fn is_value_in_scope(&self, name: &str) -> bool {
        self.table.find_in_scope_chain(name).is_some_and(|s| {
            matches!(
                s.kind,
                SymbolKind::Variable | SymbolKind::Parameter | SymbolKind::Field
            )
        })
    }

    fn declared_type_of(&self, name: &str) -> Option<String> {
        self.table
            .find_in_scope_chain(name)
            .and_then(|s| s.variable_type())
            .map(|t| t.original_type_string.clone())
    }

    // =========================================================================
    // Modifier / annotation scratch state
    // =========================================================================

    /// Resolve modifiers and annotations from the declaration's `modifiers`
    /// child. Fresh per declaration boundary; nothing carries over.
    fn collect_modifiers(&mut self, node: Node<'_>, code: &str) -> (Modifiers, Vec<Annotation>) {
        let mut modifiers = Modifiers::default();
        let mut annotations = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != NODE_MODIFIERS {
                continue;
            }
            let mut inner = child.walk();
            for token in child.children(&mut inner) {
                match token.kind() {
                    "public" => modifiers.visibility = Visibility::Public,
                    "private" => modifiers.visibility = Visibility::Private,
                    "protected" => modifiers.visibility = Visibility::Protected,
                    "static" => modifiers.flags |= ModifierFlags::STATIC,
                    "final" => modifiers.flags |= ModifierFlags::FINAL,
                    "abstract" => modifiers.flags |= ModifierFlags::ABSTRACT,
                    "transient" => modifiers.flags |= ModifierFlags::TRANSIENT,
                    NODE_MARKER_ANNOTATION | NODE_ANNOTATION => {
                        annotations.push(self.parse_annotation(token, code));
                    }
                    _ => {}
                }
            }
            break;
        }

        if annotations
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case("IsTest"))
        {
            modifiers.flags |= ModifierFlags::TEST_METHOD;
        }

        (modifiers, annotations)
    }

    fn parse_annotation(&self, node: Node<'_>, code: &str) -> Annotation {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(code, n))
            .unwrap_or_default();
        let mut annotation = Annotation::new(name, node_range(node));

        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                if arg.kind() == "element_value_pair" {
                    let key = arg
                        .child_by_field_name("key")
                        .map(|k| self.text(code, k).to_string());
                    let value = arg
                        .child_by_field_name("value")
                        .map(|v| self.text(code, v).to_string())
                        .unwrap_or_default();
                    annotation
                        .parameters
                        .push(AnnotationParameter { name: key, value });
                } else {
                    annotation.parameters.push(AnnotationParameter {
                        name: None,
                        value: self.text(code, arg).to_string(),
                    });
                }
            }
        }
        annotation
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn walk_program(&mut self, root: Node<'_>, code: &str) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                NODE_CLASS_DECLARATION | NODE_INTERFACE_DECLARATION | NODE_ENUM_DECLARATION => {
                    self.handle_type_declaration(child, code, 0);
                }
                NODE_IMPORT_DECLARATION => self.handle_import(child, code),
                "line_comment" | "block_comment" | "ERROR" => {}
                _ => self.handle_statement(child, code, 0),
            }
        }
    }

    fn handle_import(&mut self, node: Node<'_>, code: &str) {
        if let Some(path) = node.named_child(0) {
            let reference = TypeReference::new(
                self.text(code, path),
                ReferenceKind::ImportReference,
                node_range(path),
            );
            self.push_ref(reference);
        }
    }

    fn handle_type_declaration(&mut self, node: Node<'_>, code: &str, depth: usize) {
        if depth > MAX_TREE_DEPTH {
            return;
        }
        let (kind, scope_kind) = match node.kind() {
            NODE_INTERFACE_DECLARATION => (SymbolKind::Interface, ScopeKind::Interface),
            NODE_ENUM_DECLARATION => (SymbolKind::Enum, ScopeKind::Enum),
            _ => (SymbolKind::Class, ScopeKind::Class),
        };

        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(code, name_node).to_string();
        let name_range = node_range(name_node);
        let (modifiers, annotations) = self.collect_modifiers(node, code);

        self.validation
            .validate_identifier(&name, name_range, &mut self.diagnostics);
        if kind == SymbolKind::Class {
            ClassModifierValidator::check(modifiers, &name, name_range, &mut self.diagnostics);
        }

        // Same-scope duplicate: the existing declaration wins.
        if self.table.find_in_current_scope(&name).is_some() {
            self.diagnostics.report_error(
                "DUPLICATE_DECLARATION",
                format!("Duplicate declaration of '{name}'"),
                name_range,
            );
            return;
        }

        // Declaration-time references: extends and implements clauses.
        let mut super_class = None;
        let mut interfaces = Vec::new();
        if let Some(superclass) = node.child_by_field_name("superclass") {
            let mut cursor = superclass.walk();
            for ty in superclass.named_children(&mut cursor) {
                let text = self.text(code, ty);
                super_class = Some(TypeInfo::parse(text));
                let reference =
                    TypeReference::new(text, ReferenceKind::ClassReference, node_range(ty));
                self.push_ref(reference);
            }
        }
        if let Some(ifaces) = node
            .child_by_field_name("interfaces")
            .or_else(|| find_child_of_kind(node, "extends_interfaces"))
        {
            collect_type_nodes(ifaces, &mut |ty| {
                let text = &code[ty.byte_range()];
                interfaces.push(TypeInfo::parse(text));
                let reference =
                    TypeReference::new(text, ReferenceKind::ClassReference, node_range(ty));
                self.push_ref(reference);
            });
        }

        let detail = if kind == SymbolKind::Enum {
            Some(SymbolDetail::Enum { values: Vec::new() })
        } else {
            Some(SymbolDetail::Type {
                super_class,
                interfaces,
            })
        };

        let symbol = self.factory.full(
            kind,
            &name,
            SymbolLocation::new(node_range(node), name_range),
            &self.table.scope_path(),
            self.parent_id(),
            modifiers,
            annotations,
            detail,
        );
        let symbol_id = symbol.id.clone();
        if let Err(e) = self.table.add_symbol(symbol) {
            tracing::warn!("rejected type symbol '{name}': {e:?}");
            return;
        }

        self.table.push_scope(&name, scope_kind);
        self.parent_stack.push(symbol_id.clone());

        if let Some(body) = node.child_by_field_name("body") {
            match scope_kind {
                ScopeKind::Enum => self.handle_enum_body(body, code, &symbol_id, depth),
                ScopeKind::Interface => self.handle_interface_body(body, code, depth),
                _ => self.handle_class_body(body, code, depth),
            }
        }

        self.parent_stack.pop();
        self.table.pop_scope();
    }

    fn handle_class_body(&mut self, body: Node<'_>, code: &str, depth: usize) {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                NODE_CLASS_DECLARATION | NODE_INTERFACE_DECLARATION | NODE_ENUM_DECLARATION => {
                    self.handle_type_declaration(member, code, depth + 1);
                }
                NODE_METHOD_DECLARATION => self.handle_method(member, code, false, depth + 1),
                NODE_CONSTRUCTOR_DECLARATION => self.handle_method(member, code, true, depth + 1),
                NODE_FIELD_DECLARATION => self.handle_field(member, code, false),
                NODE_BLOCK => self.handle_block(member, code, depth + 1),
                "static_initializer" => {
                    if let Some(block) = find_child_of_kind(member, NODE_BLOCK) {
                        self.handle_block(block, code, depth + 1);
                    }
                }
                _ => {}
            }
        }
    }

    fn handle_interface_body(&mut self, body: Node<'_>, code: &str, depth: usize) {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                NODE_METHOD_DECLARATION => self.handle_method(member, code, false, depth + 1),
                // The grammar labels interface fields as constants; both are
                // misplaced here either way.
                NODE_FIELD_DECLARATION | "constant_declaration" => {
                    self.handle_field(member, code, true)
                }
                NODE_CLASS_DECLARATION | NODE_INTERFACE_DECLARATION | NODE_ENUM_DECLARATION => {
                    self.handle_type_declaration(member, code, depth + 1);
                }
                _ => {}
            }
        }
    }

    fn handle_enum_body(&mut self, body: Node<'_>, code: &str, enum_id: &SymbolId, depth: usize) {
        let mut values = Vec::new();
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                NODE_ENUM_CONSTANT => {
                    let Some(name_node) = member.child_by_field_name("name") else {
                        continue;
                    };
                    let name = self.text(code, name_node).to_string();
                    let name_range = node_range(name_node);
                    if self.table.find_in_current_scope(&name).is_some() {
                        self.diagnostics.report_error(
                            "DUPLICATE_DECLARATION",
                            format!("Duplicate enum value '{name}'"),
                            name_range,
                        );
                        continue;
                    }
                    // Enum constants are default-visible, inner enums included.
                    let symbol = self.factory.full(
                        SymbolKind::EnumValue,
                        &name,
                        SymbolLocation::new(node_range(member), name_range),
                        &self.table.scope_path(),
                        Some(enum_id.clone()),
                        Modifiers::default(),
                        Vec::new(),
                        None,
                    );
                    if self.table.add_symbol(symbol).is_ok() {
                        values.push(name);
                    }
                }
                "enum_body_declarations" => self.handle_class_body(member, code, depth),
                _ => {}
            }
        }
        if let Some(sym) = self.table.get_mut(enum_id) {
            sym.detail = Some(SymbolDetail::Enum { values });
        }
    }

    fn handle_method(&mut self, node: Node<'_>, code: &str, is_constructor: bool, depth: usize) {
        if depth > MAX_TREE_DEPTH {
            return;
        }
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(code, name_node).to_string();
        let name_range = node_range(name_node);
        let (modifiers, annotations) = self.collect_modifiers(node, code);
        let in_interface = self.table.current_scope().kind == ScopeKind::Interface;

        self.validation
            .validate_identifier(&name, name_range, &mut self.diagnostics);

        let body = node.child_by_field_name("body");
        let has_body = body.is_some();

        // Return type: constructors have none, methods emit a reference.
        let return_type = if is_constructor {
            TypeInfo::void()
        } else {
            match node.child_by_field_name("type") {
                Some(ty) => {
                    let text = self.text(code, ty);
                    let info = TypeInfo::parse(text);
                    if !info.is_void() {
                        let reference = TypeReference::new(
                            text,
                            ReferenceKind::TypeDeclaration,
                            node_range(ty),
                        );
                        self.push_ref(reference);
                    }
                    info
                }
                None => TypeInfo::void(),
            }
        };

        // Parameter list, needed up front for overload comparison.
        let mut parameters = Vec::new();
        let mut parameter_nodes = Vec::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                if param.kind() != NODE_FORMAL_PARAMETER {
                    continue;
                }
                let (Some(ty), Some(pname)) = (
                    param.child_by_field_name("type"),
                    param.child_by_field_name("name"),
                ) else {
                    continue;
                };
                parameters.push(ParameterInfo {
                    name: self.text(code, pname).to_string(),
                    type_info: TypeInfo::parse(self.text(code, ty)),
                });
                parameter_nodes.push((ty, pname));
            }
        }

        // Overloads compare by normalized parameter-type strings.
        let signature: Vec<String> = parameters.iter().map(|p| p.type_info.normalized()).collect();
        let duplicate = self
            .parent_id()
            .map(|pid| self.table.methods_of(&pid))
            .unwrap_or_default()
            .iter()
            .any(|m| {
                m.name.eq_ignore_ascii_case(&name)
                    && m.method_detail().is_some_and(|(_, params, _, _)| {
                        params
                            .iter()
                            .map(|p| p.type_info.normalized())
                            .collect::<Vec<_>>()
                            == signature
                    })
            });
        if duplicate {
            self.diagnostics.report_error(
                "DUPLICATE_DECLARATION",
                format!("Duplicate method '{name}' with the same parameter types"),
                name_range,
            );
            return;
        }

        if is_constructor {
            ConstructorModifierValidator::check(modifiers, &name, name_range, &mut self.diagnostics);
        } else if in_interface {
            InterfaceBodyValidator::check_method(modifiers, &name, name_range, &mut self.diagnostics);
        } else {
            MethodModifierValidator::check(
                modifiers,
                &name,
                has_body,
                name_range,
                &mut self.diagnostics,
            );
        }

        let kind = if is_constructor {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        };
        let symbol = self.factory.full(
            kind,
            &name,
            SymbolLocation::new(node_range(node), name_range),
            &self.table.scope_path(),
            self.parent_id(),
            modifiers,
            annotations,
            Some(SymbolDetail::Method {
                return_type,
                parameters: parameters.clone(),
                is_constructor,
                has_body,
            }),
        );
        let method_id = symbol.id.clone();
        if let Err(e) = self.table.add_symbol(symbol) {
            tracing::warn!("rejected method symbol '{name}': {e:?}");
            return;
        }

        self.table.push_scope(&name, ScopeKind::Method);
        self.parent_stack.push(method_id);
        let saved_method = self.current_method.replace(name);

        // Parameter symbols live in the method scope.
        for (ty, pname) in parameter_nodes {
            let pname_text = self.text(code, pname).to_string();
            let pname_range = node_range(pname);
            self.validation
                .validate_identifier(&pname_text, pname_range, &mut self.diagnostics);
            if self.table.find_in_current_scope(&pname_text).is_some() {
                self.diagnostics.report_error(
                    "DUPLICATE_DECLARATION",
                    format!("Duplicate parameter '{pname_text}'"),
                    pname_range,
                );
                continue;
            }
            let type_text = self.text(code, ty);
            let reference =
                TypeReference::new(type_text, ReferenceKind::ParameterType, node_range(ty));
            self.push_ref(reference);
            let param = self.factory.full(
                SymbolKind::Parameter,
                &pname_text,
                SymbolLocation::at(pname_range),
                &self.table.scope_path(),
                self.parent_id(),
                Modifiers::default(),
                Vec::new(),
                Some(SymbolDetail::Variable {
                    value_type: TypeInfo::parse(type_text),
                    initial_value: None,
                }),
            );
            if let Err(e) = self.table.add_symbol(param) {
                tracing::warn!("rejected parameter symbol '{pname_text}': {e:?}");
            }
        }

        // Statements in the body share the method scope; nested braces open
        // fresh block scopes.
        if let Some(body) = body {
            self.handle_statements_of(body, code, depth + 1);
        }

        self.current_method = saved_method;
        self.parent_stack.pop();
        self.table.pop_scope();
    }

    fn handle_field(&mut self, node: Node<'_>, code: &str, in_interface: bool) {
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        let type_text = self.text(code, ty).to_string();
        let type_info = TypeInfo::parse(&type_text);
        let (modifiers, annotations) = self.collect_modifiers(node, code);

        let reference =
            TypeReference::new(&type_text, ReferenceKind::TypeDeclaration, node_range(ty));
        self.push_ref(reference);

        let mut statement_names: Vec<String> = Vec::new();
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != NODE_VARIABLE_DECLARATOR {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(code, name_node).to_string();
            let name_range = node_range(name_node);

            if in_interface {
                InterfaceBodyValidator::check_field(&name, name_range, &mut self.diagnostics);
            }
            FieldModifierValidator::check(modifiers, &name, name_range, &mut self.diagnostics);
            self.validation
                .validate_identifier(&name, name_range, &mut self.diagnostics);

            let value = declarator.child_by_field_name("value");
            if let Some(value) = value {
                self.walk_expression(value, code, 0);
            }

            // Duplicate inside this statement, then against the scope.
            if statement_names.iter().any(|n| n.eq_ignore_ascii_case(&name))
                || self.table.find_in_current_scope(&name).is_some()
            {
                self.diagnostics.report_error(
                    "DUPLICATE_DECLARATION",
                    format!("Duplicate field '{name}'"),
                    name_range,
                );
                continue;
            }
            statement_names.push(name.clone());

            let symbol = self.factory.full(
                SymbolKind::Field,
                &name,
                SymbolLocation::new(node_range(declarator), name_range),
                &self.table.scope_path(),
                self.parent_id(),
                modifiers,
                annotations.clone(),
                Some(SymbolDetail::Variable {
                    value_type: type_info.clone(),
                    initial_value: value.map(|v| self.text(code, v).to_string()),
                }),
            );
            if let Err(e) = self.table.add_symbol(symbol) {
                tracing::warn!("rejected field symbol '{name}': {e:?}");
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Walk the statements of a braced node without opening a scope of its
    /// own (method bodies, loop bodies already scoped by their construct).
    fn handle_statements_of(&mut self, node: Node<'_>, code: &str, depth: usize) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.handle_statement(child, code, depth);
        }
    }

    fn handle_statement(&mut self, node: Node<'_>, code: &str, depth: usize) {
        if depth > MAX_TREE_DEPTH {
            tracing::warn!("statement nesting exceeds {MAX_TREE_DEPTH}; skipping subtree");
            return;
        }
        match node.kind() {
            NODE_LOCAL_VARIABLE_DECLARATION => self.handle_local_declaration(node, code, depth),
            "expression_statement" => {
                if let Some(expr) = node.named_child(0) {
                    self.walk_expression(expr, code, depth);
                }
            }
            NODE_BLOCK => self.handle_block(node, code, depth),
            "if_statement" => {
                if let Some(cond) = node.child_by_field_name("condition") {
                    self.walk_expression(cond, code, depth);
                }
                if let Some(consequence) = node.child_by_field_name("consequence") {
                    self.handle_statement(consequence, code, depth + 1);
                }
                if let Some(alternative) = node.child_by_field_name("alternative") {
                    self.handle_statement(alternative, code, depth + 1);
                }
            }
            "while_statement" => {
                if let Some(cond) = node.child_by_field_name("condition") {
                    self.walk_expression(cond, code, depth);
                }
                if let Some(body) = node.child_by_field_name("body") {
                    self.handle_statement(body, code, depth + 1);
                }
            }
            "do_statement" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.handle_statement(body, code, depth + 1);
                }
                if let Some(cond) = node.child_by_field_name("condition") {
                    self.walk_expression(cond, code, depth);
                }
            }
            "for_statement" => self.handle_for(node, code, depth),
            "enhanced_for_statement" => self.handle_enhanced_for(node, code, depth),
            "return_statement" | "throw_statement" => {
                if let Some(expr) = node.named_child(0) {
                    self.walk_expression(expr, code, depth);
                }
            }
            "try_statement" => self.handle_try(node, code, depth),
            "line_comment" | "block_comment" | ";" => {}
            _ => {
                // Unknown statement kinds: descend, treating children as
                // statements. Keeps recovery local.
                self.handle_statements_of(node, code, depth + 1);
            }
        }
    }

    /// Open a fresh block scope backed by a Block symbol, run `fill`, then
    /// unwind. Block symbols are scope containers only.
    fn with_block_scope(
        &mut self,
        range: Range,
        fill: impl FnOnce(&mut Self),
    ) {
        let block_name = self.table.next_block_name();
        let symbol = self.factory.full(
            SymbolKind::Block,
            &block_name,
            SymbolLocation::at(range),
            &self.table.scope_path(),
            self.parent_id(),
            Modifiers::default(),
            Vec::new(),
            Some(SymbolDetail::Block {
                scope: ScopeKind::Block,
            }),
        );
        let block_id = symbol.id.clone();
        if let Err(e) = self.table.add_symbol(symbol) {
            tracing::warn!("rejected block symbol: {e:?}");
            fill(self);
            return;
        }
        self.table.push_scope(&block_name, ScopeKind::Block);
        self.parent_stack.push(block_id);
        fill(self);
        self.parent_stack.pop();
        self.table.pop_scope();
    }

    fn handle_block(&mut self, node: Node<'_>, code: &str, depth: usize) {
        self.with_block_scope(node_range(node), |this| {
            this.handle_statements_of(node, code, depth + 1);
        });
    }

    /// `for (T v = e; c; u) body` — the induction variable is created exactly
    /// once, inside the loop's block scope; the body shares that scope.
    fn handle_for(&mut self, node: Node<'_>, code: &str, depth: usize) {
        self.with_block_scope(node_range(node), |this| {
            if let Some(init) = node.child_by_field_name("init") {
                if init.kind() == NODE_LOCAL_VARIABLE_DECLARATION {
                    this.handle_local_declaration(init, code, depth);
                } else {
                    this.walk_expression(init, code, depth);
                }
            }
            if let Some(cond) = node.child_by_field_name("condition") {
                this.walk_expression(cond, code, depth);
            }
            if let Some(update) = node.child_by_field_name("update") {
                this.walk_expression(update, code, depth);
            }
            if let Some(body) = node.child_by_field_name("body") {
                if body.kind() == NODE_BLOCK {
                    this.handle_statements_of(body, code, depth + 1);
                } else {
                    this.handle_statement(body, code, depth + 1);
                }
            }
        });
    }

    /// `for (T v : e) body` — same single-creation rule as the classic form.
    fn handle_enhanced_for(&mut self, node: Node<'_>, code: &str, depth: usize) {
        self.with_block_scope(node_range(node), |this| {
            if let Some(value) = node.child_by_field_name("value") {
                this.walk_expression(value, code, depth);
            }
            if let (Some(ty), Some(name_node)) = (
                node.child_by_field_name("type"),
                node.child_by_field_name("name"),
            ) {
                let type_text = this.text(code, ty).to_string();
                let reference = TypeReference::new(
                    &type_text,
                    ReferenceKind::TypeDeclaration,
                    node_range(ty),
                );
                this.push_ref(reference);
                let name = this.text(code, name_node).to_string();
                let name_range = node_range(name_node);
                this.validation
                    .validate_identifier(&name, name_range, &mut this.diagnostics);
                let symbol = this.factory.full(
                    SymbolKind::Variable,
                    &name,
                    SymbolLocation::at(name_range),
                    &this.table.scope_path(),
                    this.parent_id(),
                    Modifiers::default(),
                    Vec::new(),
                    Some(SymbolDetail::Variable {
                        value_type: TypeInfo::parse(&type_text),
                        initial_value: None,
                    }),
                );
                if let Err(e) = this.table.add_symbol(symbol) {
                    tracing::warn!("rejected loop variable '{name}': {e:?}");
                }
            }
            if let Some(body) = node.child_by_field_name("body") {
                if body.kind() == NODE_BLOCK {
                    this.handle_statements_of(body, code, depth + 1);
                } else {
                    this.handle_statement(body, code, depth + 1);
                }
            }
        });
    }

    fn handle_try(&mut self, node: Node<'_>, code: &str, depth: usize) {
        if let Some(body) = node.child_by_field_name("body") {
            self.handle_block(body, code, depth);
        }
        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            match clause.kind() {
                "catch_clause" => {
                    self.with_block_scope(node_range(clause), |this| {
                        if let Some(param) = find_child_of_kind(clause, "catch_formal_parameter") {
                            this.handle_catch_parameter(param, code);
                        }
                        if let Some(body) = clause.child_by_field_name("body") {
                            this.handle_statements_of(body, code, depth + 1);
                        }
                    });
                }
                "finally_clause" => {
                    if let Some(block) = find_child_of_kind(clause, NODE_BLOCK) {
                        self.handle_block(block, code, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn handle_catch_parameter(&mut self, param: Node<'_>, code: &str) {
        let Some(name_node) = param.child_by_field_name("name") else {
            return;
        };
        let type_text = find_child_of_kind(param, "catch_type")
            .map(|t| self.text(code, t).to_string())
            .unwrap_or_else(|| "Exception".to_string());
        if let Some(ty) = find_child_of_kind(param, "catch_type") {
            let reference =
                TypeReference::new(&type_text, ReferenceKind::ParameterType, node_range(ty));
            self.push_ref(reference);
        }
        let name = self.text(code, name_node).to_string();
        let symbol = self.factory.full(
            SymbolKind::Parameter,
            &name,
            SymbolLocation::at(node_range(name_node)),
            &self.table.scope_path(),
            self.parent_id(),
            Modifiers::default(),
            Vec::new(),
            Some(SymbolDetail::Variable {
                value_type: TypeInfo::parse(&type_text),
                initial_value: None,
            }),
        );
        if let Err(e) = self.table.add_symbol(symbol) {
            tracing::warn!("rejected catch parameter '{name}': {e:?}");
        }
    }

    /// `T a = 1, b = 2;` — one reference for the type, one symbol per
    /// declarator. Duplicates inside the statement error and skip; across
    /// statements the existing symbol wins and the new one is skipped.
    fn handle_local_declaration(&mut self, node: Node<'_>, code: &str, depth: usize) {
        let Some(ty) = node.child_by_field_name("type") else {
            return;
        };
        let type_text = self.text(code, ty).to_string();
        let type_info = TypeInfo::parse(&type_text);
        let reference =
            TypeReference::new(&type_text, ReferenceKind::TypeDeclaration, node_range(ty));
        self.push_ref(reference);

        let mut statement_names: Vec<String> = Vec::new();
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != NODE_VARIABLE_DECLARATOR {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(code, name_node).to_string();
            let name_range = node_range(name_node);
            self.validation
                .validate_identifier(&name, name_range, &mut self.diagnostics);

            let value = declarator.child_by_field_name("value");
            if let Some(value) = value {
                self.walk_expression(value, code, depth);
                // A call used as initializer is expected to produce the
                // declared type.
                if value.kind() == NODE_METHOD_INVOCATION {
                    self.annotate_last_call_expectation(&type_text);
                }
            }

            if statement_names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                self.diagnostics.report_error(
                    "DUPLICATE_DECLARATION",
                    format!("Duplicate variable '{name}' in declaration"),
                    name_range,
                );
                continue;
            }
            if self.table.find_in_current_scope(&name).is_some() {
                self.diagnostics.report_error(
                    "DUPLICATE_DECLARATION",
                    format!("Duplicate variable '{name}'"),
                    name_range,
                );
                continue;
            }
            statement_names.push(name.clone());

            let symbol = self.factory.full(
                SymbolKind::Variable,
                &name,
                SymbolLocation::new(node_range(declarator), name_range),
                &self.table.scope_path(),
                self.parent_id(),
                Modifiers::default(),
                Vec::new(),
                Some(SymbolDetail::Variable {
                    value_type: type_info.clone(),
                    initial_value: value.map(|v| self.text(code, v).to_string()),
                }),
            );
            if let Err(e) = self.table.add_symbol(symbol) {
                tracing::warn!("rejected variable symbol '{name}': {e:?}");
            }
        }
    }

    fn annotate_last_call_expectation(&mut self, expected: &str) {
        // The outermost call's reference is emitted last by construction.
        if let Some(call) = self
            .table
            .references_mut()
            .iter_mut()
            .rev()
            .find(|r| r.kind == ReferenceKind::MethodCall)
        {
            call.expected_return_type = Some(expected.to_string());
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn walk_expression(&mut self, node: Node<'_>, code: &str, depth: usize) {
        if depth > MAX_TREE_DEPTH {
            return;
        }
        match node.kind() {
            NODE_IDENTIFIER => {
                let reference = TypeReference::new(
                    self.text(code, node),
                    ReferenceKind::VariableUsage,
                    node_range(node),
                )
                .with_access(AccessKind::Read);
                self.push_ref(reference);
            }
            NODE_METHOD_INVOCATION => self.handle_method_invocation(node, code, depth),
            NODE_FIELD_ACCESS => self.handle_field_access(node, code, depth),
            NODE_OBJECT_CREATION => {
                if let Some(ty) = node.child_by_field_name("type") {
                    let reference = TypeReference::new(
                        self.text(code, ty),
                        ReferenceKind::ConstructorCall,
                        node_range(ty),
                    );
                    self.push_ref(reference);
                }
                if let Some(args) = node.child_by_field_name("arguments") {
                    self.walk_expression_children(args, code, depth);
                }
            }
            NODE_ASSIGNMENT => self.handle_assignment(node, code, depth),
            "binary_expression" => {
                for field in ["left", "right"] {
                    if let Some(operand) = node.child_by_field_name(field) {
                        self.emit_operand_usage(operand, code);
                    }
                }
            }
            "ternary_expression" => {
                for field in ["condition", "consequence", "alternative"] {
                    if let Some(operand) = node.child_by_field_name(field) {
                        self.emit_operand_usage(operand, code);
                    }
                }
            }
            "unary_expression" => {
                if let Some(operand) = node.child_by_field_name("operand") {
                    self.emit_operand_usage(operand, code);
                }
            }
            "update_expression" => {
                // i++ both reads and writes its operand.
                if let Some(operand) = node.named_child(0) {
                    if operand.kind() == NODE_IDENTIFIER {
                        let reference = TypeReference::new(
                            self.text(code, operand),
                            ReferenceKind::VariableUsage,
                            node_range(operand),
                        )
                        .with_access(AccessKind::ReadWrite);
                        self.push_ref(reference);
                    } else {
                        self.walk_expression(operand, code, depth + 1);
                    }
                }
            }
            "parenthesized_expression" => {
                if let Some(inner) = node.named_child(0) {
                    self.walk_expression(inner, code, depth + 1);
                }
            }
            "cast_expression" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    let reference = TypeReference::new(
                        self.text(code, ty),
                        ReferenceKind::ClassReference,
                        node_range(ty),
                    );
                    self.push_ref(reference);
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.walk_expression(value, code, depth + 1);
                }
            }
            "instanceof_expression" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.walk_expression(left, code, depth + 1);
                }
                if let Some(right) = node.child_by_field_name("right") {
                    let reference = TypeReference::new(
                        self.text(code, right),
                        ReferenceKind::ClassReference,
                        node_range(right),
                    );
                    self.push_ref(reference);
                }
            }
            "array_access" => {
                for field in ["array", "index"] {
                    if let Some(part) = node.child_by_field_name(field) {
                        self.walk_expression(part, code, depth + 1);
                    }
                }
            }
            "array_creation_expression" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    let reference = TypeReference::new(
                        self.text(code, ty),
                        ReferenceKind::ClassReference,
                        node_range(ty),
                    );
                    self.push_ref(reference);
                }
                self.walk_expression_children(node, code, depth);
            }
            "array_initializer" | "argument_list" => {
                self.walk_expression_children(node, code, depth);
            }
            "this" | "super" => {}
            // Literals carry no references.
            "string_literal"
            | "decimal_integer_literal"
            | "hex_integer_literal"
            | "decimal_floating_point_literal"
            | "true"
            | "false"
            | "null_literal"
            | "character_literal" => {}
            _ => self.walk_expression_children(node, code, depth),
        }
    }

    fn walk_expression_children(&mut self, node: Node<'_>, code: &str, depth: usize) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.walk_expression(child, code, depth + 1);
        }
    }

    /// Operands of arithmetic/comparison/logical/ternary chains are named
    /// flatly: identifiers as themselves, any compound operand by its raw
    /// source text. Literals name nothing. The walker never descends into a
    /// compound operand here.
    fn emit_operand_usage(&mut self, operand: Node<'_>, code: &str) {
        match operand.kind() {
            "string_literal"
            | "decimal_integer_literal"
            | "hex_integer_literal"
            | "decimal_floating_point_literal"
            | "true"
            | "false"
            | "null_literal"
            | "character_literal"
            | "this"
            | "super" => {}
            _ => {
                let reference = TypeReference::new(
                    self.text(code, operand).trim(),
                    ReferenceKind::VariableUsage,
                    node_range(operand),
                )
                .with_access(AccessKind::Read);
                self.push_ref(reference);
            }
        }
    }

    /// Calls. Unqualified calls carry no qualifier; dotted calls first settle
    /// whether the receiver is a value or a type name. The call reference is
    /// emitted after its arguments so initializer expectations can find it.
    fn handle_method_invocation(&mut self, node: Node<'_>, code: &str, depth: usize) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let method_name = self.text(code, name_node).to_string();
        let mut qualifier = None;

        if let Some(object) = node.child_by_field_name("object") {
            match object.kind() {
                NODE_IDENTIFIER => {
                    let receiver = self.text(code, object).to_string();
                    let kind = if self.is_value_in_scope(&receiver) {
                        ReferenceKind::VariableUsage
                    } else {
                        ReferenceKind::ClassReference
                    };
                    let mut reference =
                        TypeReference::new(&receiver, kind, node_range(object));
                    if kind == ReferenceKind::VariableUsage {
                        reference = reference.with_access(AccessKind::Read);
                    }
                    self.push_ref(reference);
                    qualifier = Some(receiver);
                }
                NODE_OBJECT_CREATION => {
                    // `new T().m()` — the constructor call is the receiver.
                    self.walk_expression(object, code, depth + 1);
                    qualifier = object
                        .child_by_field_name("type")
                        .map(|t| self.text(code, t).to_string());
                }
                _ => {
                    self.walk_expression(object, code, depth + 1);
                    qualifier = Some(self.text(code, object).trim().to_string());
                }
            }
        }

        let mut hints = Vec::new();
        if let Some(args) = node.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                hints.push(self.infer_argument_type(arg, code));
            }
            self.walk_expression_children(args, code, depth);
        }

        let mut reference = TypeReference::new(
            &method_name,
            ReferenceKind::MethodCall,
            node_range(name_node),
        );
        reference.qualifier = qualifier;
        reference.argument_type_hints = Some(hints);
        self.push_ref(reference);
    }

    fn infer_argument_type(&self, node: Node<'_>, code: &str) -> Option<String> {
        match node.kind() {
            "string_literal" => Some("String".to_string()),
            "decimal_integer_literal" => {
                let text = self.text(code, node);
                if text.ends_with('l') || text.ends_with('L') {
                    Some("Long".to_string())
                } else {
                    Some("Integer".to_string())
                }
            }
            "hex_integer_literal" => Some("Integer".to_string()),
            "decimal_floating_point_literal" => Some("Decimal".to_string()),
            "true" | "false" => Some("Boolean".to_string()),
            // Null is compatible with every parameter type.
            "null_literal" => None,
            NODE_IDENTIFIER => self.declared_type_of(self.text(code, node)),
            NODE_OBJECT_CREATION => node
                .child_by_field_name("type")
                .map(|t| self.text(code, t).to_string()),
            "cast_expression" => node
                .child_by_field_name("type")
                .map(|t| self.text(code, t).to_string()),
            _ => None,
        }
    }

    /// `obj.field` reads: one usage for the receiver, one field access with
    /// the receiver as qualifier.
    fn handle_field_access(&mut self, node: Node<'_>, code: &str, depth: usize) {
        let (Some(object), Some(field)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("field"),
        ) else {
            return;
        };
        let qualifier = self.text(code, object).to_string();
        match object.kind() {
            NODE_IDENTIFIER => {
                let reference = TypeReference::new(
                    &qualifier,
                    ReferenceKind::VariableUsage,
                    node_range(object),
                )
                .with_access(AccessKind::Read);
                self.push_ref(reference);
            }
            "this" | "super" => {}
            _ => self.walk_expression(object, code, depth + 1),
        }
        let reference = TypeReference::new(
            self.text(code, field),
            ReferenceKind::FieldAccess,
            node_range(field),
        )
        .with_qualifier(qualifier)
        .with_access(AccessKind::Read);
        self.push_ref(reference);
    }

    /// Assignments: the left-hand side emits exactly one reference itself
    /// (write, or readwrite for compound operators); its children stay
    /// silent. The right-hand side is walked normally.
    fn handle_assignment(&mut self, node: Node<'_>, code: &str, depth: usize) {
        let access = match node.child_by_field_name("operator") {
            Some(op) if self.text(code, op) == "=" => AccessKind::Write,
            Some(_) => AccessKind::ReadWrite,
            None => AccessKind::Write,
        };

        if let Some(left) = node.child_by_field_name("left") {
            match left.kind() {
                NODE_IDENTIFIER => {
                    let reference = TypeReference::new(
                        self.text(code, left),
                        ReferenceKind::VariableUsage,
                        node_range(left),
                    )
                    .with_access(access);
                    self.push_ref(reference);
                }
                NODE_FIELD_ACCESS => {
                    if let (Some(object), Some(field)) = (
                        left.child_by_field_name("object"),
                        left.child_by_field_name("field"),
                    ) {
                        let reference = TypeReference::new(
                            self.text(code, field),
                            ReferenceKind::FieldAccess,
                            node_range(field),
                        )
                        .with_qualifier(self.text(code, object).to_string())
                        .with_access(access);
                        self.push_ref(reference);
                    }
                }
                "array_access" => {
                    if let Some(array) = left.child_by_field_name("array") {
                        if array.kind() == NODE_IDENTIFIER {
                            let reference = TypeReference::new(
                                self.text(code, array),
                                ReferenceKind::VariableUsage,
                                node_range(array),
                            )
                            .with_access(access);
                            self.push_ref(reference);
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some(right) = node.child_by_field_name("right") {
            self.walk_expression(right, code, depth + 1);
        }
    }
}

impl CompilationListener for SymbolCollector {
    type Output = SymbolTable;

    fn process(&mut self, root: Node<'_>, source: &str) {
        self.walk_program(root, source);
    }

    fn finish(self) -> ListenerResult<SymbolTable> {
        ListenerResult {
            output: self.table,
            errors: self.diagnostics.errors,
            warnings: self.diagnostics.warnings,
        }
    }
}

fn find_child_of_kind<'tree>(node: Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

/// Depth-first search for type nodes inside extends/implements clauses.
fn collect_type_nodes(node: Node<'_>, f: &mut impl FnMut(Node<'_>)) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "type_identifier" | "scoped_type_identifier" | "generic_type" => f(child),
            _ => collect_type_nodes(child, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::compiler::CompilerService;
    use crate::types::file_uri;

    fn collect(source: &str) -> crate::parsing::compiler::Compilation<SymbolTable> {
        let mut service = CompilerService::new().unwrap();
        let collector = SymbolCollector::new(
            file_uri("file:///Test.cls"),
            None,
            ValidationScope::default(),
        );
        service.compile(source, "file:///Test.cls", collector).unwrap()
    }

    fn names_of_kind(table: &SymbolTable, kind: SymbolKind) -> Vec<String> {
        table
            .symbols_of_kind(kind)
            .map(|s| s.name.clone())
            .collect()
    }

    #[test]
    fn test_class_with_members() {
        let out = collect(
            "public class Account { private Integer total; public Integer getTotal() { return total; } }",
        );
        let table = &out.result;
        assert_eq!(names_of_kind(table, SymbolKind::Class), vec!["Account"]);
        assert_eq!(names_of_kind(table, SymbolKind::Field), vec!["total"]);
        assert_eq!(names_of_kind(table, SymbolKind::Method), vec!["getTotal"]);

        let class = table.symbols_of_kind(SymbolKind::Class).next().unwrap();
        assert_eq!(class.modifiers.visibility, Visibility::Public);
        let field = table.symbols_of_kind(SymbolKind::Field).next().unwrap();
        assert_eq!(field.modifiers.visibility, Visibility::Private);
        assert_eq!(field.parent_id.as_ref(), Some(&class.id));
    }

    #[test]
    fn test_constructor_symbol_keeps_written_name() {
        let out = collect("class MyClass { WrongName() {} }");
        let ctor = out
            .result
            .symbols_of_kind(SymbolKind::Constructor)
            .next()
            .expect("constructor");
        assert_eq!(ctor.name, "WrongName");
        let (_, _, is_ctor, _) = ctor.method_detail().unwrap();
        assert!(is_ctor);
    }

    #[test]
    fn test_duplicate_local_reports_once_and_keeps_first() {
        let out = collect("class C { void m() { Integer x = 1; Integer x = 2; } }");
        let dups: Vec<_> = out
            .errors
            .iter()
            .filter(|e| e.code == "DUPLICATE_DECLARATION")
            .collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(names_of_kind(&out.result, SymbolKind::Variable), vec!["x"]);
        // Error points at the second x.
        assert_eq!(dups[0].location.unwrap().start_line, 1);
    }

    #[test]
    fn test_multiple_declarators_share_scope() {
        let out = collect("class C { void m() { Integer a = 1, b = 2, c = 3; } }");
        assert!(out.errors.is_empty());
        let vars = names_of_kind(&out.result, SymbolKind::Variable);
        assert_eq!(vars, vec!["a", "b", "c"]);
        // Distinct ids despite the shared statement.
        let ids: std::collections::HashSet<_> = out
            .result
            .symbols_of_kind(SymbolKind::Variable)
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_same_name_in_sibling_blocks_is_fine() {
        let out = collect("class C { void m() { { Integer x = 1; } { Integer x = 2; } } }");
        assert!(out.errors.is_empty());
        assert_eq!(
            names_of_kind(&out.result, SymbolKind::Variable),
            vec!["x", "x"]
        );
    }

    #[test]
    fn test_loop_variable_created_once() {
        let out = collect("class C { void m() { for (Integer i = 0; i < 10; i++) { i = i + 1; } } }");
        assert!(out.errors.is_empty());
        assert_eq!(names_of_kind(&out.result, SymbolKind::Variable), vec!["i"]);
    }

    #[test]
    fn test_enhanced_for_variable() {
        let out = collect("class C { void m(List<Integer> xs) { for (Integer x : xs) { x = x; } } }");
        assert!(out.errors.is_empty());
        assert_eq!(names_of_kind(&out.result, SymbolKind::Variable), vec!["x"]);
    }

    #[test]
    fn test_dotted_call_on_variable_vs_type() {
        let out = collect(
            "class C { void m(Helper h) { h.run(); Helper.create(); } }",
        );
        let refs = out.result.references();
        let usage: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == ReferenceKind::VariableUsage && r.name == "h")
            .collect();
        assert_eq!(usage.len(), 1);
        let class_refs: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == ReferenceKind::ClassReference && r.name == "Helper")
            .collect();
        assert_eq!(class_refs.len(), 1);
        let calls: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == ReferenceKind::MethodCall)
            .collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].qualifier.as_deref(), Some("h"));
        assert_eq!(calls[1].qualifier.as_deref(), Some("Helper"));
    }

    #[test]
    fn test_assignment_lhs_suppression_and_access() {
        let out = collect("class C { Integer f; void m() { f = 1; f += 2; } }");
        let refs = out.result.references();
        let writes: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == ReferenceKind::VariableUsage && r.name == "f")
            .collect();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].access, Some(AccessKind::Write));
        assert_eq!(writes[1].access, Some(AccessKind::ReadWrite));
    }

    #[test]
    fn test_constructor_call_and_argument_hints() {
        let out = collect(r#"class C { void m() { new Api().add("x", 2); } }"#);
        let refs = out.result.references();
        assert!(refs
            .iter()
            .any(|r| r.kind == ReferenceKind::ConstructorCall && r.name == "Api"));
        let call = refs
            .iter()
            .find(|r| r.kind == ReferenceKind::MethodCall && r.name == "add")
            .expect("call ref");
        assert_eq!(call.qualifier.as_deref(), Some("Api"));
        assert_eq!(
            call.argument_type_hints,
            Some(vec![Some("String".to_string()), Some("Integer".to_string())])
        );
        assert_eq!(call.parent_context_method.as_deref(), Some("m"));
    }

    #[test]
    fn test_initializer_call_records_expected_return_type() {
        let out = collect("class C { void m(Api api) { Integer r = api.sum(); } }");
        let call = out
            .result
            .references()
            .iter()
            .find(|r| r.kind == ReferenceKind::MethodCall && r.name == "sum")
            .expect("call ref")
            .clone();
        assert_eq!(call.expected_return_type.as_deref(), Some("Integer"));
    }

    #[test]
    fn test_extends_and_implements_emit_class_references() {
        let out = collect("class C extends Base implements Runnable, Closeable { }");
        let refs = out.result.references();
        let class_refs: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == ReferenceKind::ClassReference)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(class_refs, vec!["Base", "Runnable", "Closeable"]);

        let class = out.result.symbols_of_kind(SymbolKind::Class).next().unwrap();
        match &class.detail {
            Some(SymbolDetail::Type {
                super_class: Some(base),
                interfaces,
            }) => {
                assert_eq!(base.name, "Base");
                assert_eq!(interfaces.len(), 2);
            }
            other => panic!("unexpected detail: {other:?}"),
        }
    }

    #[test]
    fn test_enum_values_collected_in_order() {
        let out = collect("enum Season { WINTER, SPRING, SUMMER, FALL }");
        let e = out.result.symbols_of_kind(SymbolKind::Enum).next().unwrap();
        match &e.detail {
            Some(SymbolDetail::Enum { values }) => {
                assert_eq!(values, &["WINTER", "SPRING", "SUMMER", "FALL"]);
            }
            other => panic!("unexpected detail: {other:?}"),
        }
        let ev = names_of_kind(&out.result, SymbolKind::EnumValue);
        assert_eq!(ev.len(), 4);
        // Open question resolved: enum constants are default-visible.
        let first = out
            .result
            .symbols_of_kind(SymbolKind::EnumValue)
            .next()
            .unwrap();
        assert_eq!(first.modifiers.visibility, Visibility::Default);
    }

    #[test]
    fn test_interface_field_flagged_but_collected() {
        let out = collect("interface Shape { Integer SIDES = 4; Integer area(); }");
        assert!(out
            .errors
            .iter()
            .any(|e| e.code == "ILLEGAL_PLACEMENT"));
        // Recovery: the symbol still exists.
        assert_eq!(names_of_kind(&out.result, SymbolKind::Field), vec!["SIDES"]);
        assert_eq!(names_of_kind(&out.result, SymbolKind::Method), vec!["area"]);
    }

    #[test]
    fn test_compound_operands_are_named_flat() {
        let out = collect(
            "class C { void m(Helper b) { Integer t = a + b.calc(); Boolean q = flag ? b.pick() : fallback; Boolean n = !b.ready(); } }",
        );
        let refs = out.result.references();

        // Compound operands surface as one flat usage naming their text;
        // nothing inside them is walked.
        assert!(!refs.iter().any(|r| r.kind == ReferenceKind::MethodCall));
        let flat: Vec<_> = refs
            .iter()
            .filter(|r| r.kind == ReferenceKind::VariableUsage)
            .map(|r| r.name.as_str())
            .collect();
        assert!(flat.contains(&"b.calc()"), "{flat:?}");
        assert!(flat.contains(&"b.pick()"), "{flat:?}");
        assert!(flat.contains(&"b.ready()"), "{flat:?}");
        // Identifier operands still name themselves.
        assert!(flat.contains(&"a"));
        assert!(flat.contains(&"flag"));
        assert!(flat.contains(&"fallback"));
    }

    #[test]
    fn test_literal_operands_name_nothing() {
        let out = collect("class C { void m() { Boolean q = count > 10; } }");
        let usages: Vec<_> = out
            .result
            .references()
            .iter()
            .filter(|r| r.kind == ReferenceKind::VariableUsage)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(usages, vec!["count"]);
    }

    #[test]
    fn test_cast_and_instanceof_references() {
        let out = collect(
            "class C { void m(Object o) { if (o instanceof Account) { Account a = (Account) o; } } }",
        );
        let class_refs: Vec<_> = out
            .result
            .references()
            .iter()
            .filter(|r| r.kind == ReferenceKind::ClassReference && r.name == "Account")
            .collect();
        assert_eq!(class_refs.len(), 2);
    }

    #[test]
    fn test_nested_class_parent_chain() {
        let out = collect("class Outer { class Inner { } Outer() { } }");
        let table = &out.result;
        let classes: Vec<_> = table.symbols_of_kind(SymbolKind::Class).collect();
        assert_eq!(classes.len(), 2);
        let outer = classes.iter().find(|c| c.name == "Outer").unwrap();
        let inner = classes.iter().find(|c| c.name == "Inner").unwrap();
        assert_eq!(inner.parent_id.as_ref(), Some(&outer.id));
        assert_eq!(inner.fqn(table), "Outer.Inner");
    }

    #[test]
    fn test_method_overloads_allowed_duplicates_rejected() {
        let out = collect(
            "class C { void m(Integer a) {} void m(String a) {} void m(Integer b) {} }",
        );
        let dups: Vec<_> = out
            .errors
            .iter()
            .filter(|e| e.code == "DUPLICATE_DECLARATION")
            .collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(names_of_kind(&out.result, SymbolKind::Method).len(), 2);
    }
}
