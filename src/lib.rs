//! apexsense: language-intelligence backend for Apex.
//!
//! Parses source units into per-file symbol tables, links cross-file
//! references into a shared graph, validates semantics in two latency tiers,
//! and persists a precompiled stdlib snapshot as a compact binary artifact.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod logging;
pub mod parsing;
pub mod storage;
pub mod symbol;
pub mod types;
pub mod validation;

pub use config::Settings;
pub use diagnostics::{Diagnostic, ErrorReporter, Severity};
pub use error::{CompileError, GraphError, SnapshotError, ValidatorFailure};
pub use graph::{
    EdgeKind, GraphData, LookupOutcome, ReferenceEdge, ResolutionContext, SymbolGraph,
    SymbolReference,
};
pub use parsing::{Compilation, CompilerService, SymbolCollector, ValidationScope};
pub use storage::{SnapshotStore, StdlibSnapshot, TypeRegistry, TypeRegistryEntry};
pub use symbol::{
    Annotation, Modifiers, Symbol, SymbolDetail, SymbolFactory, SymbolTable, TypeInfo,
    TypeReference,
};
pub use types::{
    AccessKind, FileUri, Range, ReferenceKind, ScopeKind, SymbolId, SymbolKind, SymbolLocation,
    Visibility, file_uri,
};
pub use validation::{
    ArtifactLoader, ValidationEngine, ValidationOptions, ValidationResult, ValidationTier,
    Validator, ValidatorRegistry,
};
