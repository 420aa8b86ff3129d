//! Symbol collection: the compile entry point, the parse-tree walker and the
//! declaration-site validators.

pub mod collector;
pub mod compiler;
pub mod declarations;
pub mod identifiers;

pub use collector::SymbolCollector;
pub use compiler::{Compilation, CompilationListener, CompilerService, ListenerResult, node_range};
pub use identifiers::ValidationScope;
