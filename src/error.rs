//! Error types for the language-intelligence backend.
//!
//! Structured errors per subsystem using thiserror, with actionable messages.
//! Binary-cache errors are fatal for the current load; graph and validation
//! errors are recovered locally and surfaced as diagnostics.

use crate::types::SymbolId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the compile entry point and the grammar runtime.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to initialize the grammar runtime: {reason}")]
    ParserInit { reason: String },

    #[error("The grammar runtime produced no tree for '{file_uri}'")]
    NoTree { file_uri: String },
}

/// Errors from symbol-graph writes. Structural invariants are asserted on
/// every write; a violation rejects the write and never corrupts the graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Symbol '{id}' is not registered in the graph")]
    UnknownSymbol { id: SymbolId },

    #[error("Parent chain of '{id}' forms a cycle; write rejected")]
    ParentCycle { id: SymbolId },

    #[error("Edge endpoint '{id}' is missing from the node map; write rejected")]
    DanglingEndpoint { id: SymbolId },
}

/// Errors from the binary stdlib cache. All fatal for the current load;
/// callers fall back to a cold build.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read snapshot '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write snapshot '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid magic number 0x{found:08X}: not a stdlib snapshot")]
    BadMagic { found: u32 },

    #[error("Unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Checksum mismatch: header says 0x{expected:016X}, payload hashes to 0x{actual:016X}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("Truncated {section}: needed {needed} bytes, {available} available")]
    Truncated {
        section: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("String index {index} out of range (table holds {len} entries)")]
    StringIndexOutOfRange { index: u32, len: u32 },

    #[error("Unknown {field} byte 0x{value:02X} in symbol record")]
    UnknownEnumByte { field: &'static str, value: u8 },

    #[error("Snapshot symbol table for '{file_uri}' is inconsistent: {reason}")]
    CorruptTable { file_uri: String, reason: String },
}

impl SnapshotError {
    /// Recovery suggestions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::BadMagic { .. } | Self::UnsupportedVersion { .. } => vec![
                "The snapshot was produced by an incompatible build",
                "Regenerate it with the current serializer, or fall back to a cold build",
            ],
            Self::ChecksumMismatch { .. } | Self::Truncated { .. } | Self::CorruptTable { .. } => {
                vec![
                    "The snapshot file is damaged; delete it and rebuild",
                    "Check for disk errors if this repeats",
                ]
            }
            Self::Read { .. } | Self::Write { .. } => vec![
                "Check that the path exists and is readable/writable",
                "The engine runs without a snapshot, at slower startup",
            ],
            _ => vec![],
        }
    }
}

/// A validator that failed to run. The engine logs it, contributes one
/// internal error to the merged result, and keeps going.
#[derive(Error, Debug)]
pub enum ValidatorFailure {
    #[error("Validator '{validator}' failed: {reason}")]
    Internal { validator: String, reason: String },

    #[error("Validator '{validator}' exceeded its time budget")]
    TimedOut { validator: String },

    #[error("Validation run was cancelled")]
    Cancelled,
}

pub type CompileResult<T> = Result<T, CompileError>;
pub type GraphResult<T> = Result<T, GraphError>;
pub type SnapshotResult<T> = Result<T, SnapshotError>;
