//! Binary stdlib cache: string interning, record layouts, snapshot
//! serialization and on-disk persistence.

pub mod format;
pub mod persistence;
pub mod registry;
pub mod snapshot;
pub mod string_table;

pub use format::{FORMAT_VERSION, MAGIC, SnapshotHeader};
pub use persistence::SnapshotStore;
pub use registry::{TypeRegistry, TypeRegistryEntry};
pub use snapshot::{SnapshotMetadata, StdlibSnapshot, deserialize, serialize};
pub use string_table::{StringTableBuilder, StringTableReader};
