//! On-disk snapshot persistence.
//!
//! Reading memory-maps the artifact; writing goes through a temp file and an
//! atomic rename so a crashed build never leaves a half-written snapshot.
//! Writing is an offline build step; at runtime the store is read-only.

use crate::error::{SnapshotError, SnapshotResult};
use crate::storage::registry::TypeRegistryEntry;
use crate::storage::snapshot::{self, StdlibSnapshot};
use crate::symbol::SymbolTable;
use memmap2::Mmap;
use std::fs;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Manages one snapshot artifact on disk.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Serialize and persist a snapshot. Offline build step.
    #[must_use = "Save errors should be handled to ensure the snapshot is persisted"]
    pub fn save(
        &self,
        tables: &[SymbolTable],
        registry_entries: &[TypeRegistryEntry],
    ) -> SnapshotResult<()> {
        let bytes = snapshot::serialize(tables, registry_entries)?;

        let dir = self.path.parent().unwrap_or(std::path::Path::new("."));
        fs::create_dir_all(dir).map_err(|e| SnapshotError::Write {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let tmp = NamedTempFile::new_in(dir).map_err(|e| SnapshotError::Write {
            path: self.path.clone(),
            source: e,
        })?;
        fs::write(tmp.path(), &bytes).map_err(|e| SnapshotError::Write {
            path: tmp.path().to_path_buf(),
            source: e,
        })?;
        tmp.persist(&self.path).map_err(|e| SnapshotError::Write {
            path: self.path.clone(),
            source: e.error,
        })?;

        tracing::info!(
            "wrote stdlib snapshot: {} bytes, {} tables",
            bytes.len(),
            tables.len()
        );
        Ok(())
    }

    /// Memory-map and deserialize the snapshot.
    #[must_use = "Load errors should be handled; callers fall back to a cold build"]
    pub fn load(&self) -> SnapshotResult<StdlibSnapshot> {
        let file = fs::File::open(&self.path).map_err(|e| SnapshotError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        // Read-only map over a file we never mutate at runtime.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| SnapshotError::Read {
            path: self.path.clone(),
            source: e,
        })?;
        let loaded = snapshot::deserialize(&map)?;
        tracing::info!(
            "loaded stdlib snapshot: {} files, {} symbols in {} ms",
            loaded.metadata.file_count,
            loaded.metadata.symbol_count,
            loaded.load_time_ms
        );
        Ok(loaded)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Delete the persisted snapshot.
    pub fn clear(&self) -> Result<(), std::io::Error> {
        if self.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
