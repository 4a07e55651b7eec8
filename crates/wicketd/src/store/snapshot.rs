//! Local reference-set snapshot file.
//!
//! A single serialized blob holding the full reference set, read as
//! the load fallback when the durable backend is empty or
//! unreachable, and rewritten after every successful rebuild.

use std::fs;
use std::path::PathBuf;

use wicket_core::ReferenceSet;

use super::StoreError;

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read the snapshot. Missing file surfaces as an IO error for
    /// the caller's fallback chain to absorb.
    pub fn read(&self) -> Result<ReferenceSet, StoreError> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the full snapshot, via a temp file and rename so a crash
    /// mid-write never leaves a truncated snapshot behind.
    pub fn write(&self, set: &ReferenceSet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(set)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
