//! Durable storage for the model bundle.
//!
//! The bundle is replaced wholesale on every incremental update, so the
//! write must be atomic with respect to readers: a half-written file
//! must never be reachable at the canonical path. The filesystem store
//! writes to a temp file in the same directory and renames it over the
//! target.

use std::io::Write;
use std::path::{Path, PathBuf};

use credx_core::ModelBundle;
use tracing::info;

use crate::StoreError;

/// Storage contract the classification service persists through.
pub trait BundleStore: Send + Sync {
    /// Load the current bundle; `StoreError::NotFound` when no bundle
    /// has been trained yet.
    fn load(&self) -> Result<ModelBundle, StoreError>;

    /// Atomically replace the stored bundle.
    fn save(&self, bundle: &ModelBundle) -> Result<(), StoreError>;
}

/// JSON bundle file on the local filesystem.
pub struct FsBundleStore {
    path: PathBuf,
}

impl FsBundleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BundleStore for FsBundleStore {
    fn load(&self) -> Result<ModelBundle, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::NotFound(self.path.clone()));
        }
        let data = std::fs::read(&self.path)?;
        let bundle: ModelBundle = serde_json::from_slice(&data)?;
        info!(path = %self.path.display(), classes = bundle.labels.len(), "loaded model bundle");
        Ok(bundle)
    }

    fn save(&self, bundle: &ModelBundle) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // Write the whole bundle to a sibling temp file, then rename it
        // over the canonical path. Rename within one directory is atomic,
        // so concurrent loaders see either the old or the new bundle.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, bundle)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        info!(path = %self.path.display(), "persisted model bundle");
        Ok(())
    }
}
