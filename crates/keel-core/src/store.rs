//! Object store abstraction for uploaded documents
//!
//! Documents are content-addressed by path with no versioning. The trait
//! keeps storage pluggable so the server can run against the local
//! filesystem while tests substitute a temp directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Pluggable blob storage for document bytes
pub trait ObjectStore: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Fetch the bytes stored at a path
    fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Store bytes at a path
    fn upload(&self, path: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()>;
}

/// Local filesystem object store
pub struct LocalStore {
    /// Directory documents are stored under
    data_dir: PathBuf,
}

impl LocalStore {
    /// Create a new local store
    ///
    /// Creates the data directory if it doesn't exist.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();

        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).map_err(|e| {
                Error::Storage(format!(
                    "Failed to create data directory {}: {}",
                    data_dir.display(),
                    e
                ))
            })?;
            info!("Created document directory: {}", data_dir.display());
        }

        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolve a store path under the data directory, rejecting traversal
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.contains("..") || path.starts_with('/') {
            return Err(Error::Storage(format!("Invalid store path: {}", path)));
        }
        Ok(self.data_dir.join(path))
    }
}

impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    fn download(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", full_path.display(), e)))
    }

    fn upload(&self, path: &str, bytes: &[u8], _content_type: Option<&str>) -> Result<()> {
        let full_path = self.resolve(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, bytes).map_err(|e| {
            Error::Storage(format!("Failed to write {}: {}", full_path.display(), e))
        })?;
        Ok(())
    }
}
