//! Directory-backed object store

use crate::{Result, StoreError};
use margin_domain::ObjectStore;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// [`ObjectStore`] that keeps `bucket/key` at `{root}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an object
    ///
    /// Rejects buckets and keys that would escape the root.
    pub fn path_of(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(StoreError::InvalidKey(format!("bucket {:?}", bucket)));
        }
        let key_path = Path::new(key.trim_start_matches('/'));
        let escapes = key_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.trim_start_matches('/').is_empty() || escapes {
            return Err(StoreError::InvalidKey(format!("key {:?}", key)));
        }
        Ok(self.root.join(bucket).join(key_path))
    }
}

impl ObjectStore for FsObjectStore {
    type Error = StoreError;

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_of(bucket, key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8], content_type: &str) -> Result<()> {
        let path = self.path_of(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, body)?;
        tracing::trace!(bucket, key, content_type, bytes = body.len(), "object written");
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.path_of(bucket, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
