//! Named-blob storage boundary.
//!
//! The engine only ever asks for `save(name, bytes)` and `load(name)`; encoding and
//! location are up to the implementation.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use gig_credit_core::{CreditError, Result};

pub trait BlobStore: Send + Sync {
    fn save(&self, name: &str, blob: &[u8]) -> Result<()>;

    /// `Ok(None)` means the blob was never saved.
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// In-process store, mostly for tests and in-memory-only operation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl BlobStore for MemoryStore {
    fn save(&self, name: &str, blob: &[u8]) -> Result<()> {
        self.blobs.lock().insert(name.to_string(), blob.to_vec());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(name).cloned())
    }
}

/// One file per blob under a root directory.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Creates `root` if it does not exist yet.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CreditError::storage(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(CreditError::storage(name, "blob name is not a plain file name"));
        }
        Ok(self.root.join(name))
    }
}

impl BlobStore for DirStore {
    /// Write to a sibling temp file, then rename over the target.
    fn save(&self, name: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        let tmp = self.root.join(format!(".{name}.tmp"));
        fs::write(&tmp, blob).map_err(|e| CreditError::storage(name, e))?;
        fs::rename(&tmp, &path).map_err(|e| CreditError::storage(name, e))
    }

    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CreditError::storage(name, e)),
        }
    }
}
