//! Whole-document JSON persistence for the small plaintext stores (folders,
//! favorites). Every write replaces the file atomically; there is no external
//! locking, so callers serialize writers themselves.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use mongovault_core::{VaultError, VaultResult};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the document. A missing or empty file yields `None`.
    pub fn load<T: DeserializeOwned>(&self) -> VaultResult<Option<T>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(VaultError::persistence(err)),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&contents).map(Some).map_err(|e| {
            VaultError::Persistence(format!("{} is not valid: {e}", self.path.display()))
        })
    }

    /// Atomically overwrite the document, owner read/write only.
    pub fn save<T: Serialize>(&self, value: &T) -> VaultResult<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| VaultError::Persistence("invalid document path".to_string()))?;
        fs::create_dir_all(parent).map_err(VaultError::persistence)?;

        let body = serde_json::to_vec_pretty(value).map_err(VaultError::persistence)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(VaultError::persistence)?;
        tmp.write_all(&body).map_err(VaultError::persistence)?;
        tmp.flush().map_err(VaultError::persistence)?;
        tmp.persist(&self.path)
            .map_err(|e| VaultError::persistence(e.error))?;
        set_file_permissions(&self.path)?;

        debug!(path = %self.path.display(), bytes = body.len(), "document written");
        Ok(())
    }
}

fn set_file_permissions(path: &Path) -> VaultResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .map_err(VaultError::persistence)?
            .permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms).map_err(VaultError::persistence)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
