use thiserror::Error;

use crate::storage::RecordStoreError;

/// Errors surfaced by the vault, folder, favorite, and sharing layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// The referenced entity does not exist. Non-fatal; callers decide what to show.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    /// Wrong key or corrupted bundle.
    #[error("decryption failed: {0}")]
    Decryption(String),
    /// Disk or keyring write failure.
    #[error("persistence failed: {0}")]
    Persistence(String),
    /// Malformed input (URI, folder name, favorite key, bundle shape).
    #[error("invalid input: {0}")]
    Validation(String),
}

pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        VaultError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn persistence<E: ToString>(err: E) -> Self {
        VaultError::Persistence(err.to_string())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        VaultError::Validation(reason.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VaultError::NotFound { .. })
    }
}

impl From<RecordStoreError> for VaultError {
    fn from(err: RecordStoreError) -> Self {
        match err {
            RecordStoreError::NotFound { key } => VaultError::not_found("connection", key),
            RecordStoreError::Storage { reason } => VaultError::Persistence(reason),
        }
    }
}
