use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors produced by encrypted record storage implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordStoreError {
    /// Requested record does not exist.
    #[error("record not found: {key}")]
    NotFound { key: String },
    /// Underlying storage failure.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

/// Per-record encryption-at-rest contract.
///
/// Implementations are atomic per record and manage their own key material
/// (OS keyring in production). Callers only ever see plaintext bytes.
pub trait RecordStore: Send + Sync {
    /// Persist a value under an id, overwriting any existing record.
    fn put(&self, id: &str, value: &[u8]) -> Result<(), RecordStoreError>;

    /// Retrieve the value for an id.
    fn get(&self, id: &str) -> Result<Vec<u8>, RecordStoreError>;

    /// Remove a record (idempotent).
    fn delete(&self, id: &str) -> Result<(), RecordStoreError>;

    /// Enumerate every stored id.
    fn list_ids(&self) -> Result<Vec<String>, RecordStoreError>;

    /// Serialize and persist a typed record.
    fn save<T: Serialize>(&self, id: &str, record: &T) -> Result<(), RecordStoreError>
    where
        Self: Sized,
    {
        let bytes = serde_json::to_vec(record).map_err(storage_err)?;
        self.put(id, &bytes)
    }

    /// Load and deserialize a typed record.
    fn load<T: DeserializeOwned>(&self, id: &str) -> Result<T, RecordStoreError>
    where
        Self: Sized,
    {
        let bytes = self.get(id)?;
        serde_json::from_slice(&bytes).map_err(storage_err)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    fn put(&self, id: &str, value: &[u8]) -> Result<(), RecordStoreError> {
        (**self).put(id, value)
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, RecordStoreError> {
        (**self).get(id)
    }

    fn delete(&self, id: &str) -> Result<(), RecordStoreError> {
        (**self).delete(id)
    }

    fn list_ids(&self) -> Result<Vec<String>, RecordStoreError> {
        (**self).list_ids()
    }
}

/// In-memory record store that simulates encryption for tests and smoke runs.
/// This is not cryptographically secure; production uses the AES-GCM file store
/// with its key wrapped by the OS keychain.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    fail_deletes: Arc<Mutex<bool>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `delete` fail with a storage error.
    pub fn fail_deletes(&self, fail: bool) {
        if let Ok(mut flag) = self.fail_deletes.lock() {
            *flag = fail;
        }
    }

    /// Raw (masked) bytes as held in memory, for asserting nothing is stored in the clear.
    pub fn raw(&self, id: &str) -> Option<Vec<u8>> {
        self.inner.lock().ok()?.get(id).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, RecordStoreError> {
        self.inner.lock().map_err(|err| RecordStoreError::Storage {
            reason: format!("lock poisoned: {err}"),
        })
    }
}

impl RecordStore for InMemoryRecordStore {
    fn put(&self, id: &str, value: &[u8]) -> Result<(), RecordStoreError> {
        let mut map = self.lock()?;
        // XOR is a placeholder to avoid holding plaintext in tests.
        map.insert(id.to_string(), mask(value));
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, RecordStoreError> {
        let map = self.lock()?;
        let masked = map.get(id).ok_or_else(|| RecordStoreError::NotFound {
            key: id.to_string(),
        })?;
        Ok(mask(masked))
    }

    fn delete(&self, id: &str) -> Result<(), RecordStoreError> {
        if self.fail_deletes.lock().map(|flag| *flag).unwrap_or(false) {
            return Err(RecordStoreError::Storage {
                reason: format!("simulated delete failure for {id}"),
            });
        }
        let mut map = self.lock()?;
        map.remove(id);
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>, RecordStoreError> {
        let map = self.lock()?;
        Ok(map.keys().cloned().collect())
    }
}

const MASK_BYTE: u8 = 0xA5;

fn mask(input: &[u8]) -> Vec<u8> {
    input.iter().map(|b| b ^ MASK_BYTE).collect()
}

fn storage_err<E: ToString>(err: E) -> RecordStoreError {
    RecordStoreError::Storage {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        port: u16,
    }

    #[test]
    fn typed_round_trip_masks_payload() {
        let store = InMemoryRecordStore::new();
        let sample = Sample {
            name: "top-secret-payload".into(),
            port: 27017,
        };

        store.save("conn-1", &sample).expect("save");
        let loaded: Sample = store.load("conn-1").expect("load");
        assert_eq!(loaded, sample);

        let raw = store.raw("conn-1").expect("raw bytes");
        let raw_text = String::from_utf8_lossy(&raw);
        assert!(!raw_text.contains("top-secret-payload"));
    }

    #[test]
    fn delete_is_idempotent_and_removes_data() {
        let store = InMemoryRecordStore::new();
        store.put("k", b"v").expect("put");
        store.delete("k").expect("delete");
        store.delete("k").expect("delete again");

        let err = store.get("k").expect_err("get should fail after delete");
        assert!(matches!(err, RecordStoreError::NotFound { .. }));
        assert!(store.list_ids().expect("list").is_empty());
    }

    #[test]
    fn simulated_delete_failure_keeps_record() {
        let store = InMemoryRecordStore::new();
        store.put("k", b"v").expect("put");
        store.fail_deletes(true);

        let err = store.delete("k").expect_err("delete should fail");
        assert!(matches!(err, RecordStoreError::Storage { .. }));
        assert_eq!(store.list_ids().expect("list"), vec!["k".to_string()]);
    }
}
