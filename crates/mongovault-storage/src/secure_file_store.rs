use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use mongovault_core::storage::{RecordStore, RecordStoreError};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{instrument, warn};

use crate::key_provider::{KeyMaterial, KeyProvider};

const RECORD_EXTENSION: &str = "rec";

/// AES-GCM encrypted store keeping one file per record under `root`.
/// Keys are persisted via a `KeyProvider` (OS keyring in production).
pub struct EncryptedFileStore<P: KeyProvider> {
    root: PathBuf,
    key_provider: P,
}

impl<P: KeyProvider> EncryptedFileStore<P> {
    pub fn new(root: impl Into<PathBuf>, key_provider: P) -> Self {
        Self {
            root: root.into(),
            key_provider,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{RECORD_EXTENSION}", URL_SAFE_NO_PAD.encode(id)))
    }

    fn cipher(&self) -> Result<Aes256Gcm, RecordStoreError> {
        let key_material =
            self.key_provider
                .get_or_create()
                .map_err(|e| RecordStoreError::Storage {
                    reason: format!("key provider: {e}"),
                })?;
        build_cipher(&key_material)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredBlob {
    nonce: String,
    ciphertext: String,
}

impl<P: KeyProvider> RecordStore for EncryptedFileStore<P> {
    #[instrument(skip_all, fields(id = %id))]
    fn put(&self, id: &str, value: &[u8]) -> Result<(), RecordStoreError> {
        fs::create_dir_all(&self.root).map_err(storage_err)?;

        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, value)
            .map_err(|e| RecordStoreError::Storage {
                reason: format!("encrypt failed: {e}"),
            })?;

        let blob = StoredBlob {
            nonce: URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        };

        write_blob(&self.path_for(id), &blob)
    }

    #[instrument(skip_all, fields(id = %id))]
    fn get(&self, id: &str) -> Result<Vec<u8>, RecordStoreError> {
        let blob = read_blob(&self.path_for(id), id)?;
        let cipher = self.cipher()?;

        let nonce_bytes =
            URL_SAFE_NO_PAD
                .decode(blob.nonce)
                .map_err(|e| RecordStoreError::Storage {
                    reason: format!("nonce decode failed: {e}"),
                })?;
        if nonce_bytes.len() != 12 {
            return Err(RecordStoreError::Storage {
                reason: format!("nonce has {} bytes, expected 12", nonce_bytes.len()),
            });
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext =
            URL_SAFE_NO_PAD
                .decode(blob.ciphertext)
                .map_err(|e| RecordStoreError::Storage {
                    reason: format!("ciphertext decode failed: {e}"),
                })?;

        cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|e| RecordStoreError::Storage {
                reason: format!("decrypt failed: {e}"),
            })
    }

    #[instrument(skip_all, fields(id = %id))]
    fn delete(&self, id: &str) -> Result<(), RecordStoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }

    fn list_ids(&self) -> Result<Vec<String>, RecordStoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(storage_err(err)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(storage_err)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match URL_SAFE_NO_PAD
                .decode(stem)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                Some(id) => ids.push(id),
                None => warn!(path = %path.display(), "skipping record file with undecodable name"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn write_blob(path: &Path, blob: &StoredBlob) -> Result<(), RecordStoreError> {
    let parent = path.parent().ok_or_else(|| RecordStoreError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(storage_err)?;

    // NamedTempFile is created 0600 on unix, so the record never exists world-readable.
    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    let json = serde_json::to_vec(blob).map_err(storage_err)?;
    tmp.write_all(&json).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn read_blob(path: &Path, id: &str) -> Result<StoredBlob, RecordStoreError> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            RecordStoreError::NotFound { key: id.to_string() }
        } else {
            storage_err(err)
        }
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(storage_err)?;
    serde_json::from_slice(&buf).map_err(storage_err)
}

fn build_cipher(material: &KeyMaterial) -> Result<Aes256Gcm, RecordStoreError> {
    Aes256Gcm::new_from_slice(&material.bytes).map_err(|e| RecordStoreError::Storage {
        reason: format!("cipher init failed: {e}"),
    })
}

fn storage_err<E: ToString>(err: E) -> RecordStoreError {
    RecordStoreError::Storage {
        reason: err.to_string(),
    }
}
