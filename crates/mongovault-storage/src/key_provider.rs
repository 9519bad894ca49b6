use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use parking_lot::Mutex;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::debug;

/// Key material used for encryption at rest.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier for logging/rotation (never log key bytes).
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: [u8; 32],
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides access to the record-encryption key (OS keychain in production; memory in tests).
pub trait KeyProvider: Send + Sync {
    fn get_or_create(&self) -> Result<KeyMaterial, KeyError>;
}

/// OS keyring-backed provider. The key is generated on first use and cached
/// for the life of the process so the keychain is only consulted once.
pub struct KeyringProvider {
    service: String,
    account: String,
    cached: Mutex<Option<KeyMaterial>>,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            cached: Mutex::new(None),
        }
    }
}

impl KeyProvider for KeyringProvider {
    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut cached = self.cached.lock();
        if let Some(existing) = cached.as_ref() {
            return Ok(existing.clone());
        }

        let entry = keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        let material = match entry.get_password() {
            Ok(secret) => decode_key(&secret)?,
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, "no record key in keychain, generating one");
                let material = generate_key();
                entry
                    .set_password(&encode_key(&material))
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                material
            }
            Err(err) => return Err(KeyError::Keyring(err.to_string())),
        };

        *cached = Some(material.clone());
        Ok(material)
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeyMaterial>>>,
}

impl KeyProvider for InMemoryKeyProvider {
    fn get_or_create(&self) -> Result<KeyMaterial, KeyError> {
        let mut guard = self.inner.lock();

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let material = generate_key();
        *guard = Some(material.clone());
        Ok(material)
    }
}

fn generate_key() -> KeyMaterial {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    KeyMaterial {
        id: "default".to_string(),
        bytes,
    }
}

fn encode_key(material: &KeyMaterial) -> String {
    general_purpose::STANDARD.encode(material.bytes)
}

fn decode_key(secret: &str) -> Result<KeyMaterial, KeyError> {
    let bytes = general_purpose::STANDARD
        .decode(secret.trim())
        .map_err(|e| KeyError::Decode(e.to_string()))?;

    if bytes.len() != 32 {
        return Err(KeyError::Decode(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(KeyMaterial {
        id: "default".to_string(),
        bytes: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_provider_returns_same_key() {
        let provider = InMemoryKeyProvider::default();
        let first = provider.get_or_create().unwrap();
        let second = provider.get_or_create().unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let err = decode_key("abcd").expect_err("should reject wrong length");
        assert!(matches!(err, KeyError::Decode(_)));
    }

    #[test]
    fn encode_decode_preserves_bytes() {
        let material = generate_key();
        let decoded = decode_key(&encode_key(&material)).expect("decode");
        assert_eq!(decoded.bytes, material.bytes);
    }

    #[test]
    fn debug_never_prints_key_bytes() {
        let material = KeyMaterial {
            id: "default".into(),
            bytes: [7u8; 32],
        };
        let rendered = format!("{material:?}");
        assert!(rendered.contains("default"));
        assert!(!rendered.contains('7'));
    }
}
