use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use mongovault_core::{ConnectionRecord, VaultError, VaultResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const BUNDLE_VERSION: u32 = 1;
pub const APP_TAG: &str = "mongovault";

const NONCE_LEN: usize = 12;

/// A one-off 256-bit key protecting a share bundle. Its text form is standard
/// base64 and must travel separately from the bundle.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareKey([u8; 32]);

impl ShareKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse the text form. Anything that is not 32 base64-encoded bytes is a
    /// wrong key as far as the caller is concerned.
    pub fn parse(text: &str) -> VaultResult<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| VaultError::Decryption(format!("share key is not base64: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|raw: Vec<u8>| {
            VaultError::Decryption(format!("share key has {} bytes, expected 32", raw.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(self.0)
    }

    fn cipher(&self) -> VaultResult<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| VaultError::Decryption(format!("cipher init failed: {e}")))
    }
}

impl std::fmt::Debug for ShareKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ShareKey(..)")
    }
}

/// Wire envelope for one encrypted connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareBundle {
    pub v: u32,
    pub app: String,
    /// RFC 3339 creation time, kept as text so the authenticated header is
    /// exactly what was sent.
    pub ts: String,
    pub nonce: String,
    pub data: String,
}

impl ShareBundle {
    fn associated_data(&self) -> Vec<u8> {
        format!("{}|{}|{}", self.v, self.app, self.ts).into_bytes()
    }
}

/// Encrypt a record into bundle text under `key`.
#[instrument(skip_all, fields(name = %record.name))]
pub fn seal(record: &ConnectionRecord, key: &ShareKey) -> VaultResult<String> {
    let plaintext = serde_json::to_vec(record).map_err(|e| VaultError::validation(e.to_string()))?;

    let mut bundle = ShareBundle {
        v: BUNDLE_VERSION,
        app: APP_TAG.to_string(),
        ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        nonce: String::new(),
        data: String::new(),
    };
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let aad = bundle.associated_data();
    let ciphertext = key
        .cipher()?
        .encrypt(
            &nonce,
            Payload {
                msg: &plaintext,
                aad: &aad,
            },
        )
        .map_err(|e| VaultError::Decryption(format!("encrypt failed: {e}")))?;

    bundle.nonce = STANDARD.encode(nonce.as_slice());
    bundle.data = STANDARD.encode(ciphertext);
    serde_json::to_string(&bundle).map_err(|e| VaultError::validation(e.to_string()))
}

/// Decrypt bundle text back into a record.
#[instrument(skip_all)]
pub fn open(text: &str, key: &ShareKey) -> VaultResult<ConnectionRecord> {
    let bundle: ShareBundle = serde_json::from_str(text.trim())
        .map_err(|e| VaultError::Decryption(format!("corrupted share bundle: {e}")))?;
    if bundle.v != BUNDLE_VERSION {
        return Err(VaultError::validation(format!(
            "unsupported bundle version {}",
            bundle.v
        )));
    }
    if bundle.app != APP_TAG {
        return Err(VaultError::validation(format!(
            "bundle was made by '{}', not {APP_TAG}",
            bundle.app
        )));
    }

    let nonce = STANDARD
        .decode(&bundle.nonce)
        .map_err(|e| VaultError::Decryption(format!("nonce decode failed: {e}")))?;
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::Decryption(format!(
            "nonce has {} bytes, expected {NONCE_LEN}",
            nonce.len()
        )));
    }
    let ciphertext = STANDARD
        .decode(&bundle.data)
        .map_err(|e| VaultError::Decryption(format!("data decode failed: {e}")))?;

    let aad = bundle.associated_data();
    let plaintext = key
        .cipher()?
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| VaultError::Decryption("wrong key or corrupted bundle".to_string()))?;

    let record: ConnectionRecord = serde_json::from_slice(&plaintext)
        .map_err(|e| VaultError::Decryption(format!("bundle does not hold a connection: {e}")))?;
    debug!(name = %record.name, created = %bundle.ts, "bundle opened");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ConnectionRecord {
        let mut record = ConnectionRecord::new("Prod", "mongodb://admin:hunter2@db:27017/app");
        record.ssh.enabled = true;
        record.ssh.password = "tunnel-pw".to_string();
        record.folder_path = vec!["Work".to_string()];
        record
    }

    #[test]
    fn sealed_bundle_hides_secrets_and_opens_with_key() {
        let key = ShareKey::generate();
        let text = seal(&record(), &key).expect("seal");
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("tunnel-pw"));

        let envelope: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(envelope["v"], 1);
        assert_eq!(envelope["app"], APP_TAG);

        let opened = open(&text, &key).expect("open");
        assert_eq!(opened, record());
    }

    #[test]
    fn wrong_key_is_a_decryption_failure() {
        let text = seal(&record(), &ShareKey::generate()).expect("seal");
        assert!(matches!(
            open(&text, &ShareKey::generate()),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn header_is_authenticated() {
        let key = ShareKey::generate();
        let text = seal(&record(), &key).expect("seal");
        let mut bundle: ShareBundle = serde_json::from_str(&text).expect("parse");
        bundle.ts = "1999-01-01T00:00:00.000Z".to_string();
        let tampered = serde_json::to_string(&bundle).expect("serialize");

        assert!(matches!(
            open(&tampered, &key),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn foreign_envelopes_are_invalid_and_garbage_is_corrupt() {
        let key = ShareKey::generate();
        let text = seal(&record(), &key).expect("seal");

        let mut future: ShareBundle = serde_json::from_str(&text).expect("parse");
        future.v = 2;
        let future = serde_json::to_string(&future).expect("serialize");
        assert!(matches!(open(&future, &key), Err(VaultError::Validation(_))));

        let mut foreign: ShareBundle = serde_json::from_str(&text).expect("parse");
        foreign.app = "other-client".to_string();
        let foreign = serde_json::to_string(&foreign).expect("serialize");
        assert!(matches!(open(&foreign, &key), Err(VaultError::Validation(_))));

        assert!(matches!(
            open("not json at all", &key),
            Err(VaultError::Decryption(_))
        ));
        assert!(matches!(
            open(r#"{"v":1,"app":"mongovault"}"#, &key),
            Err(VaultError::Decryption(_))
        ));
    }

    #[test]
    fn key_text_round_trips_and_rejects_garbage() {
        let key = ShareKey::generate();
        assert_eq!(ShareKey::parse(&format!(" {}\n", key.encode())).expect("parse"), key);
        assert!(matches!(
            ShareKey::parse("abc"),
            Err(VaultError::Decryption(_))
        ));
        assert!(matches!(
            ShareKey::parse(&STANDARD.encode([1u8; 16])),
            Err(VaultError::Decryption(_))
        ));
        assert_eq!(format!("{key:?}"), "ShareKey(..)");
    }
}
