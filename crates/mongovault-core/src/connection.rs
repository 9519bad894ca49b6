use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::uri;

const REDACTED: &str = "<redacted>";

/// Full, secret-bearing connection profile as persisted in the encrypted store.
///
/// String secrets use the empty string for "not set"; see the vault's
/// reconciliation rules for how blanks are treated on save.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    /// Stable UUID; empty until the first save assigns one.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// MongoDB URI; may embed a password.
    pub uri: String,
    #[serde(default)]
    pub ssh: SshSettings,
    #[serde(default)]
    pub tls: TlsSettings,
    #[serde(default)]
    pub socks5: ProxySettings,
    /// Denormalized form state round-tripped for the UI. Opaque here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<serde_json::Value>,
    /// Folder-name breadcrumb from the root. Only set on import/export; cleared
    /// once resolved to `folder_id`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folder_path: Vec<String>,
}

impl ConnectionRecord {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Secret-stripped projection for list views.
    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary::from(self)
    }
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("folder_id", &self.folder_id)
            .field("color", &self.color)
            .field("read_only", &self.read_only)
            .field("created_at", &self.created_at)
            .field("last_accessed_at", &self.last_accessed_at)
            .field("uri", &uri::strip_password(&self.uri))
            .field("ssh", &self.ssh)
            .field("tls", &self.tls)
            .field("socks5", &self.socks5)
            .field("form_data", &self.form_data.as_ref().map(|_| REDACTED))
            .field("folder_path", &self.folder_path)
            .finish()
    }
}

/// SSH tunnel settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SshSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// PEM contents, not a path.
    pub private_key: String,
    pub passphrase: String,
}

impl fmt::Debug for SshSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSettings")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("private_key", &redact(&self.private_key))
            .field("passphrase", &redact(&self.passphrase))
            .finish()
    }
}

/// TLS material, stored inline.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsSettings {
    pub enabled: bool,
    pub ca_certificate: String,
    pub client_certificate: String,
    pub client_key: String,
    pub client_key_password: String,
    pub allow_invalid_certificates: bool,
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("enabled", &self.enabled)
            .field("ca_certificate", &redact(&self.ca_certificate))
            .field("client_certificate", &redact(&self.client_certificate))
            .field("client_key", &redact(&self.client_key))
            .field("client_key_password", &redact(&self.client_key_password))
            .field("allow_invalid_certificates", &self.allow_invalid_certificates)
            .finish()
    }
}

/// SOCKS5 proxy settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxySettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

fn redact(value: &str) -> &str {
    if value.is_empty() {
        ""
    } else {
        REDACTED
    }
}

/// UI-facing projection of a [`ConnectionRecord`]. Never holds a secret and is
/// only ever produced from a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: String,
    pub name: String,
    pub folder_id: Option<String>,
    pub color: Option<String>,
    pub read_only: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// URI with any embedded password removed.
    pub uri: String,
    pub ssh_enabled: bool,
    pub tls_enabled: bool,
    pub socks5_enabled: bool,
}

impl From<&ConnectionRecord> for ConnectionSummary {
    fn from(record: &ConnectionRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            folder_id: record.folder_id.clone(),
            color: record.color.clone(),
            read_only: record.read_only,
            created_at: record.created_at,
            last_accessed_at: record.last_accessed_at,
            uri: uri::strip_password(&record.uri),
            ssh_enabled: record.ssh.enabled,
            tls_enabled: record.tls.enabled,
            socks5_enabled: record.socks5.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_record() -> ConnectionRecord {
        ConnectionRecord {
            id: "c-1".into(),
            folder_id: Some("f-1".into()),
            ssh: SshSettings {
                enabled: true,
                host: "bastion".into(),
                port: 22,
                username: "ops".into(),
                password: "ssh-pass-111".into(),
                private_key: "-----BEGIN KEY-----".into(),
                passphrase: "ssh-phrase-222".into(),
            },
            tls: TlsSettings {
                enabled: true,
                client_key_password: "tls-pass-333".into(),
                ..TlsSettings::default()
            },
            socks5: ProxySettings {
                enabled: true,
                host: "proxy".into(),
                port: 1080,
                username: "p".into(),
                password: "socks-pass-444".into(),
            },
            form_data: Some(serde_json::json!({ "password": "form-pass-555" })),
            ..ConnectionRecord::new("Prod", "mongodb://admin:uri-pass-000@db:27017/app")
        }
    }

    #[test]
    fn summary_carries_identity_and_no_secrets() {
        let record = loaded_record();
        let summary = record.summary();

        assert_eq!(summary.id, "c-1");
        assert_eq!(summary.folder_id.as_deref(), Some("f-1"));
        assert_eq!(summary.uri, "mongodb://admin@db:27017/app");
        assert!(summary.ssh_enabled && summary.tls_enabled && summary.socks5_enabled);

        let json = serde_json::to_string(&summary).expect("serialize summary");
        for secret in [
            "uri-pass-000",
            "ssh-pass-111",
            "ssh-phrase-222",
            "tls-pass-333",
            "socks-pass-444",
            "form-pass-555",
            "BEGIN KEY",
        ] {
            assert!(!json.contains(secret), "summary leaked {secret}");
        }
    }

    #[test]
    fn only_percent_encoded_passwords_reach_a_summary() {
        let raw = "mongodb://admin:pa/ss@db:27017/app";
        assert!(matches!(
            uri::validate(raw),
            Err(crate::VaultError::Validation(_))
        ));

        let record = ConnectionRecord::new("Prod", "mongodb://admin:pa%2Fss@db:27017/app");
        assert!(uri::validate(&record.uri).is_ok());
        assert_eq!(record.summary().uri, "mongodb://admin@db:27017/app");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", loaded_record());
        assert!(!rendered.contains("uri-pass-000"));
        assert!(!rendered.contains("ssh-pass-111"));
        assert!(!rendered.contains("form-pass-555"));
        assert!(rendered.contains("bastion"));
    }

    #[test]
    fn deserializes_sparse_camel_case_payload() {
        let record: ConnectionRecord = serde_json::from_str(
            r#"{"name":"Local","uri":"mongodb://localhost","readOnly":true,"folderPath":["Work","Backend"]}"#,
        )
        .expect("parse");
        assert!(record.id.is_empty());
        assert!(record.read_only);
        assert_eq!(record.folder_path, vec!["Work", "Backend"]);
        assert_eq!(record.ssh, SshSettings::default());
    }
}
