//! Single and bulk sharing on top of the codec and the vault.

use std::{collections::HashMap, sync::Arc};

use mongovault_core::{storage::RecordStore, ConnectionSummary, VaultError, VaultResult};
use mongovault_vault::ConnectionVault;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::codec::{self, ShareKey};

pub const BULK_VERSION: u32 = 1;
pub const NO_MATCHING_KEY: &str = "no matching decryption key found";
pub const MALFORMED_ENTRY: &str = "malformed bulk entry";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEntry {
    #[serde(default)]
    pub name: String,
    /// A complete single-connection bundle. Empty when the entry could not be read.
    #[serde(default)]
    pub bundle: String,
}

impl BulkEntry {
    /// Salvage what can be read from an entry that does not deserialize, so it
    /// still gets its own line in the import report.
    fn malformed(value: &serde_json::Value) -> Self {
        Self {
            name: value
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            bundle: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkShareBundle {
    pub version: u32,
    pub connections: Vec<BulkEntry>,
    /// Never written by this crate; bundles from other tools may carry it and
    /// it is ignored on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Bundle text plus the key that opens it. Send them over different channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleExport {
    pub bundle: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkExport {
    pub bundle: String,
    /// The one key shared by every entry.
    pub key: String,
    pub report: ShareReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Id of the connection exported or created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl ItemOutcome {
    fn success(name: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: true,
            error: None,
            connection_id: Some(connection_id.into()),
        }
    }

    fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ok: false,
            error: Some(error.into()),
            connection_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShareReport {
    pub total: usize,
    pub succeeded: usize,
    pub results: Vec<ItemOutcome>,
}

impl ShareReport {
    fn push(&mut self, outcome: ItemOutcome) {
        self.total += 1;
        if outcome.ok {
            self.succeeded += 1;
        }
        self.results.push(outcome);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Single(ConnectionSummary),
    Bulk(ShareReport),
}

/// How the key text supplied for a bulk import is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// One key for every entry.
    Shared(String),
    /// `Name: key` lines, matched exactly against entry names.
    ByName(HashMap<String, String>),
}

impl KeySpec {
    /// Lines of the form `Name: key` make a name map. If none parse, the
    /// whole text is one shared key. Keys are base64 and never contain `:`,
    /// so names may.
    pub fn parse(text: &str) -> Self {
        let map: HashMap<String, String> = text
            .lines()
            .filter_map(|line| {
                let (name, key) = line.rsplit_once(':')?;
                let (name, key) = (name.trim(), key.trim());
                (!name.is_empty() && !key.is_empty()).then(|| (name.to_string(), key.to_string()))
            })
            .collect();
        if map.is_empty() {
            KeySpec::Shared(text.trim().to_string())
        } else {
            KeySpec::ByName(map)
        }
    }

    fn key_for(&self, name: &str) -> Option<&str> {
        match self {
            KeySpec::Shared(key) if !key.is_empty() => Some(key),
            KeySpec::Shared(_) => None,
            KeySpec::ByName(map) => map.get(name.trim()).map(String::as_str),
        }
    }
}

/// Treat `text` as a bulk bundle only if it is JSON with `version == 1` and a
/// `connections` array. Anything else is a single bundle. Entries are read one
/// by one; an unreadable entry is kept with an empty bundle and fails on its own
/// at import time.
pub fn detect_bulk(text: &str) -> Option<BulkShareBundle> {
    let value: serde_json::Value = serde_json::from_str(text.trim()).ok()?;
    if value.get("version").and_then(serde_json::Value::as_u64) != Some(u64::from(BULK_VERSION)) {
        return None;
    }
    let items = value.get("connections")?.as_array()?;
    let connections = items
        .iter()
        .map(|item| {
            serde_json::from_value::<BulkEntry>(item.clone()).unwrap_or_else(|err| {
                warn!(error = %err, "unreadable bulk entry");
                BulkEntry::malformed(item)
            })
        })
        .collect();
    Some(BulkShareBundle {
        version: BULK_VERSION,
        connections,
        key: value
            .get("key")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
    })
}

/// Drives export and import between the vault and share text. Bulk work runs
/// item by item; one item's failure never stops the rest.
pub struct ShareOrchestrator<S: RecordStore> {
    vault: Arc<ConnectionVault<S>>,
}

impl<S: RecordStore> ShareOrchestrator<S> {
    pub fn new(vault: Arc<ConnectionVault<S>>) -> Self {
        Self { vault }
    }

    /// Encrypt one connection under a fresh key.
    #[instrument(skip(self))]
    pub fn export_one(&self, id: &str) -> VaultResult<SingleExport> {
        let record = self.vault.export(id)?;
        let key = ShareKey::generate();
        let bundle = codec::seal(&record, &key)?;
        info!(connection_id = %id, "connection exported");
        Ok(SingleExport {
            bundle,
            key: key.encode(),
        })
    }

    /// Encrypt each selected connection under one shared key. Ids that cannot
    /// be exported are reported and left out of the bundle.
    #[instrument(skip(self), fields(count = ids.len()))]
    pub fn export_many(&self, ids: &[String]) -> VaultResult<BulkExport> {
        if ids.is_empty() {
            return Err(VaultError::validation("select at least one connection"));
        }

        let key = ShareKey::generate();
        let mut connections = Vec::with_capacity(ids.len());
        let mut report = ShareReport::default();
        for id in ids {
            let sealed = self
                .vault
                .export(id)
                .and_then(|record| Ok((codec::seal(&record, &key)?, record.name)));
            match sealed {
                Ok((bundle, name)) => {
                    report.push(ItemOutcome::success(name.clone(), id.clone()));
                    connections.push(BulkEntry { name, bundle });
                }
                Err(err) => {
                    warn!(connection_id = %id, error = %err, "skipping connection in bulk export");
                    report.push(ItemOutcome::failure(id.clone(), err.to_string()));
                }
            }
        }

        let bundle = serde_json::to_string(&BulkShareBundle {
            version: BULK_VERSION,
            connections,
            key: None,
        })
        .map_err(|e| VaultError::validation(e.to_string()))?;
        info!(total = report.total, succeeded = report.succeeded, "bulk export finished");
        Ok(BulkExport {
            bundle,
            key: key.encode(),
            report,
        })
    }

    /// Import share text of either kind.
    pub fn import(&self, text: &str, key_text: &str) -> VaultResult<ImportOutcome> {
        match detect_bulk(text) {
            Some(bulk) => Ok(ImportOutcome::Bulk(self.import_many(&bulk, key_text))),
            None => self.import_one(text, key_text).map(ImportOutcome::Single),
        }
    }

    /// Decrypt one bundle and save it as a new connection. Fails on the first error.
    #[instrument(skip_all)]
    pub fn import_one(&self, bundle: &str, key_text: &str) -> VaultResult<ConnectionSummary> {
        let key = ShareKey::parse(key_text)?;
        let record = codec::open(bundle, &key)?;
        let summary = self.vault.import(record)?;
        info!(connection_id = %summary.id, "connection imported");
        Ok(summary)
    }

    /// Import every entry of a bulk bundle independently.
    #[instrument(skip_all, fields(count = bulk.connections.len()))]
    pub fn import_many(&self, bulk: &BulkShareBundle, key_text: &str) -> ShareReport {
        let keys = KeySpec::parse(key_text);
        let mut report = ShareReport::default();
        for (index, entry) in bulk.connections.iter().enumerate() {
            let name = if entry.name.trim().is_empty() {
                format!("entry {}", index + 1)
            } else {
                entry.name.clone()
            };
            if entry.bundle.trim().is_empty() {
                warn!(name = %name, "bulk entry has no bundle");
                report.push(ItemOutcome::failure(name, MALFORMED_ENTRY));
                continue;
            }
            let Some(key) = keys.key_for(&entry.name) else {
                warn!(name = %name, "no key for bulk entry");
                report.push(ItemOutcome::failure(name, NO_MATCHING_KEY));
                continue;
            };
            match self.import_one(&entry.bundle, key) {
                Ok(summary) => report.push(ItemOutcome::success(name, summary.id)),
                Err(err) => {
                    warn!(name = %name, error = %err, "bulk entry failed");
                    report.push(ItemOutcome::failure(name, err.to_string()));
                }
            }
        }
        info!(total = report.total, succeeded = report.succeeded, "bulk import finished");
        report
    }
}
