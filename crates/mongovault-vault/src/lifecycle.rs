//! Deletes that span several stores.
//!
//! Only the vault deletion is authoritative. Secondary stores keyed by
//! connection id (favorites, saved queries) are cleaned up best-effort: each
//! failure is logged and reported, never rolled back.

use std::sync::Arc;

use mongovault_core::{storage::RecordStore, VaultResult};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{favorites::FavoriteStore, vault::ConnectionVault};

/// A store holding per-connection data that must go when the connection goes.
pub trait ConnectionScopedStore: Send + Sync {
    /// Short name used for logging and reports.
    fn name(&self) -> &'static str;

    fn remove_for_connection(&self, connection_id: &str) -> anyhow::Result<()>;
}

impl ConnectionScopedStore for FavoriteStore {
    fn name(&self) -> &'static str {
        "favorites"
    }

    fn remove_for_connection(&self, connection_id: &str) -> anyhow::Result<()> {
        self.remove_favorites_for_connection(connection_id)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupFailure {
    pub store: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub connection_id: String,
    /// Secondary stores that could not be cleaned. The connection is gone regardless.
    pub cleanup_failures: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDeletion {
    pub folder_id: String,
    /// Child folders moved to the root.
    pub reparented_folders: Vec<String>,
    /// Connections whose folder was cleared. Stores that copy `folderId` should re-sync these.
    pub affected_connections: Vec<String>,
}

pub struct ConnectionLifecycle<S: RecordStore> {
    vault: Arc<ConnectionVault<S>>,
    secondary: Vec<Arc<dyn ConnectionScopedStore>>,
}

impl<S: RecordStore> ConnectionLifecycle<S> {
    pub fn new(vault: Arc<ConnectionVault<S>>) -> Self {
        Self {
            vault,
            secondary: Vec::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ConnectionScopedStore>) -> Self {
        self.secondary.push(store);
        self
    }

    /// Delete from the vault, then attempt each secondary cleanup in turn.
    #[instrument(skip(self))]
    pub fn delete_connection(&self, id: &str) -> VaultResult<DeletionReport> {
        self.vault.delete(id)?;

        let mut cleanup_failures = Vec::new();
        for store in &self.secondary {
            if let Err(err) = store.remove_for_connection(id) {
                warn!(
                    connection_id = %id,
                    store = store.name(),
                    error = %err,
                    "secondary cleanup failed; leaving orphaned entries"
                );
                cleanup_failures.push(CleanupFailure {
                    store: store.name(),
                    error: err.to_string(),
                });
            }
        }

        Ok(DeletionReport {
            connection_id: id.to_string(),
            cleanup_failures,
        })
    }

    /// Delete a folder: its connections move to the root first, then the folder
    /// is removed and its child folders are re-parented to the root.
    #[instrument(skip(self))]
    pub fn delete_folder(&self, folder_id: &str) -> VaultResult<FolderDeletion> {
        let folders = self.vault.folders();
        folders.get(folder_id)?;

        let affected_connections = self.vault.detach_folder(folder_id)?;
        let reparented_folders = folders.delete(folder_id)?;
        info!(
            folder_id = %folder_id,
            connections = affected_connections.len(),
            folders = reparented_folders.len(),
            "folder removed"
        );

        Ok(FolderDeletion {
            folder_id: folder_id.to_string(),
            reparented_folders,
            affected_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mongovault_core::{storage::InMemoryRecordStore, ConnectionRecord};

    use super::*;
    use crate::folders::FolderStore;

    struct FailingStore;

    impl ConnectionScopedStore for FailingStore {
        fn name(&self) -> &'static str {
            "saved-queries"
        }

        fn remove_for_connection(&self, _connection_id: &str) -> anyhow::Result<()> {
            anyhow::bail!("saved query index is locked")
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        seen: Mutex<Vec<String>>,
    }

    impl ConnectionScopedStore for RecordingStore {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn remove_for_connection(&self, connection_id: &str) -> anyhow::Result<()> {
            self.seen
                .lock()
                .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))?
                .push(connection_id.to_string());
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        vault: Arc<ConnectionVault<InMemoryRecordStore>>,
        favorites: Arc<FavoriteStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let folders =
            Arc::new(FolderStore::open(dir.path().join("folders.json")).expect("folders"));
        let favorites =
            Arc::new(FavoriteStore::open(dir.path().join("favorites.json")).expect("favorites"));
        let vault = Arc::new(
            ConnectionVault::open(InMemoryRecordStore::new(), folders).expect("vault"),
        );
        Fixture {
            _dir: dir,
            vault,
            favorites,
        }
    }

    #[test]
    fn delete_cascades_and_tolerates_secondary_failures() {
        let fx = fixture();
        let keep = fx
            .vault
            .save(ConnectionRecord::new("Keep", "mongodb://keep"))
            .expect("save keep");
        let gone = fx
            .vault
            .save(ConnectionRecord::new("Gone", "mongodb://gone"))
            .expect("save gone");
        fx.favorites
            .add_favorite(&format!("{}:app:users", gone.id))
            .expect("fav");
        fx.favorites
            .add_database_favorite(&format!("db:{}:app", gone.id))
            .expect("db fav");
        fx.favorites
            .add_favorite(&format!("{}:app:users", keep.id))
            .expect("fav keep");

        let recorder = Arc::new(RecordingStore::default());
        let lifecycle = ConnectionLifecycle::new(fx.vault.clone())
            .with_store(fx.favorites.clone())
            .with_store(Arc::new(FailingStore))
            .with_store(recorder.clone());

        let report = lifecycle.delete_connection(&gone.id).expect("delete");
        assert_eq!(report.cleanup_failures.len(), 1);
        assert_eq!(report.cleanup_failures[0].store, "saved-queries");

        assert_eq!(fx.vault.list(), vec![keep.clone()]);
        let favorites = fx.favorites.list();
        assert_eq!(favorites.collections, vec![format!("{}:app:users", keep.id)]);
        assert!(favorites.databases.is_empty());
        // Stores after the failing one still ran.
        assert_eq!(*recorder.seen.lock().expect("lock"), vec![gone.id]);
    }

    #[test]
    fn deleting_unknown_connection_skips_cleanup() {
        let fx = fixture();
        let recorder = Arc::new(RecordingStore::default());
        let lifecycle = ConnectionLifecycle::new(fx.vault.clone()).with_store(recorder.clone());

        assert!(lifecycle
            .delete_connection("missing")
            .expect_err("not found")
            .is_not_found());
        assert!(recorder.seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn folder_delete_clears_members_and_reparents_children() {
        let fx = fixture();
        let folders = fx.vault.folders().clone();
        let target = folders.create("Target", None).expect("target");
        let child = folders.create("Child", Some(target.id.as_str())).expect("child");
        let bystander = folders.create("Bystander", None).expect("bystander");

        let mut members = Vec::new();
        for name in ["One", "Two"] {
            let mut record = ConnectionRecord::new(name, "mongodb://db");
            record.folder_id = Some(target.id.clone());
            members.push(fx.vault.save(record).expect("save member").id);
        }
        let mut other = ConnectionRecord::new("Other", "mongodb://db");
        other.folder_id = Some(bystander.id.clone());
        let other = fx.vault.save(other).expect("save other");

        let lifecycle = ConnectionLifecycle::new(fx.vault.clone());
        let outcome = lifecycle.delete_folder(&target.id).expect("delete folder");

        let mut affected = outcome.affected_connections.clone();
        affected.sort();
        members.sort();
        assert_eq!(affected, members);
        assert_eq!(outcome.reparented_folders, vec![child.id.clone()]);

        for id in &members {
            assert_eq!(fx.vault.get(id).expect("member").folder_id, None);
        }
        assert_eq!(folders.get(&child.id).expect("child").parent_id, None);
        assert_eq!(folders.get(&bystander.id).expect("bystander"), bystander);
        assert_eq!(
            fx.vault.get(&other.id).expect("other").folder_id,
            Some(bystander.id)
        );
        assert!(folders.get(&target.id).expect_err("gone").is_not_found());
    }
}
