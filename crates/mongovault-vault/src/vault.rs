use std::sync::Arc;

use chrono::Utc;
use mongovault_core::{
    is_blank,
    storage::{RecordStore, RecordStoreError},
    uri, ConnectionRecord, ConnectionSummary, VaultError, VaultResult,
};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{folders::FolderStore, reconcile::reconcile};

/// Owns every saved connection. Full records live only in the encrypted
/// `RecordStore`; memory holds the secret-free summaries shown in lists.
pub struct ConnectionVault<S: RecordStore> {
    store: S,
    folders: Arc<FolderStore>,
    summaries: RwLock<Vec<ConnectionSummary>>,
}

impl<S: RecordStore> ConnectionVault<S> {
    /// Load summaries for every record in `store`. Records that cannot be read
    /// are skipped with a warning so one bad file does not hide the rest.
    pub fn open(store: S, folders: Arc<FolderStore>) -> VaultResult<Self> {
        let ids = store.list_ids()?;
        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            match store.load::<ConnectionRecord>(&id) {
                Ok(record) => summaries.push(record.summary()),
                Err(err) => {
                    warn!(connection_id = %id, error = %err, "skipping unreadable connection record")
                }
            }
        }
        summaries.sort_by_key(|s| s.name.to_lowercase());
        debug!(count = summaries.len(), "connections loaded");

        Ok(Self {
            store,
            folders,
            summaries: RwLock::new(summaries),
        })
    }

    pub fn folders(&self) -> &Arc<FolderStore> {
        &self.folders
    }

    pub fn list(&self) -> Vec<ConnectionSummary> {
        self.summaries.read().clone()
    }

    /// The full, secret-bearing record. For the editor and export only.
    pub fn get(&self, id: &str) -> VaultResult<ConnectionRecord> {
        let summaries = self.summaries.read();
        ensure_listed(&summaries, id)?;
        Ok(self.store.load(id)?)
    }

    /// Create or update a connection.
    ///
    /// A missing id means create. A `folder_path` with no `folder_id` is resolved
    /// to a folder (creating it if needed). Updates are reconciled against the
    /// stored record so blank secrets do not erase saved ones.
    #[instrument(skip_all, fields(connection_id = %record.id, name = %record.name))]
    pub fn save(&self, mut record: ConnectionRecord) -> VaultResult<ConnectionSummary> {
        validate(&record)?;

        let mut summaries = self.summaries.write();
        if record.id.trim().is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        if is_blank(record.folder_id.as_deref()) && !record.folder_path.is_empty() {
            record.folder_id = self.folders.resolve_or_create(&record.folder_path)?;
        }
        record.folder_path.clear();

        let mut record = match self.load_existing(&record.id)? {
            Some(existing) => reconcile(record, &existing),
            None => record,
        };
        if is_blank(record.folder_id.as_deref()) {
            record.folder_id = None;
        }
        if record.created_at.is_none() {
            record.created_at = Some(Utc::now());
        }

        self.store.save(&record.id, &record)?;
        let summary = record.summary();
        upsert(&mut summaries, summary.clone());
        info!(connection_id = %summary.id, "connection saved");
        Ok(summary)
    }

    /// Remove a connection. A failure to remove the encrypted file is only
    /// logged: the list must still reflect the user's intent.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> VaultResult<()> {
        let mut summaries = self.summaries.write();
        let position = ensure_listed(&summaries, id)?;

        if let Err(err) = self.store.delete(id) {
            warn!(connection_id = %id, error = %err, "failed to remove encrypted record; dropping it from the list anyway");
        }
        summaries.remove(position);
        info!(connection_id = %id, "connection deleted");
        Ok(())
    }

    /// Copy a connection, secrets included, under a new id and name. The copy
    /// starts with a fresh creation time and no access time.
    #[instrument(skip(self))]
    pub fn duplicate(&self, id: &str, new_name: &str) -> VaultResult<ConnectionSummary> {
        let mut summaries = self.summaries.write();
        ensure_listed(&summaries, id)?;

        let mut record: ConnectionRecord = self.store.load(id)?;
        record.id = Uuid::new_v4().to_string();
        record.name = if new_name.trim().is_empty() {
            format!("{} (copy)", record.name)
        } else {
            new_name.trim().to_string()
        };
        record.created_at = Some(Utc::now());
        record.last_accessed_at = None;
        record.folder_path.clear();

        self.store.save(&record.id, &record)?;
        let summary = record.summary();
        summaries.push(summary.clone());
        info!(source_id = %id, connection_id = %summary.id, "connection duplicated");
        Ok(summary)
    }

    /// Stamp the access time, e.g. when the connection is opened.
    pub fn touch(&self, id: &str) -> VaultResult<ConnectionSummary> {
        self.modify(id, |record| record.last_accessed_at = Some(Utc::now()))
    }

    /// Assign a connection to a folder, or to the root with `None`. Unlike `save`,
    /// this can clear the folder.
    #[instrument(skip(self))]
    pub fn move_to_folder(
        &self,
        id: &str,
        folder_id: Option<&str>,
    ) -> VaultResult<ConnectionSummary> {
        if let Some(folder_id) = folder_id {
            self.folders.get(folder_id)?;
        }
        let folder_id = folder_id.map(str::to_string);
        self.modify(id, move |record| record.folder_id = folder_id)
    }

    /// Move every connection filed under `folder_id` to the root. Returns the ids
    /// that changed.
    #[instrument(skip(self))]
    pub fn detach_folder(&self, folder_id: &str) -> VaultResult<Vec<String>> {
        let mut summaries = self.summaries.write();
        let mut affected = Vec::new();
        for summary in summaries.iter_mut() {
            if summary.folder_id.as_deref() != Some(folder_id) {
                continue;
            }
            let mut record: ConnectionRecord = self.store.load(&summary.id)?;
            record.folder_id = None;
            self.store.save(&record.id, &record)?;
            *summary = record.summary();
            affected.push(record.id);
        }
        debug!(folder_id = %folder_id, count = affected.len(), "connections detached from folder");
        Ok(affected)
    }

    /// Save a record that came from somewhere else. It always gets a new id and
    /// fresh timestamps; its folder comes only from `folder_path`, since folder
    /// ids do not travel between devices.
    pub fn import(&self, mut record: ConnectionRecord) -> VaultResult<ConnectionSummary> {
        record.id = String::new();
        record.folder_id = None;
        record.created_at = None;
        record.last_accessed_at = None;
        self.save(record)
    }

    /// The full record prepared for sharing: the folder id is swapped for a
    /// portable name breadcrumb.
    pub fn export(&self, id: &str) -> VaultResult<ConnectionRecord> {
        let mut record = self.get(id)?;
        if let Some(folder_id) = record.folder_id.take() {
            record.folder_path = match self.folders.path_of(&folder_id) {
                Ok(path) => path,
                Err(err) => {
                    warn!(connection_id = %id, folder_id = %folder_id, error = %err, "exporting without folder path");
                    Vec::new()
                }
            };
        }
        Ok(record)
    }

    fn modify(
        &self,
        id: &str,
        change: impl FnOnce(&mut ConnectionRecord),
    ) -> VaultResult<ConnectionSummary> {
        let mut summaries = self.summaries.write();
        let position = ensure_listed(&summaries, id)?;

        let mut record: ConnectionRecord = self.store.load(id)?;
        change(&mut record);
        self.store.save(&record.id, &record)?;

        let summary = record.summary();
        summaries[position] = summary.clone();
        Ok(summary)
    }

    fn load_existing(&self, id: &str) -> VaultResult<Option<ConnectionRecord>> {
        match self.store.load(id) {
            Ok(record) => Ok(Some(record)),
            Err(RecordStoreError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

fn validate(record: &ConnectionRecord) -> VaultResult<()> {
    if record.name.trim().is_empty() {
        return Err(VaultError::validation("connection name must not be empty"));
    }
    uri::validate(&record.uri)
}

fn ensure_listed(summaries: &[ConnectionSummary], id: &str) -> VaultResult<usize> {
    summaries
        .iter()
        .position(|s| s.id == id)
        .ok_or_else(|| VaultError::not_found("connection", id))
}

fn upsert(summaries: &mut Vec<ConnectionSummary>, summary: ConnectionSummary) {
    match summaries.iter_mut().find(|s| s.id == summary.id) {
        Some(slot) => *slot = summary,
        None => summaries.push(summary),
    }
}
