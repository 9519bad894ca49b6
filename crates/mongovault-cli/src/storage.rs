use std::{path::PathBuf, sync::Arc};

use crate::config::Config;
use color_eyre::Result;
use dirs::data_dir;
use mongovault_core::storage::RecordStore;
#[cfg(test)]
use mongovault_storage::key_provider::InMemoryKeyProvider;
use mongovault_storage::{key_provider::KeyringProvider, secure_file_store::EncryptedFileStore};
use mongovault_vault::{ConnectionLifecycle, ConnectionVault, FavoriteStore, FolderStore};
use tracing::debug;

const CONNECTIONS_DIR: &str = "connections";
const FOLDERS_FILE: &str = "folders.json";
const FAVORITES_FILE: &str = "favorites.json";

pub type ProductionStore = EncryptedFileStore<KeyringProvider>;

/// Every store the commands work against, opened over one data root.
pub struct Workspace<S: RecordStore> {
    pub vault: Arc<ConnectionVault<S>>,
    pub favorites: Arc<FavoriteStore>,
}

impl<S: RecordStore> Workspace<S> {
    pub fn open(root: impl Into<PathBuf>, store: S) -> Result<Self> {
        let root = root.into();
        let folders = Arc::new(FolderStore::open(root.join(FOLDERS_FILE))?);
        let favorites = Arc::new(FavoriteStore::open(root.join(FAVORITES_FILE))?);
        let vault = Arc::new(ConnectionVault::open(store, folders)?);
        Ok(Self { vault, favorites })
    }

    pub fn folders(&self) -> &Arc<FolderStore> {
        self.vault.folders()
    }

    /// Deletes routed through here also clean up favorites.
    pub fn lifecycle(&self) -> ConnectionLifecycle<S> {
        ConnectionLifecycle::new(self.vault.clone()).with_store(self.favorites.clone())
    }
}

/// Resolve the default data directory for MongoVault.
pub fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("mongovault"))
}

pub fn data_root(config: &Config) -> Result<PathBuf> {
    match &config.data_dir {
        Some(root) => Ok(root.clone()),
        None => default_data_dir(),
    }
}

/// Encrypted record store keyed from the OS keychain, honoring config overrides.
pub fn store_from_config(config: &Config) -> Result<ProductionStore> {
    let root = data_root(config)?.join(CONNECTIONS_DIR);
    debug!(?root, "initializing encrypted store");
    Ok(EncryptedFileStore::new(
        root,
        KeyringProvider::new(&config.keyring_service, &config.keyring_account),
    ))
}

pub fn workspace_from_config(config: &Config) -> Result<Workspace<ProductionStore>> {
    Workspace::open(data_root(config)?, store_from_config(config)?)
}

/// Helper for tests to construct a store rooted at a temp dir with an in-memory key.
#[cfg(test)]
pub fn test_store(root: impl Into<PathBuf>) -> EncryptedFileStore<InMemoryKeyProvider> {
    EncryptedFileStore::new(root.into().join(CONNECTIONS_DIR), InMemoryKeyProvider::default())
}

#[cfg(test)]
pub fn test_workspace(
    root: &std::path::Path,
) -> Workspace<EncryptedFileStore<InMemoryKeyProvider>> {
    Workspace::open(root, test_store(root)).expect("open test workspace")
}
