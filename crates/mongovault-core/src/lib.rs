//! Core abstractions for MongoVault: connection profiles, folders, favorite keys,
//! and the encrypted record storage contract.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod connection;
pub mod error;
pub mod favorite;
pub mod folder;
pub mod storage;
pub mod uri;

pub use connection::{
    ConnectionRecord, ConnectionSummary, ProxySettings, SshSettings, TlsSettings,
};
pub use error::{VaultError, VaultResult};
pub use favorite::{CollectionFavorite, DatabaseFavorite, FavoriteKey};
pub use folder::Folder;

/// Returns true when an optional string field carries no usable value.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
