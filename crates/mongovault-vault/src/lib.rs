//! Connection vault: encrypted connection profiles, the folder tree, favorites,
//! and the cross-store delete cascade.

pub mod favorites;
pub mod folders;
pub mod lifecycle;
pub mod reconcile;
pub mod vault;

pub use favorites::{FavoriteList, FavoriteStore};
pub use folders::FolderStore;
pub use lifecycle::{
    CleanupFailure, ConnectionLifecycle, ConnectionScopedStore, DeletionReport, FolderDeletion,
};
pub use vault::ConnectionVault;
