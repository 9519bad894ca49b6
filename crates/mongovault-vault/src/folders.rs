//! Folder tree persisted as one JSON document of parent pointers.

use std::{
    collections::{HashSet, VecDeque},
    path::PathBuf,
};

use mongovault_core::{Folder, VaultError, VaultResult};
use mongovault_storage::json_document::JsonDocument;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

pub struct FolderStore {
    document: JsonDocument,
    folders: RwLock<Vec<Folder>>,
}

impl FolderStore {
    /// Load the folder document at `path`; a missing file is an empty tree.
    pub fn open(path: impl Into<PathBuf>) -> VaultResult<Self> {
        let document = JsonDocument::new(path);
        let folders: Vec<Folder> = document.load()?.unwrap_or_default();
        debug!(count = folders.len(), "folders loaded");
        Ok(Self {
            document,
            folders: RwLock::new(folders),
        })
    }

    pub fn list(&self) -> Vec<Folder> {
        self.folders.read().clone()
    }

    pub fn get(&self, id: &str) -> VaultResult<Folder> {
        self.folders
            .read()
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| VaultError::not_found("folder", id))
    }

    #[instrument(skip(self))]
    pub fn create(&self, name: &str, parent_id: Option<&str>) -> VaultResult<Folder> {
        let name = validate_name(name)?;
        let mut folders = self.folders.write();
        if let Some(parent) = parent_id {
            ensure_exists(&folders, parent)?;
        }

        let folder = Folder::new(name, parent_id.map(str::to_string));
        let mut next = folders.clone();
        next.push(folder.clone());
        self.document.save(&next)?;
        *folders = next;
        info!(folder_id = %folder.id, "folder created");
        Ok(folder)
    }

    #[instrument(skip(self))]
    pub fn rename(&self, id: &str, name: &str) -> VaultResult<Folder> {
        let name = validate_name(name)?;
        let mut folders = self.folders.write();
        let mut next = folders.clone();
        let folder = next
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| VaultError::not_found("folder", id))?;
        folder.name = name.to_string();
        let renamed = folder.clone();

        self.document.save(&next)?;
        *folders = next;
        Ok(renamed)
    }

    /// Re-parent `id` under `new_parent_id` (or the root). Rejects moves into the
    /// folder's own subtree so the parent graph stays acyclic.
    #[instrument(skip(self))]
    pub fn move_to(&self, id: &str, new_parent_id: Option<&str>) -> VaultResult<Folder> {
        let mut folders = self.folders.write();
        ensure_exists(&folders, id)?;
        if let Some(parent) = new_parent_id {
            ensure_exists(&folders, parent)?;
            if parent == id || descendants_of(&folders, id).contains(parent) {
                return Err(VaultError::validation(
                    "cannot move a folder into itself or one of its descendants",
                ));
            }
        }

        let mut next = folders.clone();
        let moved = match next.iter_mut().find(|f| f.id == id) {
            Some(folder) => {
                folder.parent_id = new_parent_id.map(str::to_string);
                folder.clone()
            }
            None => return Err(VaultError::not_found("folder", id)),
        };

        self.document.save(&next)?;
        *folders = next;
        Ok(moved)
    }

    /// Remove a folder and move its direct children to the root. Returns the ids
    /// of the re-parented child folders. Connections filed under the folder are
    /// not known here; see `ConnectionVault::detach_folder`.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> VaultResult<Vec<String>> {
        let mut folders = self.folders.write();
        ensure_exists(&folders, id)?;

        let mut reparented = Vec::new();
        let mut next: Vec<Folder> = folders.iter().filter(|f| f.id != id).cloned().collect();
        for folder in next.iter_mut() {
            if folder.parent_id.as_deref() == Some(id) {
                folder.parent_id = None;
                reparented.push(folder.id.clone());
            }
        }

        self.document.save(&next)?;
        *folders = next;
        info!(folder_id = %id, reparented = reparented.len(), "folder deleted");
        Ok(reparented)
    }

    /// Walk `path` from the root, reusing a same-named folder at each level or
    /// creating it. Returns the leaf id, or `None` for an empty path.
    ///
    /// The write lock is held for the whole walk: two resolutions of the same
    /// new path must not both create the missing folders.
    #[instrument(skip(self))]
    pub fn resolve_or_create(&self, path: &[String]) -> VaultResult<Option<String>> {
        let mut folders = self.folders.write();
        let mut next = folders.clone();
        let mut parent: Option<String> = None;
        let mut created = 0usize;

        for segment in path.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            let existing = next
                .iter()
                .find(|f| f.name == segment && f.parent_id == parent)
                .map(|f| f.id.clone());
            let id = match existing {
                Some(id) => id,
                None => {
                    let folder = Folder::new(segment, parent.clone());
                    let id = folder.id.clone();
                    next.push(folder);
                    created += 1;
                    id
                }
            };
            parent = Some(id);
        }

        if created > 0 {
            self.document.save(&next)?;
            *folders = next;
            info!(created, "folder path resolved with new folders");
        }
        Ok(parent)
    }

    /// Folder names from the root down to `id`.
    pub fn path_of(&self, id: &str) -> VaultResult<Vec<String>> {
        let folders = self.folders.read();
        ensure_exists(&folders, id)?;

        let mut names = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id.to_string());
        while let Some(current) = cursor {
            if !visited.insert(current.clone()) {
                warn!(folder_id = %id, "cycle in folder parents, truncating path");
                break;
            }
            let Some(folder) = folders.iter().find(|f| f.id == current) else {
                break;
            };
            names.push(folder.name.clone());
            cursor = folder.parent_id.clone();
        }
        names.reverse();
        Ok(names)
    }

    /// Every folder below `id`, at any depth.
    pub fn descendants(&self, id: &str) -> HashSet<String> {
        descendants_of(&self.folders.read(), id)
    }
}

/// Iterative breadth-first walk; the visited set keeps corrupt cyclic data
/// from looping forever.
fn descendants_of(folders: &[Folder], id: &str) -> HashSet<String> {
    let mut found = HashSet::new();
    let mut queue = VecDeque::from([id.to_string()]);
    while let Some(current) = queue.pop_front() {
        for child in folders
            .iter()
            .filter(|f| f.parent_id.as_deref() == Some(current.as_str()))
        {
            if child.id != id && found.insert(child.id.clone()) {
                queue.push_back(child.id.clone());
            }
        }
    }
    found
}

fn ensure_exists(folders: &[Folder], id: &str) -> VaultResult<()> {
    if folders.iter().any(|f| f.id == id) {
        Ok(())
    } else {
        Err(VaultError::not_found("folder", id))
    }
}

fn validate_name(name: &str) -> VaultResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(VaultError::validation("folder name must not be empty"));
    }
    Ok(trimmed)
}
