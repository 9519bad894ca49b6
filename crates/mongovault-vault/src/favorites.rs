//! Collection and database favorites, stored together in one JSON document.
//!
//! Two on-disk shapes are accepted. The legacy one is a flat array of keys; the
//! current one is `{"collections": [...], "databaseOrder": [...]}`. Every load
//! normalizes to the current shape in memory, and the next write persists it.

use std::{collections::BTreeSet, path::PathBuf};

use mongovault_core::{CollectionFavorite, DatabaseFavorite, FavoriteKey, VaultResult};
use mongovault_storage::json_document::JsonDocument;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredFavorites {
    Legacy(Vec<String>),
    Current {
        #[serde(default)]
        collections: Vec<String>,
        #[serde(default, rename = "databaseOrder")]
        database_order: Vec<String>,
    },
}

/// Favorites as exchanged with the UI: raw keys, databases in user order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteList {
    pub collections: Vec<String>,
    #[serde(rename = "databaseOrder")]
    pub databases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FavoriteSet {
    collections: BTreeSet<CollectionFavorite>,
    databases: Vec<DatabaseFavorite>,
    /// Keys that do not parse, kept verbatim so a rewrite never loses them.
    unparsed_collections: Vec<String>,
    unparsed_databases: Vec<String>,
}

impl FavoriteSet {
    fn from_stored(stored: StoredFavorites) -> Self {
        let (collections, databases) = match stored {
            StoredFavorites::Legacy(keys) => {
                debug!(count = keys.len(), "migrating legacy favorites");
                keys.into_iter()
                    .partition::<Vec<_>, _>(|key| !FavoriteKey::is_database_key(key))
            }
            StoredFavorites::Current {
                collections,
                database_order,
            } => (collections, database_order),
        };

        let mut set = FavoriteSet::default();
        for raw in collections {
            match raw.parse::<CollectionFavorite>() {
                Ok(fav) => {
                    set.collections.insert(fav);
                }
                Err(err) => {
                    warn!(key = %raw, error = %err, "keeping malformed collection favorite as-is");
                    push_unique(&mut set.unparsed_collections, raw);
                }
            }
        }
        for raw in databases {
            match raw.parse::<DatabaseFavorite>() {
                Ok(fav) if !set.databases.contains(&fav) => set.databases.push(fav),
                Ok(_) => {}
                Err(err) => {
                    warn!(key = %raw, error = %err, "keeping malformed database favorite as-is");
                    push_unique(&mut set.unparsed_databases, raw);
                }
            }
        }
        set
    }

    fn to_list(&self) -> FavoriteList {
        FavoriteList {
            collections: self
                .collections
                .iter()
                .map(ToString::to_string)
                .chain(self.unparsed_collections.iter().cloned())
                .collect(),
            databases: self
                .databases
                .iter()
                .map(ToString::to_string)
                .chain(self.unparsed_databases.iter().cloned())
                .collect(),
        }
    }

    fn len(&self) -> usize {
        self.collections.len()
            + self.databases.len()
            + self.unparsed_collections.len()
            + self.unparsed_databases.len()
    }
}

fn push_unique(keys: &mut Vec<String>, raw: String) {
    if !keys.contains(&raw) {
        keys.push(raw);
    }
}

pub struct FavoriteStore {
    document: JsonDocument,
    state: RwLock<FavoriteSet>,
}

impl FavoriteStore {
    pub fn open(path: impl Into<PathBuf>) -> VaultResult<Self> {
        let document = JsonDocument::new(path);
        let state = document
            .load::<StoredFavorites>()?
            .map(FavoriteSet::from_stored)
            .unwrap_or_default();
        Ok(Self {
            document,
            state: RwLock::new(state),
        })
    }

    pub fn list(&self) -> FavoriteList {
        self.state.read().to_list()
    }

    pub fn is_favorite(&self, key: &str) -> bool {
        let state = self.state.read();
        match key.parse::<FavoriteKey>() {
            Ok(FavoriteKey::Collection(fav)) => state.collections.contains(&fav),
            Ok(FavoriteKey::Database(fav)) => state.databases.contains(&fav),
            Err(_) => false,
        }
    }

    /// Add a collection favorite (`connId:db:coll`). Adding twice is a no-op.
    #[instrument(skip(self))]
    pub fn add_favorite(&self, key: &str) -> VaultResult<()> {
        let fav: CollectionFavorite = key.parse()?;
        self.update(|set| set.collections.insert(fav))
    }

    /// Remove a collection favorite. Unknown keys are a no-op; a malformed key
    /// removes a matching unparsed entry kept from disk.
    #[instrument(skip(self))]
    pub fn remove_favorite(&self, key: &str) -> VaultResult<()> {
        match key.parse::<CollectionFavorite>() {
            Ok(fav) => self.update(|set| set.collections.remove(&fav)),
            Err(_) => self.update(|set| remove_raw(&mut set.unparsed_collections, key)),
        }
    }

    /// Append a database favorite (`db:connId:db`) unless already present.
    #[instrument(skip(self))]
    pub fn add_database_favorite(&self, key: &str) -> VaultResult<()> {
        let fav: DatabaseFavorite = key.parse()?;
        self.update(|set| {
            if set.databases.contains(&fav) {
                false
            } else {
                set.databases.push(fav);
                true
            }
        })
    }

    /// Remove a database favorite, keeping the order of the rest.
    #[instrument(skip(self))]
    pub fn remove_database_favorite(&self, key: &str) -> VaultResult<()> {
        let Ok(fav) = key.parse::<DatabaseFavorite>() else {
            return self.update(|set| remove_raw(&mut set.unparsed_databases, key));
        };
        self.update(|set| {
            let before = set.databases.len();
            set.databases.retain(|d| d != &fav);
            set.databases.len() != before
        })
    }

    /// Drop every favorite of either kind that belongs to `connection_id`.
    /// Returns how many were removed; writes at most once.
    #[instrument(skip(self))]
    pub fn remove_favorites_for_connection(&self, connection_id: &str) -> VaultResult<usize> {
        let mut removed = 0;
        let collection_prefix = format!("{connection_id}:");
        let database_prefix = format!("db:{connection_id}:");
        self.update(|set| {
            let before = set.len();
            set.collections.retain(|c| !c.belongs_to(connection_id));
            set.databases.retain(|d| !d.belongs_to(connection_id));
            set.unparsed_collections
                .retain(|raw| !raw.starts_with(&collection_prefix));
            set.unparsed_databases
                .retain(|raw| !raw.starts_with(&database_prefix));
            removed = before - set.len();
            removed > 0
        })?;
        Ok(removed)
    }

    /// Apply `change` to a copy of the set; persist and commit only if it
    /// reports a modification.
    fn update(&self, change: impl FnOnce(&mut FavoriteSet) -> bool) -> VaultResult<()> {
        let mut state = self.state.write();
        let mut next = state.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.document.save(&next.to_list())?;
        *state = next;
        Ok(())
    }
}

fn remove_raw(keys: &mut Vec<String>, raw: &str) -> bool {
    let before = keys.len();
    keys.retain(|k| k != raw);
    keys.len() != before
}

#[cfg(test)]
mod tests {
    use std::fs;

    use mongovault_core::VaultError;

    use super::*;

    fn open_with(contents: Option<&str>) -> (tempfile::TempDir, FavoriteStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("favorites.json");
        if let Some(contents) = contents {
            fs::write(&path, contents).expect("seed favorites");
        }
        let store = FavoriteStore::open(&path).expect("open");
        (dir, store)
    }

    #[test]
    fn add_is_idempotent_and_remove_of_non_member_is_noop() {
        let (_dir, store) = open_with(None);
        store.add_favorite("c1:app:users").expect("add");
        let once = store.list();
        store.add_favorite("c1:app:users").expect("add again");
        assert_eq!(store.list(), once);
        assert_eq!(once.collections, vec!["c1:app:users"]);

        store.remove_favorite("c1:app:orders").expect("remove non-member");
        store.remove_favorite("garbage").expect("remove malformed");
        assert_eq!(store.list(), once);
    }

    #[test]
    fn malformed_keys_are_rejected_on_add() {
        let (_dir, store) = open_with(None);
        assert!(matches!(
            store.add_favorite("c1:app"),
            Err(VaultError::Validation(_))
        ));
        assert!(matches!(
            store.add_database_favorite("c1:app"),
            Err(VaultError::Validation(_))
        ));
        assert!(matches!(
            store.add_favorite("db:c1:app"),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn database_removal_preserves_survivor_order() {
        let (_dir, store) = open_with(None);
        for db in ["db:c1:db1", "db:c1:db2", "db:c1:db3"] {
            store.add_database_favorite(db).expect("add db");
        }
        store.add_database_favorite("db:c1:db1").expect("re-add is a no-op");
        store.remove_database_favorite("db:c1:db2").expect("remove");
        assert_eq!(store.list().databases, vec!["db:c1:db1", "db:c1:db3"]);
    }

    #[test]
    fn legacy_array_is_partitioned_on_load() {
        let (dir, store) = open_with(Some(r#"["connA:db1:coll1","db:connA:db1"]"#));
        let list = store.list();
        assert_eq!(list.collections, vec!["connA:db1:coll1"]);
        assert_eq!(list.databases, vec!["db:connA:db1"]);
        assert!(store.is_favorite("connA:db1:coll1"));

        // Still legacy on disk until the next write.
        let raw = fs::read_to_string(dir.path().join("favorites.json")).expect("read");
        assert!(raw.trim_start().starts_with('['));

        store.add_favorite("connB:db2:coll2").expect("add");
        let raw: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("favorites.json")).expect("read"),
        )
        .expect("parse");
        assert_eq!(raw["databaseOrder"], serde_json::json!(["db:connA:db1"]));
        assert_eq!(raw["collections"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn legacy_database_order_follows_file_order() {
        let (_dir, store) = open_with(Some(
            r#"["db:c:zeta","c:x:y","db:c:alpha","db:c:zeta","broken"]"#,
        ));
        let list = store.list();
        assert_eq!(list.databases, vec!["db:c:zeta", "db:c:alpha"]);
        assert_eq!(list.collections, vec!["c:x:y", "broken"]);
    }

    #[test]
    fn unparseable_keys_survive_later_writes() {
        let (dir, store) = open_with(Some(r#"["broken","db:c1:","c1:a:x","c1:a:"]"#));
        store.add_favorite("c2:app:users").expect("add");

        let reopened = FavoriteStore::open(dir.path().join("favorites.json")).expect("reopen");
        let list = reopened.list();
        assert_eq!(
            list.collections,
            vec!["c1:a:x", "c2:app:users", "broken", "c1:a:"]
        );
        assert_eq!(list.databases, vec!["db:c1:"]);

        // The sweep matches raw keys by connection prefix.
        assert_eq!(reopened.remove_favorites_for_connection("c1").expect("sweep"), 3);
        assert_eq!(reopened.list().collections, vec!["c2:app:users", "broken"]);
        assert_eq!(reopened.list().databases, Vec::<String>::new());

        reopened.remove_favorite("broken").expect("remove raw");
        assert_eq!(reopened.list().collections, vec!["c2:app:users"]);
    }

    #[test]
    fn current_shape_round_trips_through_reopen() {
        let (dir, store) = open_with(None);
        store.add_favorite("c1:app:users").expect("add");
        store.add_database_favorite("db:c1:app").expect("add db");

        let reopened = FavoriteStore::open(dir.path().join("favorites.json")).expect("reopen");
        assert_eq!(reopened.list(), store.list());
    }

    #[test]
    fn sweeping_a_connection_clears_both_sets() {
        let (_dir, store) = open_with(Some(
            r#"{"collections":["c1:a:x","c2:a:x","c1:b:y"],"databaseOrder":["db:c2:a","db:c1:a"]}"#,
        ));
        let removed = store.remove_favorites_for_connection("c1").expect("sweep");
        assert_eq!(removed, 3);
        let list = store.list();
        assert_eq!(list.collections, vec!["c2:a:x"]);
        assert_eq!(list.databases, vec!["db:c2:a"]);

        assert_eq!(store.remove_favorites_for_connection("c1").expect("again"), 0);
    }

    #[test]
    fn connection_id_prefix_must_match_exactly() {
        let (_dir, store) = open_with(Some(r#"["c1:a:x","c10:a:x","db:c10:a"]"#));
        store.remove_favorites_for_connection("c1").expect("sweep");
        let list = store.list();
        assert_eq!(list.collections, vec!["c10:a:x"]);
        assert_eq!(list.databases, vec!["db:c10:a"]);
    }
}
