//! Favorite keys.
//!
//! On disk favorites are flat strings: `connId:db:coll` for collections and
//! `db:connId:db` for databases. In memory they are parsed into typed keys.

use std::{fmt, str::FromStr};

use crate::error::VaultError;

const DATABASE_PREFIX: &str = "db:";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionFavorite {
    pub connection_id: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseFavorite {
    pub connection_id: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FavoriteKey {
    Collection(CollectionFavorite),
    Database(DatabaseFavorite),
}

impl FavoriteKey {
    pub fn connection_id(&self) -> &str {
        match self {
            FavoriteKey::Collection(fav) => &fav.connection_id,
            FavoriteKey::Database(fav) => &fav.connection_id,
        }
    }

    /// Whether a raw key string uses the database key space.
    pub fn is_database_key(raw: &str) -> bool {
        raw.starts_with(DATABASE_PREFIX)
    }
}

impl CollectionFavorite {
    pub fn belongs_to(&self, connection_id: &str) -> bool {
        self.connection_id == connection_id
    }
}

impl DatabaseFavorite {
    pub fn belongs_to(&self, connection_id: &str) -> bool {
        self.connection_id == connection_id
    }
}

impl fmt::Display for CollectionFavorite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.connection_id, self.database, self.collection)
    }
}

impl fmt::Display for DatabaseFavorite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DATABASE_PREFIX}{}:{}", self.connection_id, self.database)
    }
}

impl fmt::Display for FavoriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FavoriteKey::Collection(fav) => fmt::Display::fmt(fav, f),
            FavoriteKey::Database(fav) => fmt::Display::fmt(fav, f),
        }
    }
}

impl FromStr for CollectionFavorite {
    type Err = VaultError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if FavoriteKey::is_database_key(raw) {
            return Err(VaultError::validation(format!(
                "`{raw}` is a database favorite key"
            )));
        }
        // Collection names may themselves contain ':'; ids and database names do not.
        let mut parts = raw.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(conn), Some(db), Some(coll))
                if !conn.is_empty() && !db.is_empty() && !coll.is_empty() =>
            {
                Ok(Self {
                    connection_id: conn.to_string(),
                    database: db.to_string(),
                    collection: coll.to_string(),
                })
            }
            _ => Err(VaultError::validation(format!(
                "malformed collection favorite `{raw}`"
            ))),
        }
    }
}

impl FromStr for DatabaseFavorite {
    type Err = VaultError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let rest = raw.strip_prefix(DATABASE_PREFIX).ok_or_else(|| {
            VaultError::validation(format!("`{raw}` is not a database favorite key"))
        })?;
        match rest.split_once(':') {
            Some((conn, db)) if !conn.is_empty() && !db.is_empty() => Ok(Self {
                connection_id: conn.to_string(),
                database: db.to_string(),
            }),
            _ => Err(VaultError::validation(format!(
                "malformed database favorite `{raw}`"
            ))),
        }
    }
}

impl FromStr for FavoriteKey {
    type Err = VaultError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if Self::is_database_key(raw) {
            raw.parse().map(FavoriteKey::Database)
        } else {
            raw.parse().map(FavoriteKey::Collection)
        }
    }
}
