use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// CLI surface definition: a thin shell over the vault, folder, favorite and share stores.
#[derive(Parser, Debug)]
#[command(
    name = "mongovault",
    about = "Encrypted MongoDB connection vault",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to listing connections when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print version and exit.
    Version,
    /// Check that the encrypted store, keyring and data files are usable.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Saved connections.
    #[command(subcommand, visible_alias = "conn")]
    Connection(ConnectionCommand),
    /// Connection folders.
    #[command(subcommand)]
    Folder(FolderCommand),
    /// Collection and database favorites.
    #[command(subcommand, visible_alias = "fav")]
    Favorite(FavoriteCommand),
    /// Encrypted connection sharing.
    #[command(subcommand)]
    Share(ShareCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// List connections (no secrets).
    List,
    /// Show one connection.
    Show {
        id: String,
        /// Print the full record, secrets included.
        #[arg(long)]
        reveal: bool,
    },
    /// Create a connection, or update one with `--id`.
    Save(SaveArgs),
    /// Delete a connection and its favorites.
    Delete { id: String },
    /// Copy a connection, secrets included.
    Duplicate {
        id: String,
        /// Name for the copy; defaults to "<name> (copy)".
        #[arg(long)]
        name: Option<String>,
    },
    /// Move a connection into a folder, or to the root without `--folder`.
    Move {
        id: String,
        #[arg(long)]
        folder: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveArgs {
    /// Existing connection to update.
    #[arg(long)]
    pub id: Option<String>,
    /// Full connection record as camelCase JSON; flags override its fields.
    #[arg(long = "from-json", value_name = "FILE")]
    pub from_json: Option<PathBuf>,
    #[arg(long)]
    pub name: Option<String>,
    /// MongoDB URI. Leaving out the password keeps the stored one.
    #[arg(long)]
    pub uri: Option<String>,
    /// Folder id.
    #[arg(long, conflicts_with = "folder_path")]
    pub folder: Option<String>,
    /// Folder names from the root, created as needed, e.g. `Work/Backend`.
    #[arg(long = "folder-path", value_delimiter = '/')]
    pub folder_path: Vec<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long = "read-only")]
    pub read_only: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum FolderCommand {
    /// Print the folder tree.
    List,
    Create {
        name: String,
        #[arg(long)]
        parent: Option<String>,
    },
    Rename {
        id: String,
        name: String,
    },
    /// Re-parent a folder, or move it to the root without `--parent`.
    Move {
        id: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// Delete a folder; its children and connections move to the root.
    Delete { id: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum FavoriteCommand {
    List,
    /// Add a collection favorite: `<connectionId>:<db>:<collection>`.
    Add { key: String },
    Remove { key: String },
    /// Add a database favorite: `db:<connectionId>:<db>`.
    AddDb { key: String },
    RemoveDb { key: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ShareCommand {
    /// Export one connection (own key) or several (one shared key).
    Export {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
        /// Write the bundle here instead of stdout.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Import a single or bulk bundle.
    Import {
        /// File holding the bundle text.
        bundle: PathBuf,
        /// Decryption key (single key shared by every entry).
        #[arg(long, required_unless_present = "key_file", conflicts_with = "key_file")]
        key: Option<String>,
        /// File with a key, or `Name: key` lines for a bulk bundle.
        #[arg(long = "key-file")]
        key_file: Option<PathBuf>,
    },
}
