use color_eyre::Result;
use mongovault_core::storage::RecordStore;

use crate::{cli::FavoriteCommand, storage::Workspace};

/// Execute a favorite subcommand.
pub fn handle<S: RecordStore>(cmd: FavoriteCommand, workspace: &Workspace<S>) -> Result<()> {
    let favorites = &workspace.favorites;
    match cmd {
        FavoriteCommand::List => {
            let list = favorites.list();
            if list.collections.is_empty() && list.databases.is_empty() {
                println!("No favorites yet.");
                return Ok(());
            }
            println!("Databases:");
            for key in &list.databases {
                println!("    {key}");
            }
            println!("Collections:");
            for key in &list.collections {
                println!("    {key}");
            }
        }
        FavoriteCommand::Add { key } => {
            favorites.add_favorite(&key)?;
            println!("Added {key}");
        }
        FavoriteCommand::Remove { key } => {
            favorites.remove_favorite(&key)?;
            println!("Removed {key}");
        }
        FavoriteCommand::AddDb { key } => {
            favorites.add_database_favorite(&key)?;
            println!("Added {key}");
        }
        FavoriteCommand::RemoveDb { key } => {
            favorites.remove_database_favorite(&key)?;
            println!("Removed {key}");
        }
    }

    Ok(())
}
