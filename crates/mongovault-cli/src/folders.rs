use std::collections::{HashMap, HashSet};

use color_eyre::Result;
use mongovault_core::{storage::RecordStore, Folder};

use crate::{cli::FolderCommand, storage::Workspace};

/// Execute a folder subcommand.
pub fn handle<S: RecordStore>(cmd: FolderCommand, workspace: &Workspace<S>) -> Result<()> {
    let folders = workspace.folders();
    match cmd {
        FolderCommand::List => {
            let all = folders.list();
            if all.is_empty() {
                println!("No folders yet.");
                return Ok(());
            }
            for line in render_tree(&all) {
                println!("{line}");
            }
        }
        FolderCommand::Create { name, parent } => {
            let folder = folders.create(&name, parent.as_deref())?;
            println!("Created folder {}: {}", folder.id, folder.name);
        }
        FolderCommand::Rename { id, name } => {
            let folder = folders.rename(&id, &name)?;
            println!("Renamed {} to {}", folder.id, folder.name);
        }
        FolderCommand::Move { id, parent } => {
            let folder = folders.move_to(&id, parent.as_deref())?;
            println!("Moved {}", folders.path_of(&folder.id)?.join(" / "));
        }
        FolderCommand::Delete { id } => {
            let outcome = workspace.lifecycle().delete_folder(&id)?;
            println!(
                "Deleted folder {}; {} connection(s) and {} folder(s) moved to the root",
                outcome.folder_id,
                outcome.affected_connections.len(),
                outcome.reparented_folders.len()
            );
        }
    }

    Ok(())
}

/// Indented tree lines, siblings sorted by name. Folders whose parent is
/// missing are shown at the root; folders caught in a parent cycle are not
/// reachable from any root and are listed last.
fn render_tree(folders: &[Folder]) -> Vec<String> {
    let known: HashMap<&str, &Folder> = folders.iter().map(|f| (f.id.as_str(), f)).collect();
    let mut children: HashMap<Option<&str>, Vec<&Folder>> = HashMap::new();
    for folder in folders {
        let parent = folder
            .parent_id
            .as_deref()
            .filter(|p| known.contains_key(p));
        children.entry(parent).or_default().push(folder);
    }
    for siblings in children.values_mut() {
        siblings.sort_by_key(|f| f.name.to_lowercase());
    }

    let mut lines = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<(&Folder, usize)> = children
        .get(&None)
        .map(|roots| roots.iter().rev().map(|f| (*f, 0)).collect())
        .unwrap_or_default();
    while let Some((folder, depth)) = stack.pop() {
        if !seen.insert(folder.id.as_str()) {
            continue;
        }
        lines.push(format!("{}{} ({})", "  ".repeat(depth), folder.name, folder.id));
        if let Some(kids) = children.get(&Some(folder.id.as_str())) {
            stack.extend(kids.iter().rev().map(|f| (*f, depth + 1)));
        }
    }
    for folder in folders {
        if !seen.contains(folder.id.as_str()) {
            lines.push(format!("? {} ({})", folder.name, folder.id));
        }
    }
    lines
}
