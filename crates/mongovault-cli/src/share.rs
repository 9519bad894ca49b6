use std::{fs, path::Path};

use color_eyre::{eyre::WrapErr, Result};
use mongovault_core::storage::RecordStore;
use mongovault_share::{ImportOutcome, ShareOrchestrator, ShareReport};

use crate::{cli::ShareCommand, storage::Workspace};

/// Execute a share subcommand.
pub fn handle<S: RecordStore>(cmd: ShareCommand, workspace: &Workspace<S>) -> Result<()> {
    let share = ShareOrchestrator::new(workspace.vault.clone());
    match cmd {
        ShareCommand::Export { ids, out } => {
            let (bundle, key, report) = if let [id] = ids.as_slice() {
                let export = share.export_one(id)?;
                (export.bundle, export.key, None)
            } else {
                let export = share.export_many(&ids)?;
                (export.bundle, export.key, Some(export.report))
            };

            match out {
                Some(path) => {
                    write_bundle(&path, &bundle)?;
                    println!("Bundle written to {}", path.display());
                }
                None => println!("{bundle}"),
            }
            if let Some(report) = report {
                print_report(&report);
            }
            // Key stays off stdout.
            eprintln!("Key (send separately): {key}");
        }
        ShareCommand::Import {
            bundle,
            key,
            key_file,
        } => {
            let text = fs::read_to_string(&bundle)
                .wrap_err_with(|| format!("reading {}", bundle.display()))?;
            let key_text = match (key, key_file) {
                (Some(key), _) => key,
                (None, Some(path)) => fs::read_to_string(&path)
                    .wrap_err_with(|| format!("reading {}", path.display()))?,
                (None, None) => color_eyre::eyre::bail!("a key or key file is required"),
            };

            match share.import(&text, &key_text)? {
                ImportOutcome::Single(summary) => {
                    println!("Imported {}: {}", summary.id, summary.name)
                }
                ImportOutcome::Bulk(report) => print_report(&report),
            }
        }
    }

    Ok(())
}

fn print_report(report: &ShareReport) {
    println!("{}/{} succeeded", report.succeeded, report.total);
    for item in &report.results {
        match &item.error {
            None => println!("    ok     {}", item.name),
            Some(error) => println!("    failed {}: {error}", item.name),
        }
    }
}

fn write_bundle(path: &Path, bundle: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bundle).wrap_err_with(|| format!("writing {}", path.display()))
}
