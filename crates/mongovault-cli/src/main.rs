mod cli;
mod config;
mod connections;
mod favorites;
mod folders;
mod share;
mod storage;

use crate::cli::ConfigCommand;
use clap::Parser;
use color_eyre::Result;
use mongovault_core::storage::RecordStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let command = cli
        .command
        .unwrap_or(cli::Command::Connection(cli::ConnectionCommand::List));
    match command {
        cli::Command::Version => print_version(),
        cli::Command::Health => run_health_check(&config)?,
        cli::Command::Config(ConfigCommand::Init) => init_config(&config)?,
        cli::Command::Connection(cmd) => {
            connections::handle(cmd, &storage::workspace_from_config(&config)?)?
        }
        cli::Command::Folder(cmd) => folders::handle(cmd, &storage::workspace_from_config(&config)?)?,
        cli::Command::Favorite(cmd) => {
            favorites::handle(cmd, &storage::workspace_from_config(&config)?)?
        }
        cli::Command::Share(cmd) => share::handle(cmd, &storage::workspace_from_config(&config)?)?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("mongovault {}", env!("CARGO_PKG_VERSION"));
}

/// Round-trips a probe through the encrypted store and opens the data files.
fn run_health_check(config: &config::Config) -> Result<()> {
    let store = storage::store_from_config(config)?;
    run_store_health(&store)?;
    println!("Storage: ok");

    let workspace = storage::Workspace::open(storage::data_root(config)?, store)?;
    println!(
        "Data: ok ({} connections, {} folders)",
        workspace.vault.list().len(),
        workspace.folders().list().len()
    );
    Ok(())
}

fn run_store_health<S: RecordStore>(store: &S) -> Result<()> {
    let probe_key = "health/probe";
    let payload = b"ok";
    store.put(probe_key, payload)?;
    let round_trip = store.get(probe_key)?;
    store.delete(probe_key)?;

    if round_trip != payload {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
