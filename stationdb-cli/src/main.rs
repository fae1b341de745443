use clap::Parser;
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;

use crate::cli::context::Context;
use crate::cli::{commands, Cli, Commands};
use stationdb_core::StationDbError;

fn main() {
    let cli = Cli::parse();

    // STATIONDB_LOG wins over -v
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let log_level = std::env::var("STATIONDB_LOG").unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(exit_code(&e));
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::from_cli(&cli)?;
    match cli.command {
        Commands::Init(args) => commands::init::run(args, &ctx),
        Commands::List(args) => commands::list::run(args, &ctx),
        Commands::Info(args) => commands::info::run(args, &ctx),
        Commands::Import(args) => commands::import::run(args, &ctx),
        Commands::Download(args) => commands::download::run(args, &ctx),
        Commands::Delete(args) => commands::manage::delete(args, &ctx),
        Commands::Rename(args) => commands::manage::rename(args, &ctx),
        Commands::Describe(args) => commands::manage::describe(args, &ctx),
        Commands::Unlock(args) => commands::manage::unlock(args, &ctx),
        Commands::Generic { command } => commands::generic::run(command, &ctx),
        Commands::Search { command } => commands::search::run(command, &ctx),
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<StationDbError>() {
        Some(StationDbError::Configuration(_)) => 2,
        Some(StationDbError::Io(_)) => 3,
        Some(StationDbError::MalformedRecord { .. })
        | Some(StationDbError::SchemaMismatch(_))
        | Some(StationDbError::Serialization(_)) => 4,
        Some(StationDbError::Database { .. }) => 5,
        Some(StationDbError::Busy(_)) => 6,
        Some(StationDbError::Cancelled) => 130,
        _ => 1,
    }
}
