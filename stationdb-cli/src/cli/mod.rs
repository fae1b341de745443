pub mod commands;
pub mod context;
pub mod interrupt;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stationdb",
    version,
    about = "Manage external broadcast-station reference databases",
    long_about = "Manage external broadcast-station reference databases.\n\n\
                  StationDB keeps a registry of imported station-license and wireless data sets, \
                  imports and downloads new ones, and coordinates access to them across processes."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to $STATIONDB_HOME/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root database to operate on (defaults to storage.root_database)
    #[arg(long, global = true, value_name = "NAME")]
    pub root: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the root database and a default configuration
    Init(commands::init::InitArgs),

    /// List registered data sets
    List(commands::list::ListArgs),

    /// Show details of one data set
    Info(commands::info::InfoArgs),

    /// Import a flat-file dump from a directory or zip archive
    Import(commands::import::ImportArgs),

    /// Download the published dump of a format and import it
    Download(commands::download::DownloadArgs),

    /// Soft-delete a data set and drop its data
    Delete(commands::manage::DeleteArgs),

    /// Set or clear the name of a data set
    Rename(commands::manage::RenameArgs),

    /// Set the description of a data set
    Describe(commands::manage::DescribeArgs),

    /// Clear a lock left behind by a crashed process
    Unlock(commands::manage::UnlockArgs),

    /// Create and fill user-composed data sets
    Generic {
        #[command(subcommand)]
        command: commands::generic::GenericCommands,
    },

    /// Search imported data sets
    Search {
        #[command(subcommand)]
        command: commands::search::SearchCommands,
    },
}
