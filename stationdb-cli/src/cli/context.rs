use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;

use stationdb_core::config::load_config_or_default;
use stationdb_core::{stationdb_config_path, Config, StationDbError};
use stationdb_storage::{ExtDb, StationDb};

use super::Cli;

/// Settings shared by every command: the loaded configuration and the root
/// database to work on
pub struct Context {
    pub config: Config,
    pub config_path: PathBuf,
    pub root: String,
    pub verbose: u8,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config_path = cli.config.clone().unwrap_or_else(stationdb_config_path);
        let config = load_config_or_default(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| config.storage.root_database.clone());
        Ok(Self {
            config,
            config_path,
            root,
            verbose: cli.verbose,
        })
    }

    pub fn open(&self) -> Result<StationDb> {
        Ok(StationDb::open(self.config.clone())?)
    }

    /// Open the service and check the root database has been initialized
    pub fn open_initialized(&self) -> Result<StationDb> {
        self.check_root(self.open()?)
    }

    pub fn check_root(&self, db: StationDb) -> Result<StationDb> {
        if !db.root_exists(&self.root)? {
            return Err(StationDbError::Configuration(format!(
                "root database '{}' is not initialized, run 'stationdb init' first",
                self.root
            ))
            .into());
        }
        Ok(db)
    }
}

/// Resolve a data set given by key or by name
pub fn resolve_reference(db: &StationDb, root: &str, reference: &str) -> Result<Arc<ExtDb>> {
    let handle = match reference.trim().parse::<i32>() {
        Ok(key) => db.resolve(root, key, false)?,
        Err(_) => db.resolve_by_name(root, reference.trim())?,
    };
    Ok(handle)
}
