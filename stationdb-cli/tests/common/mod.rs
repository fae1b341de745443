#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stationdb_core::Config;
use stationdb_storage::StationDb;
use stationdb_test::{write_dump, DumpFile};

/// A StationDB home directory that lives as long as the test
pub struct CliEnv {
    pub home: TempDir,
}

impl CliEnv {
    pub fn new() -> Result<Self> {
        Ok(Self {
            home: TempDir::with_prefix("stationdb-cli")?,
        })
    }

    /// Environment with `stationdb init` already run
    pub fn initialized() -> Result<Self> {
        let env = Self::new()?;
        env.cmd().arg("init").assert().success();
        Ok(env)
    }

    pub fn path(&self) -> &Path {
        self.home.path()
    }

    /// The binary, pointed at this home and isolated from the caller's environment
    pub fn cmd(&self) -> Command {
        let mut cmd = stationdb_cmd();
        cmd.env("STATIONDB_HOME", self.path())
            .env("STATIONDB_WORKSPACE_DIR", self.path().join("workspace"))
            .env_remove("STATIONDB_DATA_DIR")
            .env_remove("STATIONDB_LOG");
        cmd
    }

    pub fn write_dump(&self, name: &str, files: &[DumpFile]) -> Result<PathBuf> {
        let dir = self.path().join("input").join(name);
        write_dump(&dir, files)?;
        Ok(dir)
    }

    /// Open the data directory in-process, as another program would
    pub fn open_service(&self) -> Result<StationDb> {
        let mut config = Config::default();
        config.storage.data_dir = Some(self.path().join("data").to_string_lossy().to_string());
        config.live.credentials_file = Some(self.path().join("live.toml").to_string_lossy().to_string());
        Ok(StationDb::open(config)?)
    }
}

pub fn stationdb_cmd() -> Command {
    Command::cargo_bin("stationdb").expect("stationdb binary is built for integration tests")
}
