use std::path::PathBuf;
use std::sync::OnceLock;

// Cache the paths to avoid repeated environment lookups
static STATIONDB_HOME: OnceLock<PathBuf> = OnceLock::new();
static STATIONDB_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static STATIONDB_WORKSPACE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Get the StationDB home directory
/// Checks STATIONDB_HOME environment variable, falls back to ${HOME}/.stationdb
pub fn stationdb_home() -> PathBuf {
    STATIONDB_HOME
        .get_or_init(|| {
            if let Ok(path) = std::env::var("STATIONDB_HOME") {
                PathBuf::from(path)
            } else {
                let home = std::env::var("HOME").unwrap_or_else(|_| {
                    std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string())
                });
                PathBuf::from(home).join(".stationdb")
            }
        })
        .clone()
}

/// Get the directory holding root and backing-store database files
/// Checks STATIONDB_DATA_DIR environment variable, falls back to STATIONDB_HOME/data
pub fn stationdb_data_dir() -> PathBuf {
    STATIONDB_DATA_DIR
        .get_or_init(|| {
            if let Ok(path) = std::env::var("STATIONDB_DATA_DIR") {
                PathBuf::from(path)
            } else {
                stationdb_home().join("data")
            }
        })
        .clone()
}

/// Get the workspace directory for temporary download archives
/// Checks STATIONDB_WORKSPACE_DIR environment variable, falls back to $TMPDIR/stationdb or /tmp/stationdb
pub fn stationdb_workspace_dir() -> PathBuf {
    STATIONDB_WORKSPACE_DIR
        .get_or_init(|| {
            if let Ok(path) = std::env::var("STATIONDB_WORKSPACE_DIR") {
                PathBuf::from(path)
            } else if let Ok(tmpdir) = std::env::var("TMPDIR") {
                PathBuf::from(tmpdir).join("stationdb")
            } else {
                PathBuf::from("/tmp/stationdb")
            }
        })
        .clone()
}

/// Default configuration file: STATIONDB_HOME/config.toml
pub fn stationdb_config_path() -> PathBuf {
    stationdb_home().join("config.toml")
}

/// Default live-server credentials file: STATIONDB_HOME/live.toml
pub fn stationdb_live_credentials_path() -> PathBuf {
    stationdb_home().join("live.toml")
}
