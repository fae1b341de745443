//! Configuration types for StationDB

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::StationDbError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub locking: LockingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the root and backing-store database files
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Root database used when a command does not name one
    #[serde(default = "default_root_database")]
    pub root_database: String,
    /// Upper bound on idle connections kept by the standard pool
    #[serde(default = "default_max_idle_connections")]
    pub max_idle_connections: usize,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds before the data-set registry re-reads the index
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Maximum length in bytes of one batched INSERT statement
    #[serde(default = "default_max_statement_length")]
    pub max_statement_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Deadline for a whole transfer, body included; sized for multi-GB dumps
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
    /// Deadline for establishing the connection
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Soft-delete earlier downloads of the same format after a successful download
    #[serde(default = "default_delete_previous")]
    pub delete_previous: bool,
    /// Source archive URL per format, keyed by `FormatType::config_key`
    #[serde(default = "default_download_urls")]
    pub urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LiveConfig {
    /// Credentials file for the live server; defaults to $STATIONDB_HOME/live.toml
    #[serde(default)]
    pub credentials_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LockingConfig {
    /// Age after which a persisted lock may be reclaimed (0 = never)
    #[serde(default)]
    pub lease_secs: u64,
}

// Default value functions
fn default_root_database() -> String { "stationdb".to_string() }
fn default_max_idle_connections() -> usize { 8 }
fn default_busy_timeout_ms() -> u64 { 5000 }
fn default_cache_ttl_secs() -> u64 { 300 }
fn default_max_statement_length() -> usize { 1_000_000 }
fn default_download_timeout_secs() -> u64 { 3600 }
fn default_connect_timeout_secs() -> u64 { 30 }
fn default_delete_previous() -> bool { true }

fn default_download_urls() -> BTreeMap<String, String> {
    let mut urls = BTreeMap::new();
    urls.insert(
        "license_a".to_string(),
        "https://transition.fcc.gov/ftp/Bureaus/MB/Databases/cdbs/all-cdbs-files.zip".to_string(),
    );
    urls.insert(
        "license_a_fm".to_string(),
        "https://transition.fcc.gov/ftp/Bureaus/MB/Databases/cdbs/all-cdbs-files.zip".to_string(),
    );
    urls.insert(
        "license_b".to_string(),
        "https://enterpriseefiling.fcc.gov/dataentry/api/download/dbfile/Current_LMS_Dump.zip"
            .to_string(),
    );
    urls
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            root_database: default_root_database(),
            max_idle_connections: default_max_idle_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_statement_length: default_max_statement_length(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            delete_previous: default_delete_previous(),
            urls: default_download_urls(),
        }
    }
}

impl Config {
    pub fn data_dir(&self) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => crate::system::stationdb_data_dir(),
        }
    }

    pub fn live_credentials_path(&self) -> PathBuf {
        match &self.live.credentials_file {
            Some(path) => PathBuf::from(path),
            None => crate::system::stationdb_live_credentials_path(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn lock_lease(&self) -> Option<Duration> {
        match self.locking.lease_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, StationDbError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| StationDbError::Configuration(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

/// Load the config at `path`, falling back to defaults when the file does not exist.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, StationDbError> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        Ok(default_config())
    }
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), StationDbError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| StationDbError::Configuration(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.storage.data_dir, None);
        assert_eq!(config.storage.root_database, "stationdb");
        assert_eq!(config.storage.max_idle_connections, 8);
        assert_eq!(config.storage.busy_timeout_ms, 5000);

        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.import.max_statement_length, 1_000_000);

        assert_eq!(config.download.timeout_secs, 3600);
        assert_eq!(config.download.connect_timeout_secs, 30);
        assert!(config.download.delete_previous);
        assert!(config.download.urls.contains_key("license_a"));
        assert!(config.download.urls.contains_key("license_b"));

        assert_eq!(config.live.credentials_file, None);
        assert_eq!(config.locking.lease_secs, 0);
        assert_eq!(config.lock_lease(), None);
    }

    #[test]
    fn test_load_valid_config() {
        let toml_content = r#"
[storage]
data_dir = "/srv/stationdb"
root_database = "studies"
max_idle_connections = 2
busy_timeout_ms = 100

[cache]
ttl_secs = 10

[import]
max_statement_length = 4096

[download]
timeout_secs = 5
connect_timeout_secs = 1
delete_previous = false

[download.urls]
license_b = "http://localhost/lms.zip"

[live]
credentials_file = "/etc/stationdb/live.toml"

[locking]
lease_secs = 3600
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path()).unwrap();

        assert_eq!(config.storage.data_dir, Some("/srv/stationdb".to_string()));
        assert_eq!(config.data_dir(), PathBuf::from("/srv/stationdb"));
        assert_eq!(config.storage.root_database, "studies");
        assert_eq!(config.storage.max_idle_connections, 2);
        assert_eq!(config.cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.import.max_statement_length, 4096);
        assert!(!config.download.delete_previous);
        assert_eq!(config.download.urls.len(), 1);
        assert_eq!(
            config.download.urls.get("license_b").map(String::as_str),
            Some("http://localhost/lms.zip")
        );
        assert_eq!(
            config.live_credentials_path(),
            PathBuf::from("/etc/stationdb/live.toml")
        );
        assert_eq!(config.lock_lease(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_load_partial_config() {
        let toml_content = r#"
[cache]
ttl_secs = 1
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = load_config(temp_file.path()).unwrap();

        assert_eq!(config.cache.ttl_secs, 1);
        assert_eq!(config.storage.root_database, "stationdb");
        assert_eq!(config.import.max_statement_length, 1_000_000);
        assert!(config.download.urls.contains_key("license_a"));
    }

    #[test]
    fn test_load_invalid_config() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "this is not valid TOML {{").unwrap();

        match load_config(temp_file.path()).unwrap_err() {
            StationDbError::Configuration(msg) => {
                assert!(msg.contains("Failed to parse config"));
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        match load_config("/nonexistent/path/to/config.toml").unwrap_err() {
            StationDbError::Io(_) => {}
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.root_database, "stationdb");
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.storage.root_database = "other".to_string();
        config.locking.lease_secs = 60;
        config.download.delete_previous = false;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(temp_file.path(), &config).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.storage.root_database, "other");
        assert_eq!(loaded.locking.lease_secs, 60);
        assert!(!loaded.download.delete_previous);
        assert_eq!(loaded.download.urls, config.download.urls);
    }
}
