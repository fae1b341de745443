//! Test environment management
//!
//! Provides isolated data directories with automatic cleanup using RAII.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stationdb_core::{Config, FormatType};
use stationdb_storage::StationDb;

/// Configuration for test environment
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Root database created on setup
    pub root_db: String,
    pub cache_ttl_secs: u64,
    pub lease_secs: u64,
    pub busy_timeout_ms: u64,
    pub max_statement_length: usize,
    /// Name of a live-server database to create and point the credentials at
    pub live_database: Option<String>,
    /// Download source URLs, keyed like `[download.urls]`
    pub download_urls: Vec<(String, String)>,
    pub delete_previous: bool,
    /// Preserve the directory after the test (for debugging)
    pub preserve: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            root_db: "stationdb".to_string(),
            cache_ttl_secs: 300,
            lease_secs: 0,
            busy_timeout_ms: 50,
            max_statement_length: 1_000_000,
            live_database: None,
            download_urls: Vec::new(),
            delete_previous: true,
            preserve: false,
        }
    }
}

impl TestConfig {
    pub fn with_live(mut self, database: impl Into<String>) -> Self {
        self.live_database = Some(database.into());
        self
    }

    pub fn with_lease(mut self, secs: u64) -> Self {
        self.lease_secs = secs;
        self
    }

    /// Point downloads of `format` at `url` (a mock server in tests)
    pub fn with_download_url(mut self, format: FormatType, url: impl Into<String>) -> Self {
        self.download_urls
            .push((format.config_key().to_string(), url.into()));
        self
    }

    pub fn keep_previous_downloads(mut self) -> Self {
        self.delete_previous = false;
        self
    }

    /// How long a connection waits on another process's write lock
    pub fn with_busy_timeout(mut self, ms: u64) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    pub fn with_max_statement_length(mut self, len: usize) -> Self {
        self.max_statement_length = len;
        self
    }
}

/// Isolated test environment with automatic cleanup
pub struct TestEnvironment {
    temp_dir: Option<TempDir>,
    root_path: PathBuf,
    config: Config,
    test_config: TestConfig,
    db: StationDb,
}

impl TestEnvironment {
    /// Create a new test environment with default config
    pub fn new() -> Result<Self> {
        Self::with_config(TestConfig::default())
    }

    /// Create a new test environment with custom config
    pub fn with_config(test_config: TestConfig) -> Result<Self> {
        let temp_dir = TempDir::with_prefix("stationdb-test")
            .context("Failed to create temporary directory")?;
        let root_path = temp_dir.path().to_path_buf();

        std::fs::create_dir_all(root_path.join("data"))?;
        std::fs::create_dir_all(root_path.join("input"))?;
        std::fs::create_dir_all(root_path.join("workspace"))?;

        let credentials = root_path.join("live.toml");
        if let Some(database) = &test_config.live_database {
            let live_dir = root_path.join("live");
            std::fs::create_dir_all(&live_dir)?;
            std::fs::write(live_dir.join(format!("{}.sqlite", database)), b"")?;
            std::fs::write(
                &credentials,
                format!(
                    "driver = \"sqlite\"\nhost = \"{}\"\ndatabase = \"{}\"\nuser = \"tester\"\npassword = \"secret\"\n",
                    live_dir.display(),
                    database
                ),
            )?;
        }

        let mut config = Config::default();
        config.storage.data_dir = Some(root_path.join("data").to_string_lossy().to_string());
        config.storage.root_database = test_config.root_db.clone();
        config.storage.busy_timeout_ms = test_config.busy_timeout_ms;
        config.cache.ttl_secs = test_config.cache_ttl_secs;
        config.import.max_statement_length = test_config.max_statement_length;
        config.locking.lease_secs = test_config.lease_secs;
        config.live.credentials_file = Some(credentials.to_string_lossy().to_string());
        // Never reach the real servers from a test
        config.download.urls = test_config.download_urls.iter().cloned().collect();
        config.download.delete_previous = test_config.delete_previous;
        config.download.timeout_secs = 5;
        config.download.connect_timeout_secs = 2;

        let db = StationDb::open(config.clone()).context("Failed to open StationDb")?;
        db.initialize_root(&test_config.root_db)?;

        Ok(Self {
            temp_dir: Some(temp_dir),
            root_path,
            config,
            test_config,
            db,
        })
    }

    pub fn db(&self) -> &StationDb {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root_db(&self) -> &str {
        &self.test_config.root_db
    }

    /// Get the root path of the test environment
    pub fn root(&self) -> &Path {
        &self.root_path
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root_path.join("data")
    }

    /// Scratch directory for dumps handed to an import
    pub fn input_dir(&self) -> PathBuf {
        self.root_path.join("input")
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.root_path.join("workspace")
    }

    /// Path of the live-server database file, if one was configured
    pub fn live_database_path(&self) -> Option<PathBuf> {
        self.test_config
            .live_database
            .as_ref()
            .map(|db| self.root_path.join("live").join(format!("{}.sqlite", db)))
    }

    /// Open a second service on the same data directory, as another
    /// process would
    pub fn open_peer(&self) -> Result<StationDb> {
        StationDb::open(self.config.clone()).context("Failed to open peer StationDb")
    }

    /// Create a subdirectory in the test environment
    pub fn create_dir(&self, name: &str) -> Result<PathBuf> {
        let path = self.root_path.join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Manually preserve the environment (for debugging)
    pub fn preserve(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            let path = temp_dir.keep();
            println!("Test environment preserved at: {}", path.display());
        }
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        if self.test_config.preserve {
            self.preserve();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creation() {
        let env = TestEnvironment::new().unwrap();
        assert!(env.root().exists());
        assert!(env.data_dir().exists());
        assert!(env.db().root_exists(env.root_db()).unwrap());
        assert!(!env.db().registry().live().is_available());
    }

    #[test]
    fn test_environment_isolation() {
        let env1 = TestEnvironment::new().unwrap();
        let env2 = TestEnvironment::new().unwrap();
        assert_ne!(env1.root(), env2.root());
        assert_ne!(env1.data_dir(), env2.data_dir());
    }

    #[test]
    fn test_live_database_is_reachable() {
        let env = TestEnvironment::with_config(TestConfig::default().with_live("lms_live")).unwrap();
        assert!(env.live_database_path().unwrap().exists());
        assert!(env.db().registry().live().is_available());
    }
}
