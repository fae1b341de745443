//! Connections to the live license-format-B server
//!
//! The pool is built at most once per service from a TOML credentials file.
//! A missing file, a missing key or a failed first connection disables live
//! mode for the lifetime of the service; nothing is retried.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::DbConnection;
use stationdb_core::StationDbResult;

pub const SUPPORTED_DRIVER: &str = "sqlite";

#[derive(Debug, Default, Deserialize)]
struct CredentialsFile {
    driver: Option<String>,
    host: Option<String>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

/// Validated server credentials
#[derive(Clone)]
pub struct LiveCredentials {
    pub driver: String,
    pub host: String,
    pub database: String,
    pub user: String,
}

impl std::fmt::Debug for LiveCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCredentials")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl LiveCredentials {
    /// Read credentials; `None` when the file or any key is absent
    pub fn load(path: &Path) -> Option<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!("No live credentials at {}: {}", path.display(), e);
                return None;
            }
        };
        let file: CredentialsFile = match toml::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Ignoring unreadable live credentials {}: {}", path.display(), e);
                return None;
            }
        };
        match (file.driver, file.host, file.database, file.user, file.password) {
            // SQLite needs no password, but a file without one is incomplete
            (Some(driver), Some(host), Some(database), Some(user), Some(_)) => Some(Self {
                driver,
                host,
                database,
                user,
            }),
            _ => {
                tracing::debug!("Live credentials {} are incomplete", path.display());
                None
            }
        }
    }
}

/// Idle stack plus the set of connections currently handed out
pub struct LivePool {
    credentials: LiveCredentials,
    busy_timeout: Duration,
    idle: Mutex<Vec<DbConnection>>,
    open: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
}

/// A connection borrowed from the live pool
#[derive(Debug)]
pub struct LiveConnection {
    pub(crate) id: u64,
    pub(crate) conn: DbConnection,
}

impl LivePool {
    /// Connect once to validate the credentials; the seed connection becomes
    /// the first idle entry.
    pub fn connect_seed(credentials: LiveCredentials, busy_timeout: Duration) -> Option<Self> {
        if credentials.driver != SUPPORTED_DRIVER {
            tracing::warn!(
                "Live server driver '{}' is not supported, live mode disabled",
                credentials.driver
            );
            return None;
        }
        let seed = match Self::handshake(&credentials, busy_timeout) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("Live server unavailable, live mode disabled: {}", e);
                return None;
            }
        };
        tracing::info!(
            "Connected to live server {} as {}",
            credentials.database,
            credentials.user
        );
        Some(Self {
            credentials,
            busy_timeout,
            idle: Mutex::new(vec![seed]),
            open: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn handshake(credentials: &LiveCredentials, busy_timeout: Duration) -> StationDbResult<DbConnection> {
        let conn = DbConnection::open(
            Path::new(&credentials.host),
            &credentials.database,
            busy_timeout,
            false,
        )?;
        conn.ping()?;
        Ok(conn)
    }

    pub fn credentials(&self) -> &LiveCredentials {
        &self.credentials
    }

    pub fn connect(&self) -> StationDbResult<LiveConnection> {
        let pooled = self.idle.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => Self::handshake(&self.credentials, self.busy_timeout)?,
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.open.lock().insert(id);
        Ok(LiveConnection { id, conn })
    }

    pub fn release(&self, live: LiveConnection) {
        if !self.open.lock().remove(&live.id) {
            tracing::warn!("Released live connection {} that was not open", live.id);
        }
        live.conn.rollback_if_open();
        self.idle.lock().push(live.conn);
    }

    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Lazily initialized live pool owned by the service
pub struct LiveSlot {
    credentials_path: PathBuf,
    busy_timeout: Duration,
    pool: OnceCell<Option<Arc<LivePool>>>,
}

impl LiveSlot {
    pub fn new(credentials_path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            busy_timeout,
            pool: OnceCell::new(),
        }
    }

    /// A slot that never provides a live pool
    pub fn disabled() -> Self {
        let slot = Self::new(PathBuf::new(), Duration::ZERO);
        let _ = slot.pool.set(None);
        slot
    }

    pub fn pool(&self) -> Option<Arc<LivePool>> {
        self.pool
            .get_or_init(|| {
                LiveCredentials::load(&self.credentials_path)
                    .and_then(|credentials| LivePool::connect_seed(credentials, self.busy_timeout))
                    .map(Arc::new)
            })
            .clone()
    }

    pub fn is_available(&self) -> bool {
        self.pool().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_credentials(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("live.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn create_server(dir: &Path) {
        let conn = DbConnection::open(dir, "lms", Duration::from_millis(50), true).unwrap();
        conn.execute_batch("CREATE TABLE facility (facility_id INTEGER)", "create")
            .unwrap();
    }

    fn credentials_body(dir: &Path) -> String {
        format!(
            "driver = \"sqlite\"\nhost = \"{}\"\ndatabase = \"lms\"\nuser = \"reader\"\npassword = \"secret\"\n",
            dir.display()
        )
    }

    #[test]
    fn test_missing_key_disables_live_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(dir.path(), "driver = \"sqlite\"\nhost = \"/tmp\"\n");
        assert!(LiveCredentials::load(&path).is_none());

        let slot = LiveSlot::new(path, Duration::from_millis(50));
        assert!(!slot.is_available());
    }

    #[test]
    fn test_failure_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_credentials(dir.path(), &credentials_body(dir.path()));
        let slot = LiveSlot::new(&path, Duration::from_millis(50));

        // Server file does not exist yet
        assert!(!slot.is_available());
        create_server(dir.path());
        assert!(!slot.is_available());
    }

    #[test]
    fn test_pool_reuses_idle_connections() {
        let dir = tempfile::tempdir().unwrap();
        create_server(dir.path());
        let path = write_credentials(dir.path(), &credentials_body(dir.path()));
        let slot = LiveSlot::new(&path, Duration::from_millis(50));
        let pool = slot.pool().unwrap();
        assert_eq!(pool.idle_count(), 1);

        let first = pool.connect().unwrap();
        let second = pool.connect().unwrap();
        assert_eq!(pool.open_count(), 2);
        assert_eq!(pool.idle_count(), 0);

        pool.release(first);
        pool.release(second);
        assert_eq!(pool.open_count(), 0);
        assert_eq!(pool.idle_count(), 2);
        assert!(format!("{:?}", pool.credentials()).contains("***"));
    }

    #[test]
    fn test_unsupported_driver() {
        let dir = tempfile::tempdir().unwrap();
        create_server(dir.path());
        let body = credentials_body(dir.path()).replace("sqlite", "oracle");
        let path = write_credentials(dir.path(), &body);
        assert!(!LiveSlot::new(path, Duration::from_millis(50)).is_available());
    }
}
