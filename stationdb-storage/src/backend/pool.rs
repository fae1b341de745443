use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::DbConnection;
use stationdb_core::StationDbResult;

/// Shared pool of connections into one data directory.
///
/// Idle connections are kept on a stack bounded by `max_idle`; a connection
/// returned while the stack is full is closed.
#[derive(Debug)]
pub struct ConnectionPool {
    data_dir: PathBuf,
    busy_timeout: Duration,
    max_idle: usize,
    idle: Mutex<Vec<DbConnection>>,
}

impl ConnectionPool {
    pub fn new(data_dir: impl Into<PathBuf>, busy_timeout: Duration, max_idle: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            busy_timeout,
            max_idle,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Take a connection pointed at `database`
    pub fn acquire(&self, database: &str) -> StationDbResult<DbConnection> {
        let pooled = self.idle.lock().pop();
        match pooled {
            Some(mut conn) => {
                conn.set_database(database)?;
                Ok(conn)
            }
            None => {
                tracing::debug!("Opening new connection to {}", database);
                DbConnection::open(&self.data_dir, database, self.busy_timeout, true)
            }
        }
    }

    pub fn release(&self, conn: DbConnection) {
        conn.rollback_if_open();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}
