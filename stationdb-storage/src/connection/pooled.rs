use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::params;
use std::sync::Arc;
use std::time::Duration;

use super::{ConnectionSource, ExtDbConnection, LockToken};
use crate::backend::{database_exists, ConnectionPool, DbConnection};
use stationdb_core::{StationDbError, StationDbResult};

/// Connections from the shared pool, guarded by the row lock in `ext_db`
#[derive(Debug)]
pub struct PooledSource {
    pool: Arc<ConnectionPool>,
    root_db: String,
    key: i32,
    store_name: String,
    lease: Option<Duration>,
    holder: Mutex<Option<LockToken>>,
}

#[derive(Debug)]
struct LockState {
    locked: bool,
    owner: String,
    time: String,
    deleted: bool,
}

impl PooledSource {
    pub fn new(
        pool: Arc<ConnectionPool>,
        root_db: impl Into<String>,
        key: i32,
        store_name: impl Into<String>,
        lease: Option<Duration>,
    ) -> Self {
        Self {
            pool,
            root_db: root_db.into(),
            key,
            store_name: store_name.into(),
            lease,
            holder: Mutex::new(None),
        }
    }

    fn read_lock_state(&self, conn: &DbConnection) -> StationDbResult<LockState> {
        conn.query_optional(
            "SELECT locked, lock_owner, lock_time, deleted FROM ext_db WHERE ext_db_key = ?1",
            [self.key],
            format!("reading lock state of data set {}", self.key),
            |row| {
                Ok(LockState {
                    locked: row.get(0)?,
                    owner: row.get(1)?,
                    time: row.get(2)?,
                    deleted: row.get(3)?,
                })
            },
        )?
        .ok_or_else(|| StationDbError::InvalidKey {
            root: self.root_db.clone(),
            key: self.key,
        })
    }

    fn lease_expired(&self, state: &LockState) -> bool {
        let Some(lease) = self.lease else {
            return false;
        };
        match DateTime::parse_from_rfc3339(&state.time) {
            Ok(taken) => {
                let age = Utc::now().signed_duration_since(taken.with_timezone(&Utc));
                age.to_std().map(|age| age >= lease).unwrap_or(false)
            }
            // A lock without a readable time predates leases; treat it as stale
            Err(_) => true,
        }
    }

    /// Check and optionally set the persisted lock while holding the write lock
    fn check_and_lock(&self, conn: &DbConnection, wants_lock: bool) -> StationDbResult<Option<LockToken>> {
        let state = self.read_lock_state(conn)?;
        if state.deleted {
            return Err(StationDbError::Deleted { key: self.key });
        }
        if state.locked {
            if self.lease_expired(&state) {
                tracing::warn!(
                    "Reclaiming expired lock on data set {} held by {}",
                    self.key,
                    state.owner
                );
            } else {
                return Err(StationDbError::Busy(format!(
                    "data set {} is locked by another session",
                    self.key
                )));
            }
        }
        if !wants_lock {
            if state.locked {
                conn.update(
                    "UPDATE ext_db SET locked = 0, lock_owner = '', lock_time = '' WHERE ext_db_key = ?1",
                    [self.key],
                    format!("clearing expired lock on data set {}", self.key),
                )?;
            }
            return Ok(None);
        }
        let token = LockToken::generate();
        conn.update(
            "UPDATE ext_db SET locked = 1, lock_owner = ?1, lock_time = ?2 WHERE ext_db_key = ?3",
            params![token.as_str(), Utc::now().to_rfc3339(), self.key],
            format!("locking data set {}", self.key),
        )?;
        Ok(Some(token))
    }
}

impl PooledSource {
    /// Run the check-then-set under the root database's write lock. The
    /// connection is left on the root database.
    fn acquire_locked(&self, wants_lock: bool) -> StationDbResult<(DbConnection, Option<LockToken>)> {
        if self.holder.lock().is_some() {
            return Err(StationDbError::Busy(format!(
                "data set {} is locked by this process",
                self.key
            )));
        }

        let conn = self.pool.acquire(&self.root_db)?;
        let locked = conn
            .begin_immediate(format!("locking ext_db for data set {}", self.key))
            .and_then(|_| self.check_and_lock(&conn, wants_lock));
        // The write lock is only held for the check-then-set
        let token = match locked {
            Ok(token) => match conn.commit("committing lock state") {
                Ok(()) => token,
                Err(e) => {
                    self.pool.release(conn);
                    return Err(e);
                }
            },
            Err(e) => {
                self.pool.release(conn);
                return Err(e);
            }
        };

        if let Some(token) = &token {
            *self.holder.lock() = Some(token.clone());
            tracing::debug!("Locked data set {} with token {}", self.key, token);
        }
        Ok((conn, token))
    }
}

impl ConnectionSource for PooledSource {
    fn connect(&self, wants_lock: bool) -> StationDbResult<ExtDbConnection> {
        let (mut conn, token) = self.acquire_locked(wants_lock)?;

        let switched = if database_exists(self.pool.data_dir(), &self.store_name) {
            conn.set_database(&self.store_name)
        } else {
            Err(StationDbError::NotFound(format!(
                "backing store {} of data set {}",
                self.store_name, self.key
            )))
        };
        match switched {
            Ok(()) => Ok(ExtDbConnection::pooled(conn, token)),
            Err(e) => {
                self.release(ExtDbConnection::pooled(conn, token))?;
                Err(e)
            }
        }
    }

    fn lock_index_row(&self) -> StationDbResult<ExtDbConnection> {
        let (conn, token) = self.acquire_locked(true)?;
        Ok(ExtDbConnection::pooled(conn, token))
    }

    fn release(&self, conn: ExtDbConnection) -> StationDbResult<()> {
        let Some((mut conn, token)) = conn.into_pooled() else {
            return Err(StationDbError::InvalidInput(
                "live connection returned to a pooled data set".to_string(),
            ));
        };
        let Some(token) = token else {
            self.pool.release(conn);
            return Ok(());
        };

        {
            let mut holder = self.holder.lock();
            if holder.as_ref() == Some(&token) {
                *holder = None;
            }
        }

        let cleared = conn.set_database(&self.root_db).and_then(|_| {
            conn.update(
                "UPDATE ext_db SET locked = 0, lock_owner = '', lock_time = '' \
                 WHERE ext_db_key = ?1 AND lock_owner = ?2",
                params![self.key, token.as_str()],
                format!("unlocking data set {}", self.key),
            )
        });
        self.pool.release(conn);
        match cleared? {
            0 => tracing::warn!(
                "Lock on data set {} was no longer held by token {}",
                self.key,
                token
            ),
            _ => tracing::debug!("Unlocked data set {}", self.key),
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        false
    }

    fn holds_lock(&self) -> bool {
        self.holder.lock().is_some()
    }

    fn force_unlock(&self) -> StationDbResult<bool> {
        *self.holder.lock() = None;
        let conn = self.pool.acquire(&self.root_db)?;
        let cleared = conn.update(
            "UPDATE ext_db SET locked = 0, lock_owner = '', lock_time = '' \
             WHERE ext_db_key = ?1 AND locked = 1",
            [self.key],
            format!("force-unlocking data set {}", self.key),
        );
        self.pool.release(conn);
        Ok(cleared? > 0)
    }
}
