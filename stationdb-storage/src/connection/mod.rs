//! Connection sources and advisory locking
//!
//! A data-set handle reaches its backing store through a [`ConnectionSource`].
//! Imported and generic data sets use [`PooledSource`], which layers the
//! persisted advisory lock on top of the shared [`ConnectionPool`]. The live
//! server handle uses [`LiveSource`].
//!
//! [`ConnectionPool`]: crate::backend::ConnectionPool

mod live;
mod pooled;

pub use live::LiveSource;
pub use pooled::PooledSource;

use std::fmt;
use std::ops::Deref;

use crate::backend::DbConnection;
use crate::live::LiveConnection;
use stationdb_core::StationDbResult;

/// Owner token written into the index row while a lock is held
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub(crate) fn generate() -> Self {
        LockToken(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
enum Inner {
    Pooled(DbConnection),
    Live(LiveConnection),
}

/// An open connection to a data set's backing store.
///
/// Must be handed back through the handle's `release`; a lock taken with the
/// connection is cleared there.
#[derive(Debug)]
pub struct ExtDbConnection {
    inner: Inner,
    lock: Option<LockToken>,
}

impl ExtDbConnection {
    pub(crate) fn pooled(conn: DbConnection, lock: Option<LockToken>) -> Self {
        Self {
            inner: Inner::Pooled(conn),
            lock,
        }
    }

    pub(crate) fn live(conn: LiveConnection) -> Self {
        Self {
            inner: Inner::Live(conn),
            lock: None,
        }
    }

    pub fn holds_lock(&self) -> bool {
        self.lock.is_some()
    }

    pub fn is_live(&self) -> bool {
        matches!(self.inner, Inner::Live(_))
    }

    pub(crate) fn into_pooled(self) -> Option<(DbConnection, Option<LockToken>)> {
        match self.inner {
            Inner::Pooled(conn) => Some((conn, self.lock)),
            Inner::Live(_) => None,
        }
    }

    pub(crate) fn into_live(self) -> Option<LiveConnection> {
        match self.inner {
            Inner::Live(conn) => Some(conn),
            Inner::Pooled(_) => None,
        }
    }
}

impl Deref for ExtDbConnection {
    type Target = DbConnection;

    fn deref(&self) -> &DbConnection {
        match &self.inner {
            Inner::Pooled(conn) => conn,
            Inner::Live(live) => &live.conn,
        }
    }
}

/// How a handle obtains and returns connections
pub trait ConnectionSource: Send + Sync + fmt::Debug {
    /// Open a connection, optionally taking the advisory lock.
    ///
    /// Fails with `Busy` while another holder has the lock.
    fn connect(&self, wants_lock: bool) -> StationDbResult<ExtDbConnection>;

    /// Take the advisory lock without opening the backing store. The
    /// connection stays on the root database.
    fn lock_index_row(&self) -> StationDbResult<ExtDbConnection>;

    /// Return a connection, clearing any lock it carries
    fn release(&self, conn: ExtDbConnection) -> StationDbResult<()>;

    fn is_live(&self) -> bool;

    /// Whether a connection of this process currently holds the lock
    fn holds_lock(&self) -> bool;

    /// Clear the persisted lock regardless of owner. Returns true when a lock
    /// was set.
    fn force_unlock(&self) -> StationDbResult<bool>;
}
