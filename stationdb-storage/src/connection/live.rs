use std::sync::Arc;

use super::{ConnectionSource, ExtDbConnection};
use crate::live::LivePool;
use stationdb_core::{StationDbError, StationDbResult};

/// Connections to the live server. The server is maintained elsewhere, so
/// lock requests are ignored.
#[derive(Clone)]
pub struct LiveSource {
    pool: Arc<LivePool>,
}

impl std::fmt::Debug for LiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSource")
            .field("database", &self.pool.credentials().database)
            .finish()
    }
}

impl LiveSource {
    pub fn new(pool: Arc<LivePool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<LivePool> {
        &self.pool
    }
}

impl ConnectionSource for LiveSource {
    fn connect(&self, wants_lock: bool) -> StationDbResult<ExtDbConnection> {
        if wants_lock {
            tracing::debug!("Lock requested on the live server, ignoring");
        }
        Ok(ExtDbConnection::live(self.pool.connect()?))
    }

    fn lock_index_row(&self) -> StationDbResult<ExtDbConnection> {
        Err(StationDbError::InvalidInput(
            "the live server has no index row to lock".to_string(),
        ))
    }

    fn release(&self, conn: ExtDbConnection) -> StationDbResult<()> {
        let live = conn.into_live().ok_or_else(|| {
            StationDbError::InvalidInput("pooled connection returned to the live server".to_string())
        })?;
        self.pool.release(live);
        Ok(())
    }

    fn is_live(&self) -> bool {
        true
    }

    fn holds_lock(&self) -> bool {
        false
    }

    fn force_unlock(&self) -> StationDbResult<bool> {
        Ok(false)
    }
}
