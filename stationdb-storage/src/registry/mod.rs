//! Registry of data-set handles per root database
//!
//! Each root database gets its own cache of handles, refreshed from the
//! `ext_db` index when older than the configured TTL or when a key lookup
//! misses. Refresh never drops a handle; it updates known handles in place
//! and adds new ones. The synthesized "most recent" handles are rebuilt on
//! every refresh.

mod handle;

pub use handle::{generate_id, store_name, ExtDb, ExtDbMeta};
use handle::ExtDbInit;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{database_exists, ConnectionPool};
use crate::connection::{LiveSource, PooledSource};
use crate::live::LiveSlot;
use crate::schema::{self, IndexRow};
use stationdb_core::{
    is_reserved_key, FormatType, RecordKind, StationDbError, StationDbResult, KEY_LIVE,
};

/// Criteria for [`Registry::list_handles`]
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub record_kind: Option<RecordKind>,
    pub format: Option<FormatType>,
    pub min_version: Option<i32>,
    pub include_generic: bool,
    pub include_deleted: bool,
    /// Leave out the live and "most recent" handles
    pub exclude_reserved: bool,
}

impl ListFilter {
    /// Every non-deleted handle, generic ones included
    pub fn all() -> Self {
        Self {
            include_generic: true,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: FormatType) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_record_kind(mut self, kind: RecordKind) -> Self {
        self.record_kind = Some(kind);
        self
    }

    pub fn with_min_version(mut self, version: i32) -> Self {
        self.min_version = Some(version);
        self
    }

    pub fn concrete_only(mut self) -> Self {
        self.exclude_reserved = true;
        self
    }

    fn matches(&self, handle: &ExtDb) -> bool {
        if handle.is_deleted() && !self.include_deleted {
            return false;
        }
        if handle.is_reserved() && self.exclude_reserved {
            return false;
        }
        if handle.is_generic() && !self.include_generic {
            return false;
        }
        if let Some(format) = self.format {
            if handle.format() != format {
                return false;
            }
        }
        if let Some(kind) = self.record_kind {
            if !handle.format().supports_record_kind(kind) {
                return false;
            }
        }
        if let Some(min) = self.min_version {
            if handle.version() < min {
                return false;
            }
        }
        true
    }
}

#[derive(Default)]
struct RootCache {
    refreshed_at: Option<Instant>,
    handles: BTreeMap<i32, Arc<ExtDb>>,
}

pub struct Registry {
    pool: Arc<ConnectionPool>,
    live: Arc<LiveSlot>,
    ttl: Duration,
    lease: Option<Duration>,
    roots: DashMap<String, Arc<Mutex<RootCache>>>,
}

impl Registry {
    pub fn new(
        pool: Arc<ConnectionPool>,
        live: Arc<LiveSlot>,
        ttl: Duration,
        lease: Option<Duration>,
    ) -> Self {
        Self {
            pool,
            live,
            ttl,
            lease,
            roots: DashMap::new(),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn live(&self) -> &LiveSlot {
        &self.live
    }

    fn root_cache(&self, root_db: &str) -> Arc<Mutex<RootCache>> {
        self.roots
            .entry(root_db.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RootCache::default())))
            .clone()
    }

    fn is_stale(&self, cache: &RootCache) -> bool {
        match cache.refreshed_at {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        }
    }

    /// Mark the cache of `root_db` stale so the next lookup re-reads the index
    pub fn invalidate(&self, root_db: &str) {
        if let Some(cache) = self.roots.get(root_db) {
            cache.lock().refreshed_at = None;
            tracing::debug!("Invalidated registry cache for {}", root_db);
        }
    }

    pub fn refresh(&self, root_db: &str) -> StationDbResult<()> {
        let cache = self.root_cache(root_db);
        let mut cache = cache.lock();
        self.refresh_locked(root_db, &mut cache)
    }

    fn refresh_locked(&self, root_db: &str, cache: &mut RootCache) -> StationDbResult<()> {
        if !database_exists(self.pool.data_dir(), root_db) {
            return Err(StationDbError::Configuration(format!(
                "root database '{}' is not initialized",
                root_db
            )));
        }
        let conn = self.pool.acquire(root_db)?;
        let rows = schema::read_index(&conn);
        self.pool.release(conn);
        let rows = rows?;

        let mut added = 0;
        for row in &rows {
            let meta = ExtDbMeta {
                name: row.name.clone(),
                description: row.description.clone(),
                deleted: row.deleted,
                locked: row.locked,
            };
            match cache.handles.get(&row.key) {
                Some(existing) => existing.update_meta(meta),
                None => {
                    cache
                        .handles
                        .insert(row.key, Arc::new(self.concrete_handle(root_db, row, meta)));
                    added += 1;
                }
            }
        }

        self.rebuild_virtual(cache, &rows);

        if !cache.handles.contains_key(&KEY_LIVE) {
            if let Some(live) = self.live_handle(root_db) {
                cache.handles.insert(KEY_LIVE, Arc::new(live));
            }
        }

        cache.refreshed_at = Some(Instant::now());
        tracing::debug!(
            "Refreshed registry for {}: {} rows, {} new",
            root_db,
            rows.len(),
            added
        );
        Ok(())
    }

    fn concrete_handle(&self, root_db: &str, row: &IndexRow, meta: ExtDbMeta) -> ExtDb {
        let store = store_name(root_db, row.format, row.key);
        let source = PooledSource::new(self.pool.clone(), root_db, row.key, store.clone(), self.lease);
        ExtDb::new(ExtDbInit {
            key: row.key,
            root_db: root_db.to_string(),
            format: row.format,
            backing_key: row.key,
            version: row.version,
            id: row.id.clone(),
            source_date: row.source_date,
            import_date: Some(row.import_date),
            is_download: row.is_download,
            store_name: store,
            meta,
            source: Arc::new(source),
        })
    }

    /// Point each "most recent" key at the newest non-deleted data set of its
    /// category. Rows arrive newest insert first and only a strictly newer
    /// content date displaces a candidate, so equal dates favor the latest
    /// insert.
    fn rebuild_virtual(&self, cache: &mut RootCache, rows: &[IndexRow]) {
        cache.handles.retain(|_, handle| !handle.is_virtual());

        let mut newest: BTreeMap<i32, Arc<ExtDb>> = BTreeMap::new();
        for row in rows {
            let Some(virtual_key) = row.format.most_recent_key() else {
                continue;
            };
            let Some(candidate) = cache.handles.get(&row.key) else {
                continue;
            };
            if candidate.is_deleted() {
                continue;
            }
            let replace = match newest.get(&virtual_key) {
                None => true,
                Some(current) => candidate.source_date() > current.source_date(),
            };
            if replace {
                newest.insert(virtual_key, candidate.clone());
            }
        }

        for (virtual_key, concrete) in newest {
            cache
                .handles
                .insert(virtual_key, Arc::new(ExtDb::mirror(&concrete, virtual_key)));
        }
    }

    fn live_handle(&self, root_db: &str) -> Option<ExtDb> {
        let pool = self.live.pool()?;
        let credentials = pool.credentials().clone();
        let format = FormatType::LicenseBLive;
        let today = Utc::now().date_naive();
        Some(ExtDb::new(ExtDbInit {
            key: KEY_LIVE,
            root_db: root_db.to_string(),
            format,
            backing_key: KEY_LIVE,
            version: format.current_version(),
            id: format!("{} live", format.id_code()),
            source_date: today,
            import_date: None,
            is_download: false,
            store_name: credentials.database.clone(),
            meta: ExtDbMeta {
                name: "Live license B server".to_string(),
                description: format!("{} on {}", credentials.database, credentials.host),
                deleted: false,
                locked: false,
            },
            source: Arc::new(LiveSource::new(pool)),
        }))
    }

    /// Look a handle up by key.
    ///
    /// A miss forces a refresh. A concrete key still missing afterwards is
    /// `InvalidKey`; a reserved key that is not currently synthesized is
    /// `NotFound`.
    pub fn resolve_by_key(
        &self,
        root_db: &str,
        key: i32,
        include_deleted: bool,
    ) -> StationDbResult<Arc<ExtDb>> {
        let cache = self.root_cache(root_db);
        let handle = {
            let mut cache = cache.lock();
            if self.is_stale(&cache) {
                self.refresh_locked(root_db, &mut cache)?;
            }
            match cache.handles.get(&key) {
                Some(handle) => handle.clone(),
                None => {
                    self.refresh_locked(root_db, &mut cache)?;
                    match cache.handles.get(&key) {
                        Some(handle) => handle.clone(),
                        None if is_reserved_key(key) => {
                            return Err(StationDbError::NotFound(format!(
                                "data set {} in root database '{}'",
                                key, root_db
                            )))
                        }
                        None => {
                            return Err(StationDbError::InvalidKey {
                                root: root_db.to_string(),
                                key,
                            })
                        }
                    }
                }
            }
        };

        if handle.is_deleted() && !include_deleted {
            return Err(StationDbError::Deleted { key });
        }
        Ok(handle)
    }

    /// Case-insensitive lookup among non-deleted concrete data sets
    pub fn resolve_by_name(&self, root_db: &str, name: &str) -> StationDbResult<Arc<ExtDb>> {
        let cache = self.root_cache(root_db);
        let mut cache = cache.lock();
        if self.is_stale(&cache) {
            self.refresh_locked(root_db, &mut cache)?;
        }
        cache
            .handles
            .values()
            .filter(|handle| !handle.is_reserved() && !handle.is_deleted())
            .find(|handle| {
                let candidate = handle.name();
                !candidate.is_empty() && candidate.eq_ignore_ascii_case(name)
            })
            .cloned()
            .ok_or_else(|| StationDbError::NotFound(format!("data set named '{}'", name)))
    }

    /// Handles matching `filter`, in listing order: format priority, then
    /// reserved keys ascending, then concrete keys newest first.
    pub fn list_handles(&self, root_db: &str, filter: &ListFilter) -> StationDbResult<Vec<Arc<ExtDb>>> {
        let cache = self.root_cache(root_db);
        let mut handles: Vec<Arc<ExtDb>> = {
            let mut cache = cache.lock();
            if self.is_stale(&cache) {
                self.refresh_locked(root_db, &mut cache)?;
            }
            cache
                .handles
                .values()
                .filter(|handle| filter.matches(handle))
                .cloned()
                .collect()
        };

        handles.sort_by(|a, b| {
            a.format()
                .list_priority()
                .cmp(&b.format().list_priority())
                .then_with(|| b.is_reserved().cmp(&a.is_reserved()))
                .then_with(|| {
                    if a.is_reserved() {
                        a.key().cmp(&b.key())
                    } else {
                        b.key().cmp(&a.key())
                    }
                })
        });
        Ok(handles)
    }
}
