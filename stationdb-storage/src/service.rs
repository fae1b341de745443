//! Process-scoped entry point tying the pools, the registry and the
//! pipelines together

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{database_exists, drop_database, ConnectionPool};
use crate::generic::{self, GenericSession};
use crate::import::{format_spec, FormatSpec, ImportEvent, ImportOutcome, ImportRequest, ImportSource, Importer};
use crate::live::LiveSlot;
use crate::registry::{ExtDb, ListFilter, Registry};
use crate::schema;
use crate::search::{self, AmStation, AntennaMatch};
use stationdb_core::{is_reserved_key, CancelFlag, Config, FormatType, StationDbError, StationDbResult};

/// Result of an import once the new data set is registered
#[derive(Debug, Clone)]
pub struct Imported {
    pub handle: Arc<ExtDb>,
    pub outcome: ImportOutcome,
}

pub struct StationDb {
    config: Config,
    pool: Arc<ConnectionPool>,
    registry: Registry,
}

impl StationDb {
    pub fn open(config: Config) -> StationDbResult<Self> {
        let busy_timeout = Duration::from_millis(config.storage.busy_timeout_ms);
        let live = LiveSlot::new(config.live_credentials_path(), busy_timeout);
        Self::open_with_live(config, live)
    }

    /// Open with an explicit live slot, e.g. [`LiveSlot::disabled`]
    pub fn open_with_live(config: Config, live: LiveSlot) -> StationDbResult<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let pool = Arc::new(ConnectionPool::new(
            &data_dir,
            Duration::from_millis(config.storage.busy_timeout_ms),
            config.storage.max_idle_connections,
        ));
        let registry = Registry::new(
            pool.clone(),
            Arc::new(live),
            config.cache_ttl(),
            config.lock_lease(),
        );
        tracing::debug!("Opened StationDB at {}", data_dir.display());
        Ok(Self {
            config,
            pool,
            registry,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn default_root(&self) -> &str {
        &self.config.storage.root_database
    }

    /// Create the index tables of `root_db`; safe to repeat
    pub fn initialize_root(&self, root_db: &str) -> StationDbResult<()> {
        let conn = self.pool.acquire(root_db)?;
        let result = schema::initialize_root(&conn);
        self.pool.release(conn);
        result?;
        self.registry.invalidate(root_db);
        tracing::info!("Initialized root database {}", root_db);
        Ok(())
    }

    pub fn root_exists(&self, root_db: &str) -> StationDbResult<bool> {
        if !database_exists(self.pool.data_dir(), root_db) {
            return Ok(false);
        }
        let conn = self.pool.acquire(root_db)?;
        let initialized = schema::is_initialized(&conn);
        self.pool.release(conn);
        initialized
    }

    pub fn resolve(&self, root_db: &str, key: i32, include_deleted: bool) -> StationDbResult<Arc<ExtDb>> {
        self.registry.resolve_by_key(root_db, key, include_deleted)
    }

    pub fn resolve_by_name(&self, root_db: &str, name: &str) -> StationDbResult<Arc<ExtDb>> {
        self.registry.resolve_by_name(root_db, name)
    }

    pub fn list(&self, root_db: &str, filter: &ListFilter) -> StationDbResult<Vec<Arc<ExtDb>>> {
        self.registry.list_handles(root_db, filter)
    }

    /// Import a flat-file dump of `format`
    pub fn import(
        &self,
        format: FormatType,
        source: &ImportSource,
        request: &ImportRequest,
        cancel: CancelFlag,
        progress: Option<&(dyn Fn(&ImportEvent) + Sync)>,
    ) -> StationDbResult<Imported> {
        let spec = format_spec(format).ok_or_else(|| {
            StationDbError::InvalidInput(format!("{} data sets cannot be imported", format))
        })?;
        self.import_with_spec(spec, source, request, cancel, progress)
    }

    /// Import with a caller-supplied file layout
    pub fn import_with_spec(
        &self,
        spec: &FormatSpec,
        source: &ImportSource,
        request: &ImportRequest,
        cancel: CancelFlag,
        progress: Option<&(dyn Fn(&ImportEvent) + Sync)>,
    ) -> StationDbResult<Imported> {
        let mut importer = Importer::new(&self.pool, self.config.import.max_statement_length)
            .with_cancel(cancel);
        if let Some(progress) = progress {
            importer = importer.with_progress(progress);
        }
        let outcome = importer.run(spec, source, request)?;
        self.registry.invalidate(&request.root_db);
        let handle = self.registry.resolve_by_key(&request.root_db, outcome.key, false)?;
        Ok(Imported { handle, outcome })
    }

    /// Set the name of a data set. Names are unique, ignoring case, among
    /// data sets that are not deleted; an empty name clears it.
    pub fn rename(&self, root_db: &str, key: i32, name: &str) -> StationDbResult<()> {
        let handle = self.mutable_handle(root_db, key)?;
        let name = name.trim();
        let conn = self.pool.acquire(root_db)?;
        let result = schema::with_write_lock(&conn, "renaming data set", || {
            if !name.is_empty() && schema::name_in_use(&conn, name, Some(key))? {
                return Err(StationDbError::InvalidInput(format!(
                    "data set name '{}' is already in use",
                    name
                )));
            }
            schema::set_name(&conn, key, name)?;
            Ok(())
        });
        self.pool.release(conn);
        result?;
        self.registry.invalidate(root_db);
        tracing::info!("Renamed data set {} to '{}'", handle.key(), name);
        Ok(())
    }

    pub fn set_description(&self, root_db: &str, key: i32, description: &str) -> StationDbResult<()> {
        self.mutable_handle(root_db, key)?;
        let conn = self.pool.acquire(root_db)?;
        let result = schema::set_description(&conn, key, description);
        self.pool.release(conn);
        result?;
        self.registry.invalidate(root_db);
        Ok(())
    }

    /// Soft-delete a data set and drop its backing store.
    ///
    /// Takes the advisory lock first, so a data set that is in use fails
    /// with `Busy` and is left untouched. Only the index row is locked, so a
    /// data set whose backing store was lost can still be deleted.
    pub fn delete(&self, root_db: &str, key: i32) -> StationDbResult<()> {
        let handle = self.mutable_handle(root_db, key)?;
        let locked = handle.lock_index_row()?;
        let marked = schema::mark_deleted(&locked, key);
        let released = handle.release(locked);
        marked?;
        released?;

        self.registry.invalidate(root_db);
        if !drop_database(self.pool.data_dir(), handle.store_name())? {
            tracing::warn!("Backing store {} was already gone", handle.store_name());
        }
        tracing::info!("Deleted data set {} ({})", key, handle.store_name());
        Ok(())
    }

    /// Clear a stale persisted lock. Returns true when one was set.
    pub fn force_unlock(&self, root_db: &str, key: i32) -> StationDbResult<bool> {
        let handle = self.registry.resolve_by_key(root_db, key, true)?;
        let cleared = handle.force_unlock()?;
        self.registry.invalidate(root_db);
        if cleared {
            tracing::warn!("Forcibly unlocked data set {}", handle.key());
        }
        Ok(cleared)
    }

    pub fn create_generic(
        &self,
        root_db: &str,
        format: FormatType,
        name: &str,
        description: &str,
    ) -> StationDbResult<Arc<ExtDb>> {
        let key = generic::create_generic(&self.pool, root_db, format, name, description)?;
        self.registry.invalidate(root_db);
        self.registry.resolve_by_key(root_db, key, false)
    }

    pub fn open_session(&self, root_db: &str, key: i32) -> StationDbResult<GenericSession> {
        GenericSession::open(self.registry.resolve_by_key(root_db, key, false)?)
    }

    pub fn find_antennas(&self, root_db: &str, antenna_id: &str) -> StationDbResult<Vec<AntennaMatch>> {
        search::find_antennas(&self.registry, root_db, antenna_id)
    }

    pub fn am_stations_near(
        &self,
        root_db: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> StationDbResult<Vec<AmStation>> {
        search::am_stations_near(&self.registry, root_db, latitude, longitude, radius_km)
    }

    pub fn has_am_station_near(
        &self,
        root_db: &str,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> StationDbResult<bool> {
        search::has_am_station_near(&self.registry, root_db, latitude, longitude, radius_km)
    }

    /// Handles that registry mutations may touch: concrete ones only
    fn mutable_handle(&self, root_db: &str, key: i32) -> StationDbResult<Arc<ExtDb>> {
        if is_reserved_key(key) {
            return Err(StationDbError::InvalidInput(format!(
                "data set {} is synthesized and cannot be modified",
                key
            )));
        }
        self.registry.resolve_by_key(root_db, key, false)
    }
}
