use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::connection::{ConnectionSource, ExtDbConnection};
use stationdb_core::{is_reserved_key, FormatType, RecordKind, StationDbError, StationDbResult, KEY_LIVE};

/// Backing store name for a concrete data set
pub fn store_name(root_db: &str, format: FormatType, key: i32) -> String {
    format!("{}_{}_{}", root_db, format.store_prefix(), key)
}

/// Generated id: format code plus content date
pub fn generate_id(format: FormatType, date: NaiveDate) -> String {
    format!("{} {}", format.id_code(), date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtDbMeta {
    pub name: String,
    pub description: String,
    pub deleted: bool,
    pub locked: bool,
}

/// A registered external data set.
///
/// Identity and classification are fixed; name, description and the
/// deleted/locked flags are refreshed in place from the index.
pub struct ExtDb {
    key: i32,
    root_db: String,
    format: FormatType,
    backing_key: i32,
    version: i32,
    id: String,
    source_date: NaiveDate,
    import_date: Option<NaiveDateTime>,
    is_download: bool,
    store_name: String,
    meta: RwLock<ExtDbMeta>,
    source: Arc<dyn ConnectionSource>,
}

pub(crate) struct ExtDbInit {
    pub key: i32,
    pub root_db: String,
    pub format: FormatType,
    pub backing_key: i32,
    pub version: i32,
    pub id: String,
    pub source_date: NaiveDate,
    pub import_date: Option<NaiveDateTime>,
    pub is_download: bool,
    pub store_name: String,
    pub meta: ExtDbMeta,
    pub source: Arc<dyn ConnectionSource>,
}

impl ExtDb {
    pub(crate) fn new(init: ExtDbInit) -> Self {
        Self {
            key: init.key,
            root_db: init.root_db,
            format: init.format,
            backing_key: init.backing_key,
            version: init.version,
            id: init.id,
            source_date: init.source_date,
            import_date: init.import_date,
            is_download: init.is_download,
            store_name: init.store_name,
            meta: RwLock::new(init.meta),
            source: init.source,
        }
    }

    /// Virtual handle mirroring `concrete` under a reserved key
    pub(crate) fn mirror(concrete: &ExtDb, key: i32) -> Self {
        Self::new(ExtDbInit {
            key,
            root_db: concrete.root_db.clone(),
            format: concrete.format,
            backing_key: concrete.key,
            version: concrete.version,
            id: concrete.id.clone(),
            source_date: concrete.source_date,
            import_date: concrete.import_date,
            is_download: concrete.is_download,
            store_name: concrete.store_name.clone(),
            meta: ExtDbMeta {
                name: format!("Most recent {}", concrete.format),
                description: format!("Follows data set {} ({})", concrete.key, concrete.id),
                deleted: false,
                locked: concrete.meta.read().locked,
            },
            source: concrete.source.clone(),
        })
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn root_db(&self) -> &str {
        &self.root_db
    }

    pub fn format(&self) -> FormatType {
        self.format
    }

    pub fn record_kind(&self) -> RecordKind {
        self.format.record_kind()
    }

    /// Key of the index row behind this handle; differs from `key` for virtual handles
    pub fn backing_key(&self) -> i32 {
        self.backing_key
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_date(&self) -> NaiveDate {
        self.source_date
    }

    pub fn import_date(&self) -> Option<NaiveDateTime> {
        self.import_date
    }

    pub fn is_download(&self) -> bool {
        self.is_download
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn name(&self) -> String {
        self.meta.read().name.clone()
    }

    pub fn description(&self) -> String {
        self.meta.read().description.clone()
    }

    pub fn is_deleted(&self) -> bool {
        self.meta.read().deleted
    }

    pub fn is_locked(&self) -> bool {
        self.meta.read().locked || self.source.holds_lock()
    }

    pub fn meta(&self) -> ExtDbMeta {
        self.meta.read().clone()
    }

    pub fn is_reserved(&self) -> bool {
        is_reserved_key(self.key)
    }

    pub fn is_live(&self) -> bool {
        self.key == KEY_LIVE
    }

    pub fn is_virtual(&self) -> bool {
        self.is_reserved() && !self.is_live()
    }

    pub fn is_generic(&self) -> bool {
        self.format.is_generic()
    }

    /// Name if one is set, otherwise the generated id
    pub fn label(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            self.id.clone()
        } else {
            name
        }
    }

    pub fn connect(&self, wants_lock: bool) -> StationDbResult<ExtDbConnection> {
        if self.is_deleted() {
            return Err(StationDbError::Deleted { key: self.key });
        }
        self.source.connect(wants_lock)
    }

    /// Lock the data set's index row only; works when the backing store is gone
    pub fn lock_index_row(&self) -> StationDbResult<ExtDbConnection> {
        if self.is_deleted() {
            return Err(StationDbError::Deleted { key: self.key });
        }
        self.source.lock_index_row()
    }

    pub fn release(&self, conn: ExtDbConnection) -> StationDbResult<()> {
        self.source.release(conn)
    }

    pub fn force_unlock(&self) -> StationDbResult<bool> {
        let cleared = self.source.force_unlock()?;
        self.meta.write().locked = false;
        Ok(cleared)
    }

    pub(crate) fn update_meta(&self, meta: ExtDbMeta) {
        *self.meta.write() = meta;
    }
}

impl PartialEq for ExtDb {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ExtDb {}

impl fmt::Debug for ExtDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtDb")
            .field("key", &self.key)
            .field("root_db", &self.root_db)
            .field("format", &self.format)
            .field("id", &self.id)
            .field("meta", &*self.meta.read())
            .finish()
    }
}

impl fmt::Display for ExtDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.label(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_and_id() {
        assert_eq!(store_name("stationdb", FormatType::LicenseB, 12), "stationdb_lms_12");
        assert_eq!(store_name("r", FormatType::LicenseAFm, 6000), "r_cdbs_fm_6000");
        let date = NaiveDate::from_ymd_opt(2023, 11, 5).unwrap();
        assert_eq!(generate_id(FormatType::LicenseA, date), "CDBS 2023-11-05");
        assert_eq!(generate_id(FormatType::GenericFm, date), "FM 2023-11-05");
    }
}
