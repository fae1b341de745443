//! User-composed ("generic") data sets
//!
//! A generic data set is created empty and filled through a
//! [`GenericSession`], which holds the data set's advisory lock and hands out
//! record keys from its own counter.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::backend::{database_exists, drop_database, ConnectionPool};
use crate::connection::ExtDbConnection;
use crate::registry::{generate_id, store_name, ExtDb};
use crate::schema::{self, NewIndexRow};
use stationdb_core::{FormatType, StationDbError, StationDbResult};

const CREATE_SOURCE_SQL: &str = "
CREATE TABLE source (
    source_key INTEGER PRIMARY KEY,
    record_type TEXT NOT NULL,
    callsign TEXT NOT NULL DEFAULT '',
    facility_id INTEGER NOT NULL DEFAULT 0,
    service TEXT NOT NULL DEFAULT '',
    channel INTEGER NOT NULL DEFAULT 0,
    frequency REAL NOT NULL DEFAULT 0,
    city TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    latitude REAL NOT NULL DEFAULT 0,
    longitude REAL NOT NULL DEFAULT 0,
    erp_kw REAL NOT NULL DEFAULT 0,
    haat_m REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT '',
    comment TEXT NOT NULL DEFAULT '',
    record_json TEXT NOT NULL
);
CREATE INDEX source_callsign ON source (callsign);";

/// One station record in a generic data set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericRecord {
    pub callsign: String,
    pub facility_id: i64,
    pub service: String,
    pub channel: i32,
    pub frequency: f64,
    pub city: String,
    pub state: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub erp_kw: f64,
    pub haat_m: f64,
    pub status: String,
    pub comment: String,
}

impl GenericRecord {
    /// Parse a JSON array of records
    pub fn from_json(json: &str) -> StationDbResult<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_json(path: &Path) -> StationDbResult<Vec<Self>> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Register an empty generic data set and return its key
pub fn create_generic(
    pool: &ConnectionPool,
    root_db: &str,
    format: FormatType,
    name: &str,
    description: &str,
) -> StationDbResult<i32> {
    if !format.is_generic() {
        return Err(StationDbError::InvalidInput(format!(
            "{} is not a generic data set format",
            format
        )));
    }
    if !database_exists(pool.data_dir(), root_db) {
        return Err(StationDbError::Configuration(format!(
            "root database '{}' is not initialized",
            root_db
        )));
    }

    let conn = pool.acquire(root_db)?;
    let result = (|| -> StationDbResult<i32> {
        let key = schema::allocate_key(&conn)?;
        let store = store_name(root_db, format, key);

        let store_conn = pool.acquire(&store)?;
        let created = store_conn.execute_batch(CREATE_SOURCE_SQL, format!("creating {}", store));
        pool.release(store_conn);
        created?;

        let registered = schema::with_write_lock(&conn, "registering data set", || {
            let name = name.trim();
            let name = if !name.is_empty() && schema::name_in_use(&conn, name, None)? {
                tracing::warn!(
                    "Data set name '{}' is already in use; data set {} saved without a name",
                    name,
                    key
                );
                ""
            } else {
                name
            };
            let today = Utc::now().date_naive();
            schema::insert_index_row(
                &conn,
                &NewIndexRow {
                    key,
                    format,
                    source_date: today,
                    version: format.current_version(),
                    id: &generate_id(format, today),
                    name,
                    description,
                    is_download: false,
                },
            )
        });
        if let Err(e) = registered {
            drop_database(pool.data_dir(), &store)?;
            return Err(e);
        }
        tracing::info!("Created {} data set {}", format, key);
        Ok(key)
    })();
    pool.release(conn);
    result
}

/// Exclusive write access to a generic data set
pub struct GenericSession {
    handle: Arc<ExtDb>,
    conn: Option<ExtDbConnection>,
    next_key: i64,
    appended: usize,
}

impl GenericSession {
    /// Lock the data set and seed the key counter from its highest record key
    pub fn open(handle: Arc<ExtDb>) -> StationDbResult<Self> {
        if !handle.is_generic() {
            return Err(StationDbError::InvalidInput(format!(
                "data set {} is not a generic data set",
                handle.key()
            )));
        }
        let conn = handle.connect(true)?;
        let max_key = conn.query_optional(
            "SELECT COALESCE(MAX(source_key), 0) FROM source",
            [],
            format!("reading record keys of {}", handle.store_name()),
            |row| row.get::<_, i64>(0),
        );
        let max_key = match max_key {
            Ok(max_key) => max_key.unwrap_or(0),
            Err(e) => {
                handle.release(conn)?;
                return Err(e);
            }
        };
        tracing::debug!("Opened session on data set {}", handle.key());
        Ok(Self {
            handle,
            conn: Some(conn),
            next_key: max_key + 1,
            appended: 0,
        })
    }

    pub fn handle(&self) -> &Arc<ExtDb> {
        &self.handle
    }

    pub fn next_key(&self) -> i64 {
        self.next_key
    }

    /// Write `records` in one transaction; returns the keys they were given
    pub fn append(&mut self, records: &[GenericRecord]) -> StationDbResult<Vec<i64>> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| StationDbError::InvalidInput("session is closed".to_string()))?;
        let record_type = self.handle.record_kind().to_string();
        let context = format!("appending to {}", self.handle.store_name());

        conn.begin(&context)?;
        let mut keys = Vec::with_capacity(records.len());
        let written = (|| -> StationDbResult<()> {
            for (offset, record) in records.iter().enumerate() {
                let key = self.next_key + offset as i64;
                conn.update(
                    "INSERT INTO source (source_key, record_type, callsign, facility_id, service, \
                     channel, frequency, city, state, country, latitude, longitude, erp_kw, \
                     haat_m, status, comment, record_json) VALUES \
                     (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                    params![
                        key,
                        record_type,
                        record.callsign,
                        record.facility_id,
                        record.service,
                        record.channel,
                        record.frequency,
                        record.city,
                        record.state,
                        record.country,
                        record.latitude,
                        record.longitude,
                        record.erp_kw,
                        record.haat_m,
                        record.status,
                        record.comment,
                        serde_json::to_string(record)?,
                    ],
                    &context,
                )?;
                keys.push(key);
            }
            Ok(())
        })();

        match written.and_then(|_| conn.commit(&context)) {
            Ok(()) => {
                self.next_key += records.len() as i64;
                self.appended += records.len();
                Ok(keys)
            }
            Err(e) => {
                conn.rollback_if_open();
                Err(e)
            }
        }
    }

    /// Release the lock; returns the number of records appended
    pub fn close(mut self) -> StationDbResult<usize> {
        if let Some(conn) = self.conn.take() {
            self.handle.release(conn)?;
        }
        tracing::debug!(
            "Closed session on data set {} after {} records",
            self.handle.key(),
            self.appended
        );
        Ok(self.appended)
    }
}

impl Drop for GenericSession {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.handle.release(conn) {
                tracing::warn!("Failed to release data set {}: {}", self.handle.key(), e);
            }
        }
    }
}
