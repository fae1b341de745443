//! The `ext_db` index kept in every root database

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::params;

use crate::backend::DbConnection;
use stationdb_core::types::next_sequence_key;
use stationdb_core::{FormatType, StationDbError, StationDbResult};

pub const INDEX_TABLE: &str = "ext_db";
pub const KEY_SEQUENCE_TABLE: &str = "ext_db_key_sequence";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CREATE_INDEX_SQL: &str = "
CREATE TABLE IF NOT EXISTS ext_db (
    ext_db_key INTEGER PRIMARY KEY,
    db_type INTEGER NOT NULL,
    db_date TEXT NOT NULL,
    version INTEGER NOT NULL,
    id TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    deleted INTEGER NOT NULL DEFAULT 0,
    locked INTEGER NOT NULL DEFAULT 0,
    lock_owner TEXT NOT NULL DEFAULT '',
    lock_time TEXT NOT NULL DEFAULT '',
    is_download INTEGER NOT NULL DEFAULT 0,
    import_date TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS ext_db_key_sequence (
    ext_db_key INTEGER NOT NULL
);";

/// One persisted index row
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub key: i32,
    pub format: FormatType,
    pub source_date: NaiveDate,
    pub version: i32,
    pub id: String,
    pub name: String,
    pub description: String,
    pub deleted: bool,
    pub locked: bool,
    pub is_download: bool,
    pub import_date: NaiveDateTime,
}

/// Values written when a new data set is registered
#[derive(Debug, Clone)]
pub struct NewIndexRow<'a> {
    pub key: i32,
    pub format: FormatType,
    pub source_date: NaiveDate,
    pub version: i32,
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub is_download: bool,
}

/// Create the index tables if they are missing
pub fn initialize_root(conn: &DbConnection) -> StationDbResult<()> {
    conn.execute_batch(CREATE_INDEX_SQL, "creating ext_db index tables")
}

pub fn is_initialized(conn: &DbConnection) -> StationDbResult<bool> {
    conn.table_exists(INDEX_TABLE)
}

/// Run `f` inside a write transaction on the root database. Checks made in
/// `f` hold until its writes commit, even against other processes.
pub fn with_write_lock<T>(
    conn: &DbConnection,
    context: &str,
    f: impl FnOnce() -> StationDbResult<T>,
) -> StationDbResult<T> {
    conn.begin_immediate(format!("locking root database for {}", context))?;
    let result = f().and_then(|value| {
        conn.commit(format!("committing {}", context))?;
        Ok(value)
    });
    if result.is_err() {
        conn.rollback_if_open();
    }
    result
}

/// Hand out the next data-set key. The sequence never enters the reserved range.
pub fn allocate_key(conn: &DbConnection) -> StationDbResult<i32> {
    with_write_lock(conn, "ext_db_key_sequence", || {
        let current: Option<i32> = conn.query_optional(
            "SELECT ext_db_key FROM ext_db_key_sequence LIMIT 1",
            [],
            "reading ext_db_key_sequence",
            |row| row.get(0),
        )?;
        let next = next_sequence_key(current.unwrap_or(0));
        if current.is_some() {
            conn.update(
                "UPDATE ext_db_key_sequence SET ext_db_key = ?1",
                [next],
                "updating ext_db_key_sequence",
            )?;
        } else {
            conn.update(
                "INSERT INTO ext_db_key_sequence (ext_db_key) VALUES (?1)",
                [next],
                "seeding ext_db_key_sequence",
            )?;
        }
        Ok(next)
    })
}

/// All index rows, newest insert first
pub fn read_index(conn: &DbConnection) -> StationDbResult<Vec<IndexRow>> {
    let rows = conn.query_map(
        "SELECT ext_db_key, db_type, db_date, version, id, name, description, deleted, \
         locked, is_download, import_date FROM ext_db ORDER BY ext_db_key DESC",
        [],
        "reading ext_db",
        |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, bool>(7)?,
                row.get::<_, bool>(8)?,
                row.get::<_, bool>(9)?,
                row.get::<_, String>(10)?,
            ))
        },
    )?;

    let mut result = Vec::with_capacity(rows.len());
    for (key, db_type, db_date, version, id, name, description, deleted, locked, is_download, import_date) in
        rows
    {
        let format = match FormatType::from_code(db_type) {
            Some(format) => format,
            None => {
                tracing::warn!("Skipping ext_db row {} with unknown db_type {}", key, db_type);
                continue;
            }
        };
        result.push(IndexRow {
            key,
            format,
            source_date: parse_date(&db_date, key)?,
            version,
            id,
            name,
            description,
            deleted,
            locked,
            is_download,
            import_date: NaiveDateTime::parse_from_str(&import_date, TIMESTAMP_FORMAT)
                .map_err(|e| StationDbError::database(format!("reading import_date of {}", key), e))?,
        });
    }
    Ok(result)
}

pub fn insert_index_row(conn: &DbConnection, row: &NewIndexRow<'_>) -> StationDbResult<()> {
    conn.update(
        "INSERT INTO ext_db (ext_db_key, db_type, db_date, version, id, name, description, \
         is_download, import_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.key,
            row.format.code(),
            row.source_date.format(DATE_FORMAT).to_string(),
            row.version,
            row.id,
            row.name,
            row.description,
            row.is_download,
            Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string(),
        ],
        format!("registering data set {} in ext_db", row.key),
    )?;
    Ok(())
}

/// True when a non-deleted data set other than `except_key` already uses `name`
pub fn name_in_use(conn: &DbConnection, name: &str, except_key: Option<i32>) -> StationDbResult<bool> {
    let found = conn.query_optional(
        "SELECT ext_db_key FROM ext_db WHERE deleted = 0 AND name <> '' \
         AND lower(name) = lower(?1) AND ext_db_key <> ?2 LIMIT 1",
        params![name, except_key.unwrap_or(-1)],
        "checking data set names",
        |row| row.get::<_, i32>(0),
    )?;
    Ok(found.is_some())
}

pub fn set_name(conn: &DbConnection, key: i32, name: &str) -> StationDbResult<usize> {
    conn.update(
        "UPDATE ext_db SET name = ?1 WHERE ext_db_key = ?2",
        params![name, key],
        format!("renaming data set {}", key),
    )
}

pub fn set_description(conn: &DbConnection, key: i32, description: &str) -> StationDbResult<usize> {
    conn.update(
        "UPDATE ext_db SET description = ?1 WHERE ext_db_key = ?2",
        params![description, key],
        format!("describing data set {}", key),
    )
}

/// Flag a data set deleted and clear its name
pub fn mark_deleted(conn: &DbConnection, key: i32) -> StationDbResult<usize> {
    conn.update(
        "UPDATE ext_db SET deleted = 1, name = '' WHERE ext_db_key = ?1",
        [key],
        format!("deleting data set {}", key),
    )
}

fn parse_date(value: &str, key: i32) -> StationDbResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| StationDbError::database(format!("reading db_date of {}", key), e))
}
