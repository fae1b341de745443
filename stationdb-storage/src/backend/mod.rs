//! SQL backend primitives
//!
//! Every database name maps to one SQLite file `<data_dir>/<name>.sqlite`.
//! A [`DbConnection`] is bound to one of those files at a time and can be
//! re-targeted with [`DbConnection::set_database`].

mod pool;

pub use pool::ConnectionPool;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Params};
use std::path::{Path, PathBuf};
use std::time::Duration;

use stationdb_core::{StationDbError, StationDbResult};

const DATABASE_EXTENSION: &str = "sqlite";

/// Attach a description of the failed operation to backend errors
pub trait SqlContext<T> {
    fn sql_context(self, context: impl AsRef<str>) -> StationDbResult<T>;
}

impl<T> SqlContext<T> for Result<T, rusqlite::Error> {
    fn sql_context(self, context: impl AsRef<str>) -> StationDbResult<T> {
        self.map_err(|e| StationDbError::database(context.as_ref(), e))
    }
}

/// Quote a value for inclusion in a SQL string literal.
///
/// Single quotes are doubled. SQLite has no backslash escapes, so
/// backslashes pass through unchanged.
pub fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Quote an identifier (table or column name)
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn database_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{}.{}", name, DATABASE_EXTENSION))
}

pub fn database_exists(data_dir: &Path, name: &str) -> bool {
    database_path(data_dir, name).is_file()
}

/// Remove a database and any journal files SQLite left beside it.
/// Returns false when there was nothing to remove.
pub fn drop_database(data_dir: &Path, name: &str) -> StationDbResult<bool> {
    let path = database_path(data_dir, name);
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    for suffix in ["-journal", "-wal", "-shm"] {
        let side = PathBuf::from(format!("{}{}", path.display(), suffix));
        if side.exists() {
            std::fs::remove_file(side)?;
        }
    }
    tracing::debug!("Dropped database {}", name);
    Ok(true)
}

pub fn rename_database(data_dir: &Path, from: &str, to: &str) -> StationDbResult<()> {
    let target = database_path(data_dir, to);
    if target.exists() {
        return Err(StationDbError::database(
            format!("renaming database {} to {}", from, to),
            "target already exists",
        ));
    }
    std::fs::rename(database_path(data_dir, from), target)?;
    Ok(())
}

/// A connection to one database of a data directory
pub struct DbConnection {
    conn: Connection,
    data_dir: PathBuf,
    database: String,
    busy_timeout: Duration,
    create: bool,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("data_dir", &self.data_dir)
            .field("database", &self.database)
            .finish()
    }
}

impl DbConnection {
    /// Open `database` inside `data_dir`, creating the file when `create` is set
    pub fn open(
        data_dir: &Path,
        database: &str,
        busy_timeout: Duration,
        create: bool,
    ) -> StationDbResult<Self> {
        let conn = open_file(data_dir, database, busy_timeout, create)?;
        Ok(Self {
            conn,
            data_dir: data_dir.to_path_buf(),
            database: database.to_string(),
            busy_timeout,
            create,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Point the connection at another database of the same data directory.
    /// Any open transaction on the current database is rolled back.
    pub fn set_database(&mut self, database: &str) -> StationDbResult<()> {
        if self.database == database {
            return Ok(());
        }
        self.rollback_if_open();
        self.conn = open_file(&self.data_dir, database, self.busy_timeout, self.create)?;
        self.database = database.to_string();
        Ok(())
    }

    pub fn execute_batch(&self, sql: &str, context: impl AsRef<str>) -> StationDbResult<()> {
        self.conn.execute_batch(sql).sql_context(context)
    }

    /// Run a statement and return the number of affected rows
    pub fn update<P: Params>(
        &self,
        sql: &str,
        params: P,
        context: impl AsRef<str>,
    ) -> StationDbResult<usize> {
        self.conn.execute(sql, params).sql_context(context)
    }

    pub fn query_optional<T, P, F>(
        &self,
        sql: &str,
        params: P,
        context: impl AsRef<str>,
        f: F,
    ) -> StationDbResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        self.conn
            .query_row(sql, params, f)
            .optional()
            .sql_context(context)
    }

    pub fn query_map<T, P, F>(
        &self,
        sql: &str,
        params: P,
        context: impl AsRef<str>,
        f: F,
    ) -> StationDbResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        let context = context.as_ref();
        let mut stmt = self.conn.prepare(sql).sql_context(context)?;
        let rows = stmt.query_map(params, f).sql_context(context)?;
        rows.collect::<Result<Vec<_>, _>>().sql_context(context)
    }

    pub fn table_exists(&self, table: &str) -> StationDbResult<bool> {
        let found = self.query_optional(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            format!("checking for table {}", table),
            |row| row.get::<_, i64>(0),
        )?;
        Ok(found.is_some())
    }

    /// Take the database write lock. Pairs with [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback).
    pub fn begin_immediate(&self, context: impl AsRef<str>) -> StationDbResult<()> {
        self.execute_batch("BEGIN IMMEDIATE", context)
    }

    pub fn begin(&self, context: impl AsRef<str>) -> StationDbResult<()> {
        self.execute_batch("BEGIN", context)
    }

    pub fn commit(&self, context: impl AsRef<str>) -> StationDbResult<()> {
        self.execute_batch("COMMIT", context)
    }

    pub fn rollback(&self) -> StationDbResult<()> {
        self.execute_batch("ROLLBACK", "rolling back transaction")
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    pub(crate) fn rollback_if_open(&self) {
        if self.in_transaction() {
            if let Err(e) = self.rollback() {
                tracing::warn!("Failed to roll back on {}: {}", self.database, e);
            }
        }
    }

    /// Cheap liveness check
    pub fn ping(&self) -> StationDbResult<()> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .sql_context(format!("probing database {}", self.database))?;
        Ok(())
    }
}

fn open_file(
    data_dir: &Path,
    database: &str,
    busy_timeout: Duration,
    create: bool,
) -> StationDbResult<Connection> {
    let path = database_path(data_dir, database);
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if create {
        std::fs::create_dir_all(data_dir)?;
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let context = format!("opening database {}", path.display());
    let conn = Connection::open_with_flags(&path, flags).sql_context(&context)?;
    conn.busy_timeout(busy_timeout).sql_context(&context)?;
    Ok(conn)
}
