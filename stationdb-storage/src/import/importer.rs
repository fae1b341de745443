use chrono::{NaiveDate, Utc};
use std::collections::HashSet;

use super::dates::DateCounter;
use super::flatfile::{ReadError, RecordReader};
use super::source::{ImportSource, OpenSource};
use super::spec::{FieldNames, FileSpec, FormatSpec};
use crate::backend::{
    database_exists, drop_database, escape, quote_ident, rename_database, ConnectionPool,
    DbConnection,
};
use crate::registry::{generate_id, store_name};
use crate::schema::{self, NewIndexRow};
use stationdb_core::{CancelFlag, FormatType, StationDbError, StationDbResult};

/// What to register once the data is copied
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub root_db: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_download: bool,
}

impl ImportRequest {
    pub fn new(root_db: impl Into<String>) -> Self {
        Self {
            root_db: root_db.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn downloaded(mut self) -> Self {
        self.is_download = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEvent {
    FileStarted { table: String, index: usize, total: usize },
    FileFinished { table: String, rows: u64 },
    FileSkipped { table: String },
    Registering,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub table: String,
    pub rows: u64,
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub key: i32,
    pub format: FormatType,
    pub store_name: String,
    pub version: i32,
    pub id: String,
    pub source_date: NaiveDate,
    /// False when the requested name collided and was dropped
    pub name_saved: bool,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    sql_type: &'static str,
    is_text: bool,
}

/// Copies a flat-file dump into a new backing store and registers it
pub struct Importer<'a> {
    pool: &'a ConnectionPool,
    max_statement_length: usize,
    cancel: CancelFlag,
    progress: Option<&'a (dyn Fn(&ImportEvent) + Sync)>,
}

impl<'a> Importer<'a> {
    pub fn new(pool: &'a ConnectionPool, max_statement_length: usize) -> Self {
        Self {
            pool,
            max_statement_length,
            cancel: CancelFlag::new(),
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: &'a (dyn Fn(&ImportEvent) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, event: ImportEvent) {
        if let Some(progress) = self.progress {
            progress(&event);
        }
    }

    pub fn run(
        &self,
        spec: &FormatSpec,
        source: &ImportSource,
        request: &ImportRequest,
    ) -> StationDbResult<ImportOutcome> {
        let root_db = request.root_db.as_str();
        let data_dir = self.pool.data_dir();
        if !database_exists(data_dir, root_db) {
            return Err(StationDbError::Configuration(format!(
                "root database '{}' is not initialized",
                root_db
            )));
        }

        tracing::info!(
            "Importing {} from {} into {}",
            spec.format,
            source.path().display(),
            root_db
        );

        // Everything that can fail without side effects happens first
        let mut opened = source.open()?;
        let mut version = spec.version;
        let mut present = Vec::with_capacity(spec.files.len());
        for file in spec.files {
            let file_name = file.file_name();
            if opened.contains(&file_name) {
                present.push(file);
            } else if file.required {
                return Err(StationDbError::SchemaMismatch(format!(
                    "required file {} is missing from {}",
                    file_name,
                    source.path().display()
                )));
            } else {
                if let Some(min) = file.min_version {
                    version = version.min(min - 1);
                }
                tracing::info!(
                    "Optional file {} not present, schema version capped at {}",
                    file_name,
                    version
                );
                self.report(ImportEvent::FileSkipped {
                    table: file.table.to_string(),
                });
            }
        }
        self.cancel.check()?;

        let temp_store = format!("{}_import_{}", root_db, uuid::Uuid::new_v4().simple());
        let mut conn = self.pool.acquire(&temp_store)?;
        let mut dates = DateCounter::new();

        let copied = self.copy_files(&conn, &mut opened, &present, &mut version, &mut dates);
        let tables = match copied.and_then(|tables| self.cancel.check().map(|_| tables)) {
            Ok(tables) => tables,
            Err(e) => {
                drop(conn);
                discard(data_dir, &temp_store);
                return Err(e);
            }
        };

        self.report(ImportEvent::Registering);
        if let Err(e) = conn.set_database(root_db) {
            drop(conn);
            discard(data_dir, &temp_store);
            return Err(e);
        }
        let result = self.register(&conn, spec.format, &temp_store, request, version, &dates, tables);
        self.pool.release(conn);
        result
    }

    fn copy_files(
        &self,
        conn: &DbConnection,
        opened: &mut OpenSource,
        files: &[&FileSpec],
        version: &mut i32,
        dates: &mut DateCounter,
    ) -> StationDbResult<Vec<TableSummary>> {
        let mut tables = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            self.cancel.check()?;
            self.report(ImportEvent::FileStarted {
                table: file.table.to_string(),
                index,
                total: files.len(),
            });
            let rows = self.copy_file(conn, opened, file, version, dates)?;
            tracing::debug!("Copied {} rows into {}", rows, file.table);
            self.report(ImportEvent::FileFinished {
                table: file.table.to_string(),
                rows,
            });
            tables.push(TableSummary {
                table: file.table.to_string(),
                rows,
            });
        }
        Ok(tables)
    }

    fn copy_file(
        &self,
        conn: &DbConnection,
        opened: &mut OpenSource,
        file: &FileSpec,
        version: &mut i32,
        dates: &mut DateCounter,
    ) -> StationDbResult<u64> {
        let file_name = file.file_name();
        let max_len = self.max_statement_length;
        opened.with_reader(&file_name, |reader| {
            let mut records = RecordReader::new(reader);

            let names: Vec<String> = match file.names {
                FieldNames::Fixed => file.fields.iter().map(|f| f.name.to_string()).collect(),
                FieldNames::Header => {
                    let header = next_record(&mut records, &file_name)?.ok_or_else(|| {
                        StationDbError::MalformedRecord {
                            file: file_name.clone(),
                            line: 1,
                            message: "missing header line".to_string(),
                        }
                    })?;
                    let names: Vec<String> =
                        header.fields.iter().map(|n| n.trim().to_string()).collect();
                    validate_header(&names, file.header_min_name_len).map_err(|message| {
                        StationDbError::MalformedRecord {
                            file: file_name.clone(),
                            line: header.line,
                            message,
                        }
                    })?;
                    names
                }
            };

            let columns = match_columns(file, &file_name, &names, version)?;
            let table = quote_ident(file.table);
            let definition = columns
                .iter()
                .map(|c| format!("{} {}", quote_ident(&c.name), c.sql_type))
                .collect::<Vec<_>>()
                .join(", ");
            conn.execute_batch(
                &format!("CREATE TABLE {} ({})", table, definition),
                format!("creating table {}", file.table),
            )?;
            for ddl in file.extra_ddl {
                conn.execute_batch(
                    &ddl.replace("{table}", file.table),
                    format!("indexing table {}", file.table),
                )?;
            }

            let date_index = file
                .date_field
                .and_then(|field| columns.iter().position(|c| c.name.eq_ignore_ascii_case(field)));

            let context = format!("inserting into {}", file.table);
            conn.begin(&context)?;
            let mut batch = InsertBatch::new(&table, &columns, max_len);
            let mut rows = 0u64;
            while let Some(record) = next_record(&mut records, &file_name)? {
                if record.fields.len() != columns.len() {
                    return Err(StationDbError::MalformedRecord {
                        file: file_name.clone(),
                        line: record.line,
                        message: format!(
                            "expected {} fields, found {}",
                            columns.len(),
                            record.fields.len()
                        ),
                    });
                }
                if let Some(index) = date_index {
                    dates.record(&record.fields[index]);
                }
                if let Some(sql) = batch.push(&record.fields) {
                    conn.execute_batch(&sql, &context)?;
                }
                rows += 1;
            }
            if let Some(sql) = batch.finish() {
                conn.execute_batch(&sql, &context)?;
            }
            conn.commit(&context)?;
            Ok(rows)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn register(
        &self,
        conn: &DbConnection,
        format: FormatType,
        temp_store: &str,
        request: &ImportRequest,
        version: i32,
        dates: &DateCounter,
        tables: Vec<TableSummary>,
    ) -> StationDbResult<ImportOutcome> {
        let data_dir = self.pool.data_dir();
        let root_db = request.root_db.as_str();

        let key = match schema::allocate_key(conn) {
            Ok(key) => key,
            Err(e) => {
                discard(data_dir, temp_store);
                return Err(e);
            }
        };
        let store = store_name(root_db, format, key);
        if let Err(e) = rename_database(data_dir, temp_store, &store) {
            discard(data_dir, temp_store);
            return Err(e);
        }

        let registered = schema::with_write_lock(conn, "registering data set", || {
            let requested = request.name.as_deref().map(str::trim).unwrap_or("");
            let name = if !requested.is_empty() && schema::name_in_use(conn, requested, None)? {
                tracing::warn!(
                    "Data set name '{}' is already in use; data set {} saved without a name",
                    requested,
                    key
                );
                ""
            } else {
                requested
            };

            let source_date = dates
                .most_common()
                .unwrap_or_else(|| Utc::now().date_naive());
            let id = generate_id(format, source_date);
            schema::insert_index_row(
                conn,
                &NewIndexRow {
                    key,
                    format,
                    source_date,
                    version,
                    id: &id,
                    name,
                    description: request.description.as_deref().unwrap_or(""),
                    is_download: request.is_download,
                },
            )?;
            Ok(ImportOutcome {
                key,
                format,
                store_name: store.clone(),
                version,
                id,
                source_date,
                name_saved: name == requested,
                tables,
            })
        });

        match registered {
            Ok(outcome) => {
                tracing::info!(
                    "Registered {} data set {} ({}) at version {}",
                    format,
                    outcome.key,
                    outcome.id,
                    outcome.version
                );
                Ok(outcome)
            }
            Err(e) => {
                discard(data_dir, &store);
                Err(e)
            }
        }
    }
}

fn discard(data_dir: &std::path::Path, store: &str) {
    if let Err(e) = drop_database(data_dir, store) {
        tracing::warn!("Failed to drop partial store {}: {}", store, e);
    }
}

fn next_record<R: std::io::BufRead>(
    records: &mut RecordReader<R>,
    file_name: &str,
) -> StationDbResult<Option<super::flatfile::Record>> {
    records.next_record().map_err(|e| match e {
        ReadError::Io(e) => StationDbError::Io(e),
        ReadError::UnexpectedEof { line } => StationDbError::MalformedRecord {
            file: file_name.to_string(),
            line,
            message: "unexpected end of file inside a record".to_string(),
        },
    })
}

/// Header names must look like column names, which keeps a data row from
/// being taken for a missing header.
fn validate_header(names: &[String], min_len: usize) -> Result<(), String> {
    if names.len() < 2 {
        return Err(format!("header has {} names, expected at least 2", names.len()));
    }
    for name in names {
        if name.len() < min_len {
            return Err(format!("header name '{}' is shorter than {} characters", name, min_len));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!("header name '{}' is not a column name", name));
        }
    }
    Ok(())
}

/// Pair file columns with declared fields. Each declared field is used at
/// most once; unmatched columns become TEXT. A declared field the file lacks
/// is fatal unless it carries a minimum version, which caps `version`.
fn match_columns(
    file: &FileSpec,
    file_name: &str,
    names: &[String],
    version: &mut i32,
) -> StationDbResult<Vec<Column>> {
    let mut unmatched: Vec<_> = file.fields.iter().map(Some).collect();
    let mut used = HashSet::new();
    let mut columns = Vec::with_capacity(names.len());

    for name in names {
        let matched = unmatched
            .iter_mut()
            .find(|slot| matches!(slot, Some(field) if field.name.eq_ignore_ascii_case(name)))
            .and_then(Option::take);

        let mut column_name = name.to_lowercase();
        let mut suffix = 2;
        while !used.insert(column_name.clone()) {
            column_name = format!("{}_{}", name.to_lowercase(), suffix);
            suffix += 1;
        }

        columns.push(match matched {
            Some(field) => Column {
                name: column_name,
                sql_type: field.sql_type,
                is_text: field.is_text,
            },
            None => Column {
                name: column_name,
                sql_type: "TEXT",
                is_text: true,
            },
        });
    }

    for field in unmatched.into_iter().flatten() {
        match field.min_version {
            Some(min) => {
                *version = (*version).min(min - 1);
                tracing::info!(
                    "{} lacks field {}, schema version capped at {}",
                    file_name,
                    field.name,
                    *version
                );
            }
            None => {
                return Err(StationDbError::SchemaMismatch(format!(
                    "{} lacks required field {}",
                    file_name, field.name
                )))
            }
        }
    }
    Ok(columns)
}

/// Builds multi-row INSERT statements no longer than `max_len` where possible
struct InsertBatch<'a> {
    prefix: String,
    columns: &'a [Column],
    sql: String,
    rows: usize,
    max_len: usize,
}

impl<'a> InsertBatch<'a> {
    fn new(table: &str, columns: &'a [Column], max_len: usize) -> Self {
        let names = columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            prefix: format!("INSERT INTO {} ({}) VALUES ", table, names),
            columns,
            sql: String::new(),
            rows: 0,
            max_len,
        }
    }

    /// Add a row; returns a full statement when the row did not fit
    fn push(&mut self, fields: &[String]) -> Option<String> {
        let tuple = format_tuple(self.columns, fields);
        let mut full = None;
        if self.rows > 0 && self.sql.len() + 1 + tuple.len() > self.max_len {
            full = Some(std::mem::take(&mut self.sql));
            self.rows = 0;
        }
        if self.rows == 0 {
            self.sql.push_str(&self.prefix);
        } else {
            self.sql.push(',');
        }
        self.sql.push_str(&tuple);
        self.rows += 1;
        full
    }

    fn finish(self) -> Option<String> {
        (self.rows > 0).then_some(self.sql)
    }
}

fn format_tuple(columns: &[Column], fields: &[String]) -> String {
    let values = columns
        .iter()
        .zip(fields)
        .map(|(column, raw)| format_value(column.is_text, raw))
        .collect::<Vec<_>>()
        .join(",");
    format!("({})", values)
}

fn format_value(is_text: bool, raw: &str) -> String {
    if is_text {
        return format!("'{}'", escape(raw));
    }
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "0".to_string()
    } else if is_numeric_literal(trimmed) {
        trimmed.to_string()
    } else {
        format!("'{}'", escape(raw))
    }
}

fn is_numeric_literal(value: &str) -> bool {
    let body = value.strip_prefix(['-', '+']).unwrap_or(value);
    let mut digits = 0;
    let mut dots = 0;
    let mut exponent = false;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' => digits += 1,
            '.' if !exponent => dots += 1,
            'e' | 'E' if digits > 0 && !exponent => {
                exponent = true;
                if matches!(chars.peek(), Some('-') | Some('+')) {
                    chars.next();
                }
                if !matches!(chars.peek(), Some('0'..='9')) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::spec::FieldSpec;
    use pretty_assertions::assert_eq;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::int("facility_id"),
        FieldSpec::text("callsign"),
        FieldSpec::real("erp").since(3),
    ];

    const FILE: FileSpec = FileSpec {
        table: "facility",
        names: FieldNames::Header,
        fields: FIELDS,
        extra_ddl: &[],
        date_field: None,
        required: true,
        min_version: None,
        header_min_name_len: 3,
    };

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_literals() {
        for ok in ["1", "-2", "+3.5", "0.25", ".5", "1e6", "2.5E-3"] {
            assert!(is_numeric_literal(ok), "{}", ok);
        }
        for bad in ["", "-", "1.2.3", "inf", "NaN", "1e", "e5", "12abc", "1,000"] {
            assert!(!is_numeric_literal(bad), "{}", bad);
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(false, ""), "0");
        assert_eq!(format_value(false, " 12 "), "12");
        assert_eq!(format_value(false, "N/A"), "'N/A'");
        assert_eq!(format_value(true, ""), "''");
        assert_eq!(format_value(true, "O'Hare"), "'O''Hare'");
    }

    #[test]
    fn test_header_validation() {
        assert!(validate_header(&names(&["facility_id", "callsign"]), 3).is_ok());
        assert!(validate_header(&names(&["facility_id"]), 3).is_err());
        assert!(validate_header(&names(&["12345", "KAAA"]), 3).is_err());
        assert!(validate_header(&names(&["id", "callsign"]), 3).is_err());
        assert!(validate_header(&names(&["a", "b"]), 1).is_ok());
    }

    #[test]
    fn test_match_columns_caps_version_for_missing_optional_field() {
        let mut version = 4;
        let columns =
            match_columns(&FILE, "facility.dat", &names(&["callsign", "facility_id", "notes"]), &mut version)
                .unwrap();
        assert_eq!(version, 2);
        assert_eq!(
            columns.iter().map(|c| (c.name.as_str(), c.sql_type)).collect::<Vec<_>>(),
            vec![("callsign", "TEXT"), ("facility_id", "INTEGER"), ("notes", "TEXT")]
        );
    }

    #[test]
    fn test_match_columns_missing_required_field() {
        let mut version = 4;
        let err = match_columns(&FILE, "facility.dat", &names(&["callsign", "erp"]), &mut version)
            .unwrap_err();
        assert!(matches!(err, StationDbError::SchemaMismatch(msg) if msg.contains("facility_id")));
    }

    #[test]
    fn test_duplicate_columns_match_once() {
        let mut version = 4;
        let columns = match_columns(
            &FILE,
            "facility.dat",
            &names(&["facility_id", "callsign", "erp", "erp"]),
            &mut version,
        )
        .unwrap();
        assert_eq!(version, 4);
        assert_eq!(columns[2].sql_type, "REAL");
        assert_eq!(columns[3].name, "erp_2");
        assert_eq!(columns[3].sql_type, "TEXT");
    }

    #[test]
    fn test_insert_batch_splits_on_length() {
        let columns = vec![Column {
            name: "v".to_string(),
            sql_type: "INTEGER",
            is_text: false,
        }];
        let mut batch = InsertBatch::new("\"t\"", &columns, 38);
        assert_eq!(batch.push(&names(&["1"])), None);
        assert_eq!(batch.push(&names(&["2"])), None);
        let full = batch.push(&names(&["3"])).unwrap();
        assert_eq!(full, "INSERT INTO \"t\" (\"v\") VALUES (1),(2)");
        assert_eq!(batch.finish().unwrap(), "INSERT INTO \"t\" (\"v\") VALUES (3)");
    }
}
