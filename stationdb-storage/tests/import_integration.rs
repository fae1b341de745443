//! Import pipeline against real flat-file dumps

use pretty_assertions::assert_eq;
use std::sync::Mutex;

use stationdb_core::{CancelFlag, FormatType, StationDbError};
use stationdb_storage::import::{FieldNames, FieldSpec, FileSpec, FormatSpec};
use stationdb_storage::{ImportEvent, ImportRequest, ImportSource};
use stationdb_test::{
    build_zip, init_test_logging, license_a_dump, license_b_dump, write_dat, write_dump, DumpFile,
    TestEnvironment,
};

/// Files in the data directory other than the root database
fn stray_stores(env: &TestEnvironment) -> Vec<String> {
    let root_file = format!("{}.sqlite", env.root_db());
    let mut names: Vec<String> = std::fs::read_dir(env.data_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with(&root_file))
        .collect();
    names.sort();
    names
}

const ABC_FIELDS: &[FieldSpec] = &[FieldSpec::text("a"), FieldSpec::text("b"), FieldSpec::text("c")];

static ABC_FILES: &[FileSpec] = &[FileSpec {
    table: "abc",
    names: FieldNames::Header,
    fields: ABC_FIELDS,
    extra_ddl: &[],
    date_field: None,
    required: true,
    min_version: None,
    header_min_name_len: 1,
}];

static ABC_SPEC: FormatSpec = FormatSpec {
    format: FormatType::Wireless,
    version: 1,
    files: ABC_FILES,
};

const VERSIONED_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("site_id"),
    FieldSpec::text("site_name"),
    FieldSpec::real("site_power").since(5),
];

static VERSIONED_FILES: &[FileSpec] = &[FileSpec {
    table: "site",
    names: FieldNames::Header,
    fields: VERSIONED_FIELDS,
    extra_ddl: &[],
    date_field: None,
    required: true,
    min_version: None,
    header_min_name_len: 3,
}];

static VERSIONED_SPEC: FormatSpec = FormatSpec {
    format: FormatType::Wireless,
    version: 5,
    files: VERSIONED_FILES,
};

#[test]
fn test_license_a_directory_import_registers_data_set() {
    init_test_logging();
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("cdbs");
    write_dump(&dump, &license_a_dump("03/01/2024", true)).unwrap();

    let imported = env
        .db()
        .import(
            FormatType::LicenseA,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()).named("Spring").described("cdbs dump"),
            CancelFlag::new(),
            None,
        )
        .unwrap();

    let outcome = &imported.outcome;
    assert_eq!(outcome.key, 1);
    assert_eq!(outcome.version, 3);
    assert_eq!(outcome.id, "CDBS 2024-03-01");
    assert_eq!(outcome.store_name, format!("{}_cdbs_1", env.root_db()));
    assert!(outcome.name_saved);
    assert_eq!(outcome.tables.len(), 8);

    let handle = env.db().resolve(env.root_db(), 1, false).unwrap();
    assert_eq!(handle, imported.handle);
    assert_eq!(handle.name(), "Spring");
    assert_eq!(handle.description(), "cdbs dump");
    assert_eq!(handle.format(), FormatType::LicenseA);
    assert!(!handle.is_download());

    let by_name = env.db().resolve_by_name(env.root_db(), "SPRING").unwrap();
    assert_eq!(by_name.key(), 1);
    assert_eq!(stray_stores(&env), vec![format!("{}_cdbs_1.sqlite", env.root_db())]);
}

#[test]
fn test_missing_optional_files_cap_version() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("cdbs");
    write_dump(&dump, &license_a_dump("03/01/2024", false)).unwrap();

    let skipped = Mutex::new(Vec::new());
    let progress = |event: &ImportEvent| {
        if let ImportEvent::FileSkipped { table } = event {
            skipped.lock().unwrap().push(table.clone());
        }
    };
    let imported = env
        .db()
        .import(
            FormatType::LicenseA,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            Some(&progress),
        )
        .unwrap();

    assert_eq!(imported.outcome.version, 1);
    assert_eq!(
        skipped.into_inner().unwrap(),
        vec!["am_ant_sys".to_string(), "elevation_pattern".to_string()]
    );
}

#[test]
fn test_license_b_zip_with_subfolder() {
    let env = TestEnvironment::new().unwrap();
    let mut files = license_b_dump("2024-02-10 08:30:00", true);
    files.retain(|f| f.table != "app_antenna_elevation_pattern");
    let zip = build_zip(&env.input_dir().join("lms.zip"), Some("lms_dump"), &files).unwrap();

    let imported = env
        .db()
        .import(
            FormatType::LicenseB,
            &ImportSource::from_path(&zip),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap();

    assert_eq!(imported.outcome.version, 3);
    assert_eq!(imported.outcome.id, "LMS 2024-02-10");
    assert_eq!(imported.handle.store_name(), format!("{}_lms_1", env.root_db()));
}

#[test]
fn test_missing_required_file_creates_nothing() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("cdbs");
    let mut files = license_a_dump("03/01/2024", false);
    files.retain(|f| f.table != "ant_make");
    write_dump(&dump, &files).unwrap();

    let err = env
        .db()
        .import(
            FormatType::LicenseA,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, StationDbError::SchemaMismatch(_)), "{:?}", err);
    assert!(stray_stores(&env).is_empty());
    assert!(env
        .db()
        .list(env.root_db(), &stationdb_storage::ListFilter::all())
        .unwrap()
        .is_empty());
}

#[test]
fn test_malformed_record_rolls_back() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("cdbs");
    let mut files = license_a_dump("03/01/2024", false);
    for file in files.iter_mut().filter(|f| f.table == "ant_pattern") {
        file.contents.push_str("1001|180^\n");
    }
    write_dump(&dump, &files).unwrap();

    let err = env
        .db()
        .import(
            FormatType::LicenseA,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap_err();
    match err {
        StationDbError::MalformedRecord { file, line, .. } => {
            assert_eq!(file, "ant_pattern.dat");
            assert_eq!(line, 3);
        }
        other => panic!("Expected MalformedRecord, got {:?}", other),
    }
    assert!(stray_stores(&env).is_empty());

    // The failed import did not consume a key
    write_dump(&dump, &license_a_dump("03/01/2024", false)).unwrap();
    let imported = env
        .db()
        .import(
            FormatType::LicenseA,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap();
    assert_eq!(imported.outcome.key, 1);
}

#[test]
fn test_cancelled_import_leaves_nothing_behind() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("cdbs");
    write_dump(&dump, &license_a_dump("03/01/2024", false)).unwrap();

    let cancel = CancelFlag::new();
    let trigger = cancel.clone();
    let progress = move |event: &ImportEvent| {
        if matches!(event, ImportEvent::FileFinished { .. }) {
            trigger.cancel();
        }
    };
    let err = env
        .db()
        .import(
            FormatType::LicenseA,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            cancel,
            Some(&progress),
        )
        .unwrap_err();
    assert!(matches!(err, StationDbError::Cancelled));
    assert!(stray_stores(&env).is_empty());
}

#[test]
fn test_name_collision_saves_without_name() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("cdbs");
    write_dump(&dump, &license_a_dump("03/01/2024", false)).unwrap();
    let source = ImportSource::from_path(&dump);

    let first = env
        .db()
        .import(
            FormatType::LicenseA,
            &source,
            &ImportRequest::new(env.root_db()).named("Baseline"),
            CancelFlag::new(),
            None,
        )
        .unwrap();
    let second = env
        .db()
        .import(
            FormatType::LicenseA,
            &source,
            &ImportRequest::new(env.root_db()).named("baseline"),
            CancelFlag::new(),
            None,
        )
        .unwrap();

    assert!(first.outcome.name_saved);
    assert!(!second.outcome.name_saved);
    assert_eq!(second.handle.name(), "");
    assert_eq!(second.handle.label(), "CDBS 2024-03-01");
}

#[test]
fn test_header_round_trip_with_terminator_in_data() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("abc");
    std::fs::create_dir_all(&dump).unwrap();
    std::fs::write(dump.join("abc.dat"), "a|b|c^\n1|val^ue|3^\nx|multi\nline|z^\n").unwrap();

    let imported = env
        .db()
        .import_with_spec(
            &ABC_SPEC,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap();
    assert_eq!(imported.outcome.tables[0].rows, 2);

    let handle = imported.handle;
    let conn = handle.connect(false).unwrap();
    let rows = conn
        .query_map("SELECT a, b, c FROM abc ORDER BY a", [], "reading abc", |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })
        .unwrap();
    handle.release(conn).unwrap();

    assert_eq!(
        rows,
        vec![
            ("1".to_string(), "val^ue".to_string(), "3".to_string()),
            ("x".to_string(), "multi\nline".to_string(), "z".to_string()),
        ]
    );
}

#[test]
fn test_missing_versioned_field_caps_version() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("sites");
    std::fs::create_dir_all(&dump).unwrap();
    write_dat(
        &dump,
        "site",
        Some(&["site_id", "site_name", "site_extra"]),
        &[&["1", "Mesa", "x"], &["2", "", "y"]],
    )
    .unwrap();

    let imported = env
        .db()
        .import_with_spec(
            &VERSIONED_SPEC,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap();
    assert!(imported.outcome.version <= 4);

    let handle = imported.handle;
    let conn = handle.connect(false).unwrap();
    let extra: Option<String> = conn
        .query_optional(
            "SELECT site_extra FROM site WHERE site_id = 2",
            [],
            "reading site",
            |row| row.get(0),
        )
        .unwrap();
    handle.release(conn).unwrap();
    assert_eq!(extra.as_deref(), Some("y"));
}

#[test]
fn test_missing_unversioned_field_is_schema_mismatch() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("sites");
    std::fs::create_dir_all(&dump).unwrap();
    write_dat(&dump, "site", Some(&["site_id", "site_power"]), &[&["1", "2.5"]]).unwrap();

    let err = env
        .db()
        .import_with_spec(
            &VERSIONED_SPEC,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, StationDbError::SchemaMismatch(_)), "{:?}", err);
    assert!(stray_stores(&env).is_empty());
}

#[test]
fn test_small_statement_length_still_imports_every_row() {
    let env = TestEnvironment::with_config(
        stationdb_test::TestConfig::default().with_max_statement_length(64),
    )
    .unwrap();
    let dump = env.input_dir().join("abc");
    std::fs::create_dir_all(&dump).unwrap();
    let rows: Vec<Vec<String>> = (0..50)
        .map(|i| vec![i.to_string(), format!("name-{}", i), "o'brien".to_string()])
        .collect();
    let rows: Vec<Vec<&str>> = rows.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
    let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
    write_dat(&dump, "abc", Some(&["a", "b", "c"]), &rows).unwrap();

    let imported = env
        .db()
        .import_with_spec(
            &ABC_SPEC,
            &ImportSource::from_path(&dump),
            &ImportRequest::new(env.root_db()),
            CancelFlag::new(),
            None,
        )
        .unwrap();
    assert_eq!(imported.outcome.tables[0].rows, 50);

    let conn = imported.handle.connect(false).unwrap();
    let quoted: Option<i64> = conn
        .query_optional(
            "SELECT COUNT(*) FROM abc WHERE c = 'o''brien'",
            [],
            "counting",
            |row| row.get(0),
        )
        .unwrap();
    imported.handle.release(conn).unwrap();
    assert_eq!(quoted, Some(50));
}

#[test]
fn test_uninitialized_root_is_configuration_error() {
    let env = TestEnvironment::new().unwrap();
    let dump = env.input_dir().join("cdbs");
    write_dump(&dump, &[DumpFile::new("facility", "")]).unwrap();

    let err = env
        .db()
        .import(
            FormatType::LicenseA,
            &ImportSource::from_path(&dump),
            &ImportRequest::new("no_such_root"),
            CancelFlag::new(),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, StationDbError::Configuration(_)));
}
