//! Test fixtures and data generators
//!
//! Small flat-file dumps in the `|`-separated, `^`-terminated layout the
//! importer reads, plus helpers to lay them out on disk or in a zip archive.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One `<table>.dat` file of a dump
#[derive(Debug, Clone, PartialEq)]
pub struct DumpFile {
    pub table: String,
    pub contents: String,
}

impl DumpFile {
    pub fn new(table: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            contents: contents.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.dat", self.table)
    }
}

/// Render records (and an optional header) as flat-file text
pub fn dat_text(header: Option<&[&str]>, rows: &[&[&str]]) -> String {
    let mut text = String::new();
    if let Some(header) = header {
        text.push_str(&header.join("|"));
        text.push_str("^\n");
    }
    for row in rows {
        text.push_str(&row.join("|"));
        text.push_str("^\n");
    }
    text
}

pub fn write_dat(dir: &Path, table: &str, header: Option<&[&str]>, rows: &[&[&str]]) -> Result<PathBuf> {
    let path = dir.join(format!("{}.dat", table));
    std::fs::write(&path, dat_text(header, rows))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Write every file of a dump into `dir`
pub fn write_dump(dir: &Path, files: &[DumpFile]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for file in files {
        std::fs::write(dir.join(file.file_name()), &file.contents)?;
    }
    Ok(())
}

/// Pack a dump into a zip archive, entries under `folder/` when given
pub fn build_zip(path: &Path, folder: Option<&str>, files: &[DumpFile]) -> Result<PathBuf> {
    let mut zip = zip::ZipWriter::new(File::create(path)?);
    let options = zip::write::FileOptions::default();
    if let Some(folder) = folder {
        zip.add_directory(format!("{}/", folder), options)?;
    }
    for file in files {
        let name = match folder {
            Some(folder) => format!("{}/{}", folder, file.file_name()),
            None => file.file_name(),
        };
        zip.start_file(name, options)?;
        zip.write_all(file.contents.as_bytes())?;
    }
    zip.finish()?;
    Ok(path.to_path_buf())
}

/// License format A dump: one AM station in Denver and one TV station with
/// antenna 1001. `date` is written as the `MM/DD/YYYY` change date.
pub fn license_a_dump(date: &str, with_optional: bool) -> Vec<DumpFile> {
    let mut files = vec![
        DumpFile::new(
            "facility",
            dat_text(
                None,
                &[
                    &["101", "KAAA", "AM", "0", "950", "LICEN", "DENVER", "CO", date],
                    &["102", "KTVA", "DT", "7", "0", "LICEN", "DENVER", "CO", date],
                ],
            ),
        ),
        DumpFile::new(
            "application",
            dat_text(
                None,
                &[
                    &["5001", "101", "LIC", "BL", "BL-1", date],
                    &["5002", "102", "LIC", "BLCDT", "BLCDT-2", date],
                ],
            ),
        ),
        DumpFile::new(
            "app_location",
            dat_text(
                None,
                &[
                    &["5001", "N", "39", "44", "0", "W", "104", "59", "0", date],
                    &["5002", "N", "39", "43", "48", "W", "105", "10", "12", date],
                ],
            ),
        ),
        DumpFile::new(
            "tv_eng_data",
            dat_text(None, &[&["5002", "102", "7", "30.5", "1001", "2200", date]]),
        ),
        DumpFile::new(
            "ant_make",
            dat_text(None, &[&["1001", "DIELECTRIC", "TFU-28DSC", date]]),
        ),
        DumpFile::new(
            "ant_pattern",
            dat_text(
                None,
                &[&["1001", "0", "1.0", date], &["1001", "90", "0.8", date]],
            ),
        ),
    ];
    if with_optional {
        files.push(DumpFile::new(
            "am_ant_sys",
            dat_text(None, &[&["1", "5001", "D", "5.0", "U", date]]),
        ));
        files.push(DumpFile::new(
            "elevation_pattern",
            dat_text(None, &[&["1001", "0.5", "1.0", date]]),
        ));
    }
    files
}

/// License format B dump: one AM station near Boulder, one FM station and
/// antenna 2002. `timestamp` fills `last_update_ts`.
pub fn license_b_dump(timestamp: &str, with_optional: bool) -> Vec<DumpFile> {
    let mut files = vec![
        DumpFile::new(
            "facility",
            dat_text(
                Some(&[
                    "facility_id",
                    "callsign",
                    "service_code",
                    "channel",
                    "frequency",
                    "community_served_city",
                    "community_served_state",
                    "facility_status",
                    "last_update_ts",
                ]),
                &[
                    &["201", "KBBB", "AM", "", "1190", "BOULDER", "CO", "LICEN", timestamp],
                    &["202", "KFMB", "FM", "", "98.5", "BOULDER", "CO", "LICEN", timestamp],
                ],
            ),
        ),
        DumpFile::new(
            "application",
            dat_text(
                Some(&[
                    "application_id",
                    "facility_id",
                    "application_type",
                    "file_number",
                    "application_status",
                ]),
                &[
                    &["a-201", "201", "LIC", "BL-201", "GRANTED"],
                    &["a-202", "202", "LIC", "BL-202", "GRANTED"],
                ],
            ),
        ),
        DumpFile::new(
            "app_location",
            dat_text(
                Some(&[
                    "application_id",
                    "aloc_loc_seq_id",
                    "aloc_lat_dir",
                    "aloc_lat_deg",
                    "aloc_lat_mm",
                    "aloc_lat_ss",
                    "aloc_long_dir",
                    "aloc_long_deg",
                    "aloc_long_mm",
                    "aloc_long_ss",
                ]),
                &[
                    &["a-201", "1", "N", "40", "0", "0", "W", "105", "16", "0"],
                    &["a-202", "1", "N", "40", "1", "0", "W", "105", "17", "0"],
                ],
            ),
        ),
        DumpFile::new(
            "app_antenna",
            dat_text(
                Some(&[
                    "application_id",
                    "aant_antenna_record_id",
                    "aant_antenna_id",
                    "aant_rc_amsl",
                    "aant_electrical_deg",
                    "aant_mechanical_deg",
                ]),
                &[&["a-202", "r-2002", "2002", "1800", "0.5", "0"]],
            ),
        ),
        DumpFile::new(
            "lkp_antenna",
            dat_text(
                Some(&["antenna_record_id", "antenna_id", "manufacturer", "model_number"]),
                &[&["r-2002", "2002", "RFS", "ESP-4"]],
            ),
        ),
        DumpFile::new(
            "lkp_antenna_field_value",
            dat_text(
                Some(&["antenna_record_id", "azimuth", "field_value"]),
                &[&["r-2002", "0", "1.0"], &["r-2002", "180", "0.6"]],
            ),
        ),
    ];
    if with_optional {
        files.push(DumpFile::new(
            "app_am_antenna",
            dat_text(
                Some(&["application_id", "aama_antenna_id", "aama_power", "aama_hours_operation"]),
                &[&["a-201", "am-1", "10", "U"]],
            ),
        ));
        files.push(DumpFile::new(
            "app_antenna_elevation_pattern",
            dat_text(
                Some(&["antenna_record_id", "depression_angle", "field_value"]),
                &[&["r-2002", "1.5", "0.9"]],
            ),
        ));
    }
    files
}
