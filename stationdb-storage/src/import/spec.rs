//! Declarative file and field layouts for the importable formats

use stationdb_core::FormatType;

/// Minimum header name length used by every shipped layout
pub const HEADER_MIN_NAME_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub is_text: bool,
    /// Schema version that introduced the field. When absent from a file
    /// the import is capped at `min_version - 1` instead of failing.
    pub min_version: Option<i32>,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            sql_type: "TEXT",
            is_text: true,
            min_version: None,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            sql_type: "INTEGER",
            is_text: false,
            min_version: None,
        }
    }

    pub const fn real(name: &'static str) -> Self {
        Self {
            name,
            sql_type: "REAL",
            is_text: false,
            min_version: None,
        }
    }

    pub const fn since(mut self, version: i32) -> Self {
        self.min_version = Some(version);
        self
    }
}

/// Where a file's column names come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldNames {
    /// No header line; columns follow `fields` in order
    Fixed,
    /// First record of the file lists the column names
    Header,
}

#[derive(Debug, Clone, Copy)]
pub struct FileSpec {
    pub table: &'static str,
    pub names: FieldNames,
    pub fields: &'static [FieldSpec],
    /// Extra DDL run after the table is created; `{table}` is substituted
    pub extra_ddl: &'static [&'static str],
    /// Column whose values feed content-date inference
    pub date_field: Option<&'static str>,
    pub required: bool,
    /// Schema version that introduced the file
    pub min_version: Option<i32>,
    pub header_min_name_len: usize,
}

impl FileSpec {
    pub fn file_name(&self) -> String {
        format!("{}.dat", self.table)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FormatSpec {
    pub format: FormatType,
    pub version: i32,
    pub files: &'static [FileSpec],
}

const fn fixed(table: &'static str, fields: &'static [FieldSpec]) -> FileSpec {
    FileSpec {
        table,
        names: FieldNames::Fixed,
        fields,
        extra_ddl: &[],
        date_field: None,
        required: true,
        min_version: None,
        header_min_name_len: HEADER_MIN_NAME_LEN,
    }
}

const fn header(table: &'static str, fields: &'static [FieldSpec]) -> FileSpec {
    FileSpec {
        names: FieldNames::Header,
        ..fixed(table, fields)
    }
}

const fn dated(mut file: FileSpec, field: &'static str) -> FileSpec {
    file.date_field = Some(field);
    file
}

const fn indexed(mut file: FileSpec, ddl: &'static [&'static str]) -> FileSpec {
    file.extra_ddl = ddl;
    file
}

const fn optional_since(mut file: FileSpec, version: i32) -> FileSpec {
    file.required = false;
    file.min_version = Some(version);
    file
}

// License format A: fixed layouts, no header line.

const CDBS_FACILITY: &[FieldSpec] = &[
    FieldSpec::int("facility_id"),
    FieldSpec::text("fac_callsign"),
    FieldSpec::text("fac_service"),
    FieldSpec::int("fac_channel"),
    FieldSpec::real("fac_frequency"),
    FieldSpec::text("fac_status"),
    FieldSpec::text("comm_city"),
    FieldSpec::text("comm_state"),
    FieldSpec::text("last_change_date"),
];

const CDBS_APPLICATION: &[FieldSpec] = &[
    FieldSpec::int("application_id"),
    FieldSpec::int("facility_id"),
    FieldSpec::text("app_type"),
    FieldSpec::text("file_prefix"),
    FieldSpec::text("app_arn"),
    FieldSpec::text("last_change_date"),
];

const CDBS_APP_LOCATION: &[FieldSpec] = &[
    FieldSpec::int("application_id"),
    FieldSpec::text("lat_dir"),
    FieldSpec::int("lat_deg"),
    FieldSpec::int("lat_min"),
    FieldSpec::real("lat_sec"),
    FieldSpec::text("lon_dir"),
    FieldSpec::int("lon_deg"),
    FieldSpec::int("lon_min"),
    FieldSpec::real("lon_sec"),
    FieldSpec::text("last_change_date"),
];

const CDBS_TV_ENG_DATA: &[FieldSpec] = &[
    FieldSpec::int("application_id"),
    FieldSpec::int("facility_id"),
    FieldSpec::int("station_channel"),
    FieldSpec::real("effective_erp"),
    FieldSpec::int("antenna_id"),
    FieldSpec::real("rcamsl_horiz_mtr"),
    FieldSpec::text("last_change_date"),
];

const CDBS_FM_ENG_DATA: &[FieldSpec] = &[
    FieldSpec::int("application_id"),
    FieldSpec::int("facility_id"),
    FieldSpec::int("station_class_channel"),
    FieldSpec::real("horiz_erp"),
    FieldSpec::int("antenna_id"),
    FieldSpec::real("rcamsl_horiz_mtr"),
    FieldSpec::text("last_change_date"),
];

const CDBS_ANT_MAKE: &[FieldSpec] = &[
    FieldSpec::int("antenna_id"),
    FieldSpec::text("ant_make"),
    FieldSpec::text("ant_model_num"),
    FieldSpec::text("last_change_date"),
];

const CDBS_ANT_PATTERN: &[FieldSpec] = &[
    FieldSpec::int("antenna_id"),
    FieldSpec::real("azimuth"),
    FieldSpec::real("field_value"),
    FieldSpec::text("last_change_date"),
];

const CDBS_AM_ANT_SYS: &[FieldSpec] = &[
    FieldSpec::int("ant_sys_id"),
    FieldSpec::int("application_id"),
    FieldSpec::text("am_dom_status"),
    FieldSpec::real("power"),
    FieldSpec::text("hours_operation"),
    FieldSpec::text("last_change_date"),
];

const CDBS_ELEVATION_PATTERN: &[FieldSpec] = &[
    FieldSpec::int("antenna_id"),
    FieldSpec::real("depression_angle"),
    FieldSpec::real("field_value"),
    FieldSpec::text("last_change_date"),
];

const LICENSE_A_FILES: &[FileSpec] = &[
    indexed(
        dated(fixed("facility", CDBS_FACILITY), "last_change_date"),
        &["CREATE INDEX {table}_facility_id ON {table} (facility_id)"],
    ),
    indexed(
        fixed("application", CDBS_APPLICATION),
        &["CREATE INDEX {table}_application_id ON {table} (application_id)"],
    ),
    fixed("app_location", CDBS_APP_LOCATION),
    dated(fixed("tv_eng_data", CDBS_TV_ENG_DATA), "last_change_date"),
    indexed(
        fixed("ant_make", CDBS_ANT_MAKE),
        &["CREATE INDEX {table}_antenna_id ON {table} (antenna_id)"],
    ),
    fixed("ant_pattern", CDBS_ANT_PATTERN),
    optional_since(fixed("am_ant_sys", CDBS_AM_ANT_SYS), 2),
    optional_since(fixed("elevation_pattern", CDBS_ELEVATION_PATTERN), 3),
];

const LICENSE_A_FM_FILES: &[FileSpec] = &[
    indexed(
        dated(fixed("facility", CDBS_FACILITY), "last_change_date"),
        &["CREATE INDEX {table}_facility_id ON {table} (facility_id)"],
    ),
    fixed("application", CDBS_APPLICATION),
    fixed("app_location", CDBS_APP_LOCATION),
    dated(fixed("fm_eng_data", CDBS_FM_ENG_DATA), "last_change_date"),
    fixed("ant_make", CDBS_ANT_MAKE),
    fixed("ant_pattern", CDBS_ANT_PATTERN),
    optional_since(fixed("elevation_pattern", CDBS_ELEVATION_PATTERN), 3),
];

// License format B: header line names the columns.

const LMS_FACILITY: &[FieldSpec] = &[
    FieldSpec::int("facility_id"),
    FieldSpec::text("callsign"),
    FieldSpec::text("service_code"),
    FieldSpec::int("channel"),
    FieldSpec::real("frequency"),
    FieldSpec::text("community_served_city"),
    FieldSpec::text("community_served_state"),
    FieldSpec::text("facility_status"),
    FieldSpec::text("last_update_ts"),
];

const LMS_APPLICATION: &[FieldSpec] = &[
    FieldSpec::text("application_id"),
    FieldSpec::int("facility_id"),
    FieldSpec::text("application_type"),
    FieldSpec::text("file_number"),
    FieldSpec::text("application_status"),
];

const LMS_APP_LOCATION: &[FieldSpec] = &[
    FieldSpec::text("application_id"),
    FieldSpec::int("aloc_loc_seq_id"),
    FieldSpec::text("aloc_lat_dir"),
    FieldSpec::int("aloc_lat_deg"),
    FieldSpec::int("aloc_lat_mm"),
    FieldSpec::real("aloc_lat_ss"),
    FieldSpec::text("aloc_long_dir"),
    FieldSpec::int("aloc_long_deg"),
    FieldSpec::int("aloc_long_mm"),
    FieldSpec::real("aloc_long_ss"),
];

const LMS_APP_ANTENNA: &[FieldSpec] = &[
    FieldSpec::text("application_id"),
    FieldSpec::text("aant_antenna_record_id"),
    FieldSpec::text("aant_antenna_id"),
    FieldSpec::real("aant_rc_amsl"),
    FieldSpec::real("aant_electrical_deg").since(3),
    FieldSpec::real("aant_mechanical_deg").since(3),
];

const LMS_LKP_ANTENNA: &[FieldSpec] = &[
    FieldSpec::text("antenna_record_id"),
    FieldSpec::text("antenna_id"),
    FieldSpec::text("manufacturer"),
    FieldSpec::text("model_number"),
];

const LMS_ANTENNA_FIELD_VALUE: &[FieldSpec] = &[
    FieldSpec::text("antenna_record_id"),
    FieldSpec::real("azimuth"),
    FieldSpec::real("field_value"),
];

const LMS_APP_AM_ANTENNA: &[FieldSpec] = &[
    FieldSpec::text("application_id"),
    FieldSpec::text("aama_antenna_id"),
    FieldSpec::real("aama_power"),
    FieldSpec::text("aama_hours_operation"),
];

const LMS_ELEVATION_PATTERN: &[FieldSpec] = &[
    FieldSpec::text("antenna_record_id"),
    FieldSpec::real("depression_angle"),
    FieldSpec::real("field_value"),
];

const LICENSE_B_FILES: &[FileSpec] = &[
    indexed(
        dated(header("facility", LMS_FACILITY), "last_update_ts"),
        &["CREATE INDEX {table}_facility_id ON {table} (facility_id)"],
    ),
    indexed(
        header("application", LMS_APPLICATION),
        &["CREATE INDEX {table}_application_id ON {table} (application_id)"],
    ),
    header("app_location", LMS_APP_LOCATION),
    header("app_antenna", LMS_APP_ANTENNA),
    indexed(
        header("lkp_antenna", LMS_LKP_ANTENNA),
        &["CREATE INDEX {table}_antenna_id ON {table} (antenna_id)"],
    ),
    header("lkp_antenna_field_value", LMS_ANTENNA_FIELD_VALUE),
    optional_since(header("app_am_antenna", LMS_APP_AM_ANTENNA), 2),
    optional_since(header("app_antenna_elevation_pattern", LMS_ELEVATION_PATTERN), 4),
];

// Wireless carrier format

const WIRELESS_BASE_STATION: &[FieldSpec] = &[
    FieldSpec::text("cell_site_id"),
    FieldSpec::text("sector_id"),
    FieldSpec::text("call_sign"),
    FieldSpec::real("latitude"),
    FieldSpec::real("longitude"),
    FieldSpec::real("height"),
    FieldSpec::real("azimuth"),
    FieldSpec::real("downtilt"),
    FieldSpec::text("antenna_id"),
];

const WIRELESS_PATTERN: &[FieldSpec] = &[
    FieldSpec::text("antenna_id"),
    FieldSpec::real("azimuth"),
    FieldSpec::real("attenuation"),
];

const WIRELESS_FILES: &[FileSpec] = &[
    header("base_station", WIRELESS_BASE_STATION),
    header("pattern", WIRELESS_PATTERN),
];

static LICENSE_A: FormatSpec = FormatSpec {
    format: FormatType::LicenseA,
    version: 3,
    files: LICENSE_A_FILES,
};

static LICENSE_A_FM: FormatSpec = FormatSpec {
    format: FormatType::LicenseAFm,
    version: 3,
    files: LICENSE_A_FM_FILES,
};

static LICENSE_B: FormatSpec = FormatSpec {
    format: FormatType::LicenseB,
    version: 4,
    files: LICENSE_B_FILES,
};

static WIRELESS: FormatSpec = FormatSpec {
    format: FormatType::Wireless,
    version: 1,
    files: WIRELESS_FILES,
};

/// Layout for an importable format
pub fn format_spec(format: FormatType) -> Option<&'static FormatSpec> {
    match format {
        FormatType::LicenseA => Some(&LICENSE_A),
        FormatType::LicenseAFm => Some(&LICENSE_A_FM),
        FormatType::LicenseB => Some(&LICENSE_B),
        FormatType::Wireless => Some(&WIRELESS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_importable_format_has_a_layout() {
        for format in FormatType::ALL {
            let spec = format_spec(format);
            assert_eq!(spec.is_some(), format.is_importable(), "{}", format);
            if let Some(spec) = spec {
                assert_eq!(spec.version, format.current_version());
                assert_eq!(spec.format, format);
            }
        }
    }

    #[test]
    fn test_optional_files_carry_a_version() {
        for format in FormatType::ALL.iter().filter(|f| f.is_importable()) {
            let spec = format_spec(*format).unwrap();
            for file in spec.files {
                if !file.required {
                    let version = file.min_version.expect(file.table);
                    assert!(version <= spec.version);
                }
                if let Some(date) = file.date_field {
                    assert!(file.fields.iter().any(|f| f.name == date));
                }
            }
        }
    }

    #[test]
    fn test_file_names() {
        let spec = format_spec(FormatType::LicenseB).unwrap();
        assert_eq!(spec.files[0].file_name(), "facility.dat");
        assert_eq!(spec.files[0].names, FieldNames::Header);
        assert_eq!(
            format_spec(FormatType::LicenseA).unwrap().files[0].names,
            FieldNames::Fixed
        );
    }
}
