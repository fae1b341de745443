//! Data-set format types and the record kinds they carry

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::keys::{
    KEY_MOST_RECENT_LICENSE_A, KEY_MOST_RECENT_LICENSE_A_FM, KEY_MOST_RECENT_LICENSE_B,
    KEY_MOST_RECENT_WIRELESS,
};
use crate::StationDbError;

/// Kind of station record a data set provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum RecordKind {
    Tv,
    Fm,
    Wireless,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Tv => write!(f, "TV"),
            RecordKind::Fm => write!(f, "FM"),
            RecordKind::Wireless => write!(f, "Wireless"),
        }
    }
}

/// Source format of an external data set.
///
/// License format A is the legacy fixed-layout station-license dump, license
/// format B the newer header-bearing dump (also reachable as a live server),
/// and the wireless format a carrier base-station dump. Generic formats hold
/// user-composed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum FormatType {
    LicenseA,
    LicenseB,
    LicenseBLive,
    Wireless,
    LicenseAFm,
    GenericTv,
    GenericWireless,
    GenericFm,
}

impl FormatType {
    pub const ALL: [FormatType; 8] = [
        FormatType::LicenseA,
        FormatType::LicenseB,
        FormatType::LicenseBLive,
        FormatType::Wireless,
        FormatType::LicenseAFm,
        FormatType::GenericTv,
        FormatType::GenericWireless,
        FormatType::GenericFm,
    ];

    /// Integer stored in the index `db_type` column
    pub fn code(&self) -> i32 {
        match self {
            FormatType::LicenseA => 1,
            FormatType::LicenseB => 2,
            FormatType::LicenseBLive => 3,
            FormatType::Wireless => 4,
            FormatType::LicenseAFm => 5,
            FormatType::GenericTv => 6,
            FormatType::GenericWireless => 7,
            FormatType::GenericFm => 8,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        FormatType::ALL.iter().copied().find(|f| f.code() == code)
    }

    /// Primary record kind
    pub fn record_kind(&self) -> RecordKind {
        match self {
            FormatType::LicenseA | FormatType::LicenseB | FormatType::LicenseBLive => RecordKind::Tv,
            FormatType::GenericTv => RecordKind::Tv,
            FormatType::LicenseAFm | FormatType::GenericFm => RecordKind::Fm,
            FormatType::Wireless | FormatType::GenericWireless => RecordKind::Wireless,
        }
    }

    /// License format B dumps carry FM records alongside TV.
    pub fn supports_record_kind(&self, kind: RecordKind) -> bool {
        match self {
            FormatType::LicenseB | FormatType::LicenseBLive => {
                matches!(kind, RecordKind::Tv | RecordKind::Fm)
            }
            other => other.record_kind() == kind,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(
            self,
            FormatType::GenericTv | FormatType::GenericWireless | FormatType::GenericFm
        )
    }

    pub fn is_live(&self) -> bool {
        matches!(self, FormatType::LicenseBLive)
    }

    /// Formats that are produced by importing a flat-file dump
    pub fn is_importable(&self) -> bool {
        matches!(
            self,
            FormatType::LicenseA | FormatType::LicenseAFm | FormatType::LicenseB | FormatType::Wireless
        )
    }

    /// Highest schema version an import of this format can reach
    pub fn current_version(&self) -> i32 {
        match self {
            FormatType::LicenseA | FormatType::LicenseAFm => 3,
            FormatType::LicenseB | FormatType::LicenseBLive => 4,
            FormatType::Wireless => 1,
            FormatType::GenericTv | FormatType::GenericWireless | FormatType::GenericFm => 1,
        }
    }

    /// Position in data-set listings; lower sorts first.
    pub fn list_priority(&self) -> u8 {
        match self {
            FormatType::LicenseBLive => 0,
            FormatType::LicenseB => 1,
            FormatType::LicenseA => 2,
            FormatType::LicenseAFm => 3,
            FormatType::Wireless => 4,
            FormatType::GenericTv => 5,
            FormatType::GenericFm => 6,
            FormatType::GenericWireless => 7,
        }
    }

    /// Reserved key of the "most recent" virtual handle for this category, if any
    pub fn most_recent_key(&self) -> Option<i32> {
        match self {
            FormatType::LicenseA => Some(KEY_MOST_RECENT_LICENSE_A),
            FormatType::LicenseAFm => Some(KEY_MOST_RECENT_LICENSE_A_FM),
            FormatType::LicenseB => Some(KEY_MOST_RECENT_LICENSE_B),
            FormatType::Wireless => Some(KEY_MOST_RECENT_WIRELESS),
            _ => None,
        }
    }

    /// Prefix used in backing-store names
    pub fn store_prefix(&self) -> &'static str {
        match self {
            FormatType::LicenseA => "cdbs",
            FormatType::LicenseAFm => "cdbs_fm",
            FormatType::LicenseB => "lms",
            FormatType::LicenseBLive => "lms_live",
            FormatType::Wireless => "wireless",
            FormatType::GenericTv => "generic_tv",
            FormatType::GenericFm => "generic_fm",
            FormatType::GenericWireless => "generic_wl",
        }
    }

    /// Short code used in generated data-set ids
    pub fn id_code(&self) -> &'static str {
        match self {
            FormatType::LicenseA => "CDBS",
            FormatType::LicenseAFm => "CDBS FM",
            FormatType::LicenseB | FormatType::LicenseBLive => "LMS",
            FormatType::Wireless => "WL",
            FormatType::GenericTv => "TV",
            FormatType::GenericFm => "FM",
            FormatType::GenericWireless => "WL",
        }
    }

    /// Key in `[download.urls]` and on the command line
    pub fn config_key(&self) -> &'static str {
        match self {
            FormatType::LicenseA => "license_a",
            FormatType::LicenseAFm => "license_a_fm",
            FormatType::LicenseB => "license_b",
            FormatType::LicenseBLive => "license_b_live",
            FormatType::Wireless => "wireless",
            FormatType::GenericTv => "generic_tv",
            FormatType::GenericFm => "generic_fm",
            FormatType::GenericWireless => "generic_wireless",
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FormatType::LicenseA => "License A TV",
            FormatType::LicenseAFm => "License A FM",
            FormatType::LicenseB => "License B",
            FormatType::LicenseBLive => "License B (live)",
            FormatType::Wireless => "Wireless",
            FormatType::GenericTv => "Generic TV",
            FormatType::GenericFm => "Generic FM",
            FormatType::GenericWireless => "Generic wireless",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for FormatType {
    type Err = StationDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        FormatType::ALL
            .iter()
            .copied()
            .find(|f| f.config_key() == normalized)
            .ok_or_else(|| StationDbError::InvalidInput(format!("Unknown data set format: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for format in FormatType::ALL {
            assert_eq!(FormatType::from_code(format.code()), Some(format));
        }
        assert_eq!(FormatType::from_code(0), None);
        assert_eq!(FormatType::from_code(99), None);
    }

    #[test]
    fn test_record_kind_support() {
        assert!(FormatType::LicenseB.supports_record_kind(RecordKind::Fm));
        assert!(FormatType::LicenseB.supports_record_kind(RecordKind::Tv));
        assert!(!FormatType::LicenseB.supports_record_kind(RecordKind::Wireless));
        assert!(!FormatType::LicenseA.supports_record_kind(RecordKind::Fm));
        assert!(FormatType::LicenseAFm.supports_record_kind(RecordKind::Fm));
        assert_eq!(FormatType::GenericWireless.record_kind(), RecordKind::Wireless);
    }

    #[test]
    fn test_list_priorities_are_distinct() {
        let mut priorities: Vec<u8> = FormatType::ALL.iter().map(|f| f.list_priority()).collect();
        priorities.sort_unstable();
        priorities.dedup();
        assert_eq!(priorities.len(), FormatType::ALL.len());
    }

    #[test]
    fn test_parse_from_config_key() {
        assert_eq!("license-b".parse::<FormatType>().unwrap(), FormatType::LicenseB);
        assert_eq!("LICENSE_A_FM".parse::<FormatType>().unwrap(), FormatType::LicenseAFm);
        assert!("cdbs".parse::<FormatType>().is_err());
    }

    #[test]
    fn test_only_dump_formats_have_most_recent_keys() {
        for format in FormatType::ALL {
            assert_eq!(format.most_recent_key().is_some(), format.is_importable());
        }
    }
}
