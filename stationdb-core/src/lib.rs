//! Core utilities and types shared across all StationDB crates

pub mod config;
pub mod error;
pub mod system;
pub mod types;

// Re-export commonly used types
pub use config::{load_config, save_config, Config};
pub use error::{Severity, StationDbError, StationDbResult};

pub use types::{
    is_reserved_key, CancelFlag, FormatType, RecordKind, KEY_LIVE, KEY_MOST_RECENT_LICENSE_A,
    KEY_MOST_RECENT_LICENSE_A_FM, KEY_MOST_RECENT_LICENSE_B, KEY_MOST_RECENT_WIRELESS,
    RESERVED_KEY_MAX, RESERVED_KEY_MIN,
};

pub use system::{
    stationdb_config_path, stationdb_data_dir, stationdb_home, stationdb_live_credentials_path,
    stationdb_workspace_dir,
};

/// Version information for the StationDB project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
