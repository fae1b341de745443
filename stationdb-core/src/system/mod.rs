pub mod paths;

// Re-export commonly used functions
pub use paths::{
    stationdb_config_path, stationdb_data_dir, stationdb_home, stationdb_live_credentials_path,
    stationdb_workspace_dir,
};
