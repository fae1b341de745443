//! Test utilities for the StationDB workspace
//!
//! This crate provides common test helpers and fixtures for testing across
//! the StationDB workspace.
//!
//! # Features
//!
//! - **Test Environment**: an isolated data directory with a configured
//!   [`StationDb`](stationdb_storage::StationDb) and an initialized root
//! - **Fixtures**: flat-file writers, zip builders and small license dumps

pub mod environment;
pub mod fixtures;

// Re-export commonly used items
pub use environment::{TestConfig, TestEnvironment};
pub use fixtures::{
    build_zip, dat_text, license_a_dump, license_b_dump, write_dat, write_dump, DumpFile,
};

// Re-export test dependencies for convenience
pub use anyhow::{Context, Result};
pub use tempfile;

/// Initialize test logging (safe to call from every test)
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STATIONDB_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Run a test with a clean environment
///
/// # Example
/// ```rust
/// use stationdb_test::with_test_env;
///
/// with_test_env(|env| {
///     assert!(env.db().root_exists(env.root_db())?);
///     Ok(())
/// })
/// .unwrap();
/// ```
pub fn with_test_env<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&TestEnvironment) -> Result<R>,
{
    let env = TestEnvironment::new()?;
    f(&env)
}
