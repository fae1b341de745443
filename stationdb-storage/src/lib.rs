//! Data-set registry, connection locking and import pipeline for StationDB
//!
//! A root database carries the `ext_db` index of imported data sets. Each
//! data set lives in its own backing store; the [`Registry`] caches one
//! [`ExtDb`] handle per index row plus the synthesized live and "most recent"
//! handles, and hands out connections under the advisory lock.

pub mod backend;
pub mod connection;
pub mod generic;
pub mod import;
pub mod live;
pub mod registry;
pub mod schema;
pub mod search;
pub mod service;

pub use backend::{ConnectionPool, DbConnection};
pub use connection::{ConnectionSource, ExtDbConnection, LockToken};
pub use generic::{GenericRecord, GenericSession};
pub use import::{ImportEvent, ImportOutcome, ImportRequest, ImportSource, TableSummary};
pub use live::{LiveCredentials, LivePool, LiveSlot};
pub use registry::{ExtDb, ExtDbMeta, ListFilter, Registry};
pub use search::{AmStation, AntennaMatch};
pub use service::{Imported, StationDb};
