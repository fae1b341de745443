//! Download pipeline for StationDB
//!
//! Fetches the published archive of a data-set format over HTTP, hands it to
//! the import pipeline and applies the retention policy for earlier
//! downloads.

pub mod fetch;
pub mod pipeline;
pub mod progress;

pub use fetch::{DownloadEvent, Downloader};
pub use pipeline::{download, Downloaded, PipelineEvent};
pub use progress::DownloadProgress;
