use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use humansize::{format_size, DECIMAL};
use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use url::Url;

use stationdb_core::config::DownloadConfig;
use stationdb_core::{CancelFlag, StationDbError, StationDbResult};

const CHUNK_SIZE: usize = 64 * 1024;

/// Smallest percentage step worth reporting
const PERCENT_STEP: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadEvent {
    /// Share of a response with a known length
    Percent(u8),
    /// Bytes received when the server sent no length
    Bytes(u64),
}

/// Fetches remote archives into temporary files under a workspace directory
pub struct Downloader {
    client: Client,
    workspace: PathBuf,
}

impl Downloader {
    pub fn new(config: &DownloadConfig, workspace: impl Into<PathBuf>) -> StationDbResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("StationDB/", env!("CARGO_PKG_VERSION")))
            // Covers the whole transfer including the body, not a single read
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| StationDbError::Network(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            workspace: workspace.into(),
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Stream `url` into a temporary archive.
    ///
    /// The file is deleted when the returned handle is dropped, and on every
    /// error path including cancellation.
    pub fn fetch(
        &self,
        url: &str,
        cancel: &CancelFlag,
        progress: Option<&dyn Fn(DownloadEvent)>,
    ) -> StationDbResult<NamedTempFile> {
        let url = Url::parse(url).map_err(|e| {
            StationDbError::Configuration(format!("invalid download URL '{}': {}", url, e))
        })?;
        cancel.check()?;

        std::fs::create_dir_all(&self.workspace)?;
        let mut archive = tempfile::Builder::new()
            .prefix("download-")
            .suffix(".zip")
            .tempfile_in(&self.workspace)?;

        tracing::info!("Downloading {}", url);
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| request_error(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(StationDbError::Network(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let mut tracker = ProgressTracker::new(response.content_length());
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            cancel.check()?;
            let read = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(StationDbError::Network(format!("reading {}: {}", url, e)));
                }
            };
            archive.write_all(&buf[..read])?;
            if let Some(event) = tracker.advance(read as u64) {
                if let Some(progress) = progress {
                    progress(event);
                }
            }
        }
        cancel.check()?;
        archive.flush()?;

        if let Some(total) = tracker.total {
            if tracker.received < total {
                return Err(StationDbError::Network(format!(
                    "{} ended after {} of {} bytes",
                    url, tracker.received, total
                )));
            }
        }

        tracing::info!(
            "Downloaded {} from {}",
            format_size(tracker.received, DECIMAL),
            url
        );
        Ok(archive)
    }
}

fn request_error(url: &Url, err: reqwest::Error) -> StationDbError {
    if err.is_timeout() {
        StationDbError::Network(format!("{} timed out: {}", url, err))
    } else if err.is_connect() {
        StationDbError::Network(format!("cannot connect to {}: {}", url, err))
    } else {
        StationDbError::Network(format!("requesting {}: {}", url, err))
    }
}

struct ProgressTracker {
    total: Option<u64>,
    received: u64,
    last_percent: Option<u8>,
}

impl ProgressTracker {
    fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|len| *len > 0),
            received: 0,
            last_percent: None,
        }
    }

    fn advance(&mut self, bytes: u64) -> Option<DownloadEvent> {
        self.received += bytes;
        let total = match self.total {
            Some(total) => total,
            None => return Some(DownloadEvent::Bytes(self.received)),
        };

        let percent = (self.received.min(total) * 100 / total) as u8;
        let due = match self.last_percent {
            None => true,
            Some(last) => percent >= last.saturating_add(PERCENT_STEP) || (percent == 100 && last < 100),
        };
        if due {
            self.last_percent = Some(percent);
            Some(DownloadEvent::Percent(percent))
        } else {
            None
        }
    }
}
