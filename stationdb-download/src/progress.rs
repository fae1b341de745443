use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use stationdb_storage::ImportEvent;

use crate::fetch::DownloadEvent;
use crate::pipeline::PipelineEvent;

/// Terminal progress for a download followed by its import
pub struct DownloadProgress {
    bar: ProgressBar,
}

impl DownloadProgress {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(percent_style());
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A bar that draws nothing, for quiet runs and tests
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn handle(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::Download(DownloadEvent::Percent(percent)) => {
                self.bar.set_position(u64::from(*percent));
            }
            PipelineEvent::Download(DownloadEvent::Bytes(bytes)) => {
                if self.bar.length().is_some() {
                    self.bar.set_style(bytes_style());
                    self.bar.unset_length();
                }
                self.bar.set_position(*bytes);
            }
            PipelineEvent::Import(ImportEvent::FileStarted { table, index, total }) => {
                if *index == 0 {
                    self.bar.set_style(percent_style());
                    self.bar.set_length(*total as u64);
                }
                self.bar.set_position(*index as u64);
                self.bar.set_message(format!("Importing {}", table));
            }
            PipelineEvent::Import(ImportEvent::FileFinished { .. }) => self.bar.inc(1),
            PipelineEvent::Import(ImportEvent::FileSkipped { table }) => {
                self.bar.println(format!("  {} not in archive, skipped", table));
            }
            PipelineEvent::Import(ImportEvent::Registering) => {
                self.bar.set_message("Registering data set".to_string());
            }
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Drop for DownloadProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }
}

fn percent_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos:>7}/{len:7} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━─")
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_download_then_import() {
        let progress = DownloadProgress::hidden();
        progress.handle(&PipelineEvent::Download(DownloadEvent::Percent(45)));
        assert_eq!(progress.position(), 45);

        progress.handle(&PipelineEvent::Import(ImportEvent::FileStarted {
            table: "facility".to_string(),
            index: 0,
            total: 6,
        }));
        assert_eq!(progress.position(), 0);
        progress.handle(&PipelineEvent::Import(ImportEvent::FileFinished {
            table: "facility".to_string(),
            rows: 2,
        }));
        assert_eq!(progress.position(), 1);
        progress.finish_with_message("done");
    }

    #[test]
    fn test_unknown_length_counts_bytes() {
        let progress = DownloadProgress::hidden();
        progress.handle(&PipelineEvent::Download(DownloadEvent::Bytes(4096)));
        assert_eq!(progress.position(), 4096);
    }
}
