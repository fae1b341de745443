use stationdb_core::{CancelFlag, FormatType, StationDbError, StationDbResult};
use stationdb_storage::{ImportEvent, ImportRequest, ImportSource, Imported, ListFilter, StationDb};

use crate::fetch::{DownloadEvent, Downloader};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    Download(DownloadEvent),
    Import(ImportEvent),
}

#[derive(Debug, Clone)]
pub struct Downloaded {
    pub imported: Imported,
    /// Keys of earlier downloads soft-deleted by the retention policy
    pub retired: Vec<i32>,
}

impl Downloaded {
    pub fn key(&self) -> i32 {
        self.imported.outcome.key
    }
}

/// Download the configured archive for `format` and import it as a new data set.
///
/// Nothing is registered when the transfer fails or is cancelled. The
/// temporary archive is removed whatever the outcome.
pub fn download(
    service: &StationDb,
    downloader: &Downloader,
    format: FormatType,
    request: &ImportRequest,
    cancel: CancelFlag,
    progress: Option<&(dyn Fn(&PipelineEvent) + Sync)>,
) -> StationDbResult<Downloaded> {
    if !format.is_importable() {
        return Err(StationDbError::InvalidInput(format!(
            "{} data sets cannot be downloaded",
            format
        )));
    }
    let url = service
        .config()
        .download
        .urls
        .get(format.config_key())
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| {
            StationDbError::Configuration(format!(
                "no download URL configured for {} (download.urls.{})",
                format,
                format.config_key()
            ))
        })?;

    let on_transfer = progress.map(|p| move |event: DownloadEvent| p(&PipelineEvent::Download(event)));
    let archive = downloader.fetch(
        url,
        &cancel,
        on_transfer.as_ref().map(|f| f as &dyn Fn(DownloadEvent)),
    )?;

    let on_import = progress.map(|p| move |event: &ImportEvent| p(&PipelineEvent::Import(event.clone())));
    let result = service.import(
        format,
        &ImportSource::Archive(archive.path().to_path_buf()),
        &request.clone().downloaded(),
        cancel,
        on_import.as_ref().map(|f| f as &(dyn Fn(&ImportEvent) + Sync)),
    );

    let archive_path = archive.path().to_path_buf();
    if let Err(e) = archive.close() {
        tracing::warn!(
            "Failed to remove downloaded archive {}: {}",
            archive_path.display(),
            e
        );
    }

    let imported = result?;
    tracing::info!(
        "Downloaded {} as data set {} ({})",
        format,
        imported.outcome.key,
        imported.outcome.id
    );

    let retired = if service.config().download.delete_previous {
        retire_previous(service, &imported)
    } else {
        Vec::new()
    };
    Ok(Downloaded { imported, retired })
}

/// Soft-delete earlier downloads of the same format. Data sets in use are
/// left alone.
fn retire_previous(service: &StationDb, imported: &Imported) -> Vec<i32> {
    let root_db = imported.handle.root_db();
    let filter = ListFilter::all()
        .with_format(imported.outcome.format)
        .concrete_only();
    let handles = match service.list(root_db, &filter) {
        Ok(handles) => handles,
        Err(e) => {
            tracing::warn!("Skipping cleanup of earlier downloads: {}", e);
            return Vec::new();
        }
    };

    let mut retired = Vec::new();
    for handle in handles {
        if handle.key() == imported.outcome.key || !handle.is_download() {
            continue;
        }
        if handle.is_locked() {
            tracing::warn!("Keeping earlier download {}, it is in use", handle.label());
            continue;
        }
        match service.delete(root_db, handle.key()) {
            Ok(()) => retired.push(handle.key()),
            Err(e) => tracing::warn!("Keeping earlier download {}: {}", handle.label(), e),
        }
    }
    retired
}
