use anyhow::Result;
use clap::Args;
use colored::*;

use stationdb_core::{stationdb_workspace_dir, FormatType};
use stationdb_download::{download, DownloadProgress, Downloader, PipelineEvent};
use stationdb_storage::StationDb;

use super::import::{report, request};
use crate::cli::context::Context;
use crate::cli::interrupt::cancel_on_interrupt;
use crate::cli::output;

#[derive(Args)]
pub struct DownloadArgs {
    /// Format to download
    pub format: FormatType,

    /// Name for the new data set (must be unique)
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Keep earlier downloads of this format
    #[arg(long)]
    pub keep_previous: bool,
}

pub fn run(args: DownloadArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.config.clone();
    if args.keep_previous {
        config.download.delete_previous = false;
    }
    let downloader = Downloader::new(&config.download, stationdb_workspace_dir())?;
    let db = ctx.check_root(StationDb::open(config)?)?;

    let progress = DownloadProgress::new(&format!("Downloading {}", args.format));
    let on_event = |event: &PipelineEvent| progress.handle(event);
    let downloaded = download(
        &db,
        &downloader,
        args.format,
        &request(ctx, &args.name, &args.description),
        cancel_on_interrupt("download"),
        Some(&on_event),
    )?;
    progress.finish_with_message("Download complete");

    report(&downloaded.imported.outcome, args.name.as_deref());
    for key in &downloaded.retired {
        output::info(&format!(
            "Removed earlier download {}",
            key.to_string().dimmed()
        ));
    }
    Ok(())
}
