use anyhow::Result;
use clap::Args;
use colored::*;
use std::path::PathBuf;

use stationdb_core::FormatType;
use stationdb_download::{DownloadProgress, PipelineEvent};
use stationdb_storage::{ImportEvent, ImportOutcome, ImportRequest, ImportSource};

use crate::cli::context::Context;
use crate::cli::interrupt::cancel_on_interrupt;
use crate::cli::output;

#[derive(Args)]
pub struct ImportArgs {
    /// Format of the dump
    pub format: FormatType,

    /// Directory of .dat files or a zip archive
    pub path: PathBuf,

    /// Name for the new data set (must be unique)
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
}

pub fn request(ctx: &Context, name: &Option<String>, description: &Option<String>) -> ImportRequest {
    let mut request = ImportRequest::new(ctx.root.as_str());
    request.name = name.clone();
    request.description = description.clone();
    request
}

pub fn run(args: ImportArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let progress = DownloadProgress::new(&format!("Importing {}", args.format));
    let on_event = |event: &ImportEvent| progress.handle(&PipelineEvent::Import(event.clone()));

    let imported = db.import(
        args.format,
        &ImportSource::from_path(&args.path),
        &request(ctx, &args.name, &args.description),
        cancel_on_interrupt("import"),
        Some(&on_event),
    )?;
    progress.finish_with_message("Import complete");

    report(&imported.outcome, args.name.as_deref());
    Ok(())
}

/// Summary printed after an import or download
pub fn report(outcome: &ImportOutcome, requested_name: Option<&str>) {
    if let Some(name) = requested_name {
        if !outcome.name_saved {
            output::warning(&format!(
                "Name '{}' is already in use, the data set was saved without a name",
                name
            ));
        }
    }
    output::success(&format!(
        "Imported {} as data set {}",
        outcome.id.bold(),
        outcome.key.to_string().cyan()
    ));
    let mut items: Vec<(&str, String)> = vec![
        ("Format", outcome.format.to_string()),
        ("Version", outcome.version.to_string()),
        ("Store", outcome.store_name.clone()),
    ];
    let rows: u64 = outcome.tables.iter().map(|t| t.rows).sum();
    items.push((
        "Records",
        format!("{} in {} table(s)", rows, outcome.tables.len()),
    ));
    output::tree_items(&items);
}
