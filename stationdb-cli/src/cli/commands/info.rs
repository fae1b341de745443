use anyhow::Result;
use clap::Args;
use colored::*;

use crate::cli::context::{resolve_reference, Context};
use crate::cli::output;

#[derive(Args)]
pub struct InfoArgs {
    /// Data set key or name
    pub reference: String,

    /// Also show a deleted data set (by key)
    #[arg(long)]
    pub deleted: bool,
}

pub fn run(args: InfoArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let handle = match (args.deleted, args.reference.trim().parse::<i32>()) {
        (true, Ok(key)) => db.resolve(&ctx.root, key, true)?,
        _ => resolve_reference(&db, &ctx.root, &args.reference)?,
    };

    output::section_header(&format!("Data set {}", handle.label()));
    let name = handle.name();
    let description = handle.description();
    let import_date = handle
        .import_date()
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let state = output::state_flags(&handle);
    output::tree_items(&[
        ("Key", output::key_label(&handle)),
        ("Name", if name.is_empty() { "-".dimmed().to_string() } else { name }),
        (
            "Description",
            if description.is_empty() { "-".dimmed().to_string() } else { description },
        ),
        ("Format", handle.format().to_string()),
        ("Records", handle.record_kind().to_string()),
        ("Id", handle.id().to_string()),
        ("Version", handle.version().to_string()),
        ("Content date", handle.source_date().format("%Y-%m-%d").to_string()),
        ("Imported", import_date),
        ("Store", handle.store_name().to_string()),
        ("State", if state.is_empty() { "available".green().to_string() } else { state.yellow().to_string() }),
    ]);
    Ok(())
}
