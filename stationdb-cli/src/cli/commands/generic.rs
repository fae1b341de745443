use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::*;
use std::path::PathBuf;

use stationdb_core::FormatType;
use stationdb_storage::GenericRecord;

use crate::cli::context::{resolve_reference, Context};
use crate::cli::output;

#[derive(Subcommand)]
pub enum GenericCommands {
    /// Create an empty user-composed data set
    Create(CreateArgs),

    /// Append records from a JSON array
    Append(AppendArgs),
}

#[derive(Args)]
pub struct CreateArgs {
    /// One of the generic formats
    pub format: FormatType,

    #[arg(long, default_value = "")]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Args)]
pub struct AppendArgs {
    /// Data set key or name
    pub reference: String,

    /// JSON file holding an array of station records
    pub file: PathBuf,
}

pub fn run(command: GenericCommands, ctx: &Context) -> Result<()> {
    match command {
        GenericCommands::Create(args) => create(args, ctx),
        GenericCommands::Append(args) => append(args, ctx),
    }
}

fn create(args: CreateArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let handle = db.create_generic(&ctx.root, args.format, &args.name, &args.description)?;
    if !args.name.trim().is_empty() && handle.name().is_empty() {
        output::warning(&format!(
            "Name '{}' is already in use, the data set was saved without a name",
            args.name.trim()
        ));
    }
    output::success(&format!(
        "Created {} data set {}",
        args.format,
        handle.key().to_string().cyan()
    ));
    Ok(())
}

fn append(args: AppendArgs, ctx: &Context) -> Result<()> {
    let records = GenericRecord::load_json(&args.file)
        .with_context(|| format!("Failed to read records from {}", args.file.display()))?;
    let db = ctx.open_initialized()?;
    let handle = resolve_reference(&db, &ctx.root, &args.reference)?;

    let mut session = db.open_session(&ctx.root, handle.key())?;
    let keys = session.append(&records)?;
    let appended = session.close()?;

    match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => output::success(&format!(
            "Appended {} record(s) to data set {} (keys {}..={})",
            appended,
            handle.key(),
            first,
            last
        )),
        _ => output::empty("No records to append"),
    }
    Ok(())
}
