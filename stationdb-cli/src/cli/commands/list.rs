use anyhow::Result;
use clap::Args;
use colored::*;

use stationdb_core::{FormatType, RecordKind};
use stationdb_storage::ListFilter;

use crate::cli::context::Context;
use crate::cli::output::{self, create_standard_table, header_cell, key_label, state_flags};

#[derive(Args)]
pub struct ListArgs {
    /// Only data sets of this format
    #[arg(long)]
    pub format: Option<FormatType>,

    /// Only data sets that provide this kind of record
    #[arg(long)]
    pub kind: Option<RecordKind>,

    /// Minimum schema version
    #[arg(long)]
    pub min_version: Option<i32>,

    /// Hide user-composed data sets
    #[arg(long)]
    pub no_generic: bool,

    /// Hide the live server and the most-recent aliases
    #[arg(long)]
    pub concrete: bool,

    /// Include deleted data sets
    #[arg(long)]
    pub deleted: bool,
}

impl ListArgs {
    fn filter(&self) -> ListFilter {
        let mut filter = ListFilter::all();
        filter.format = self.format;
        filter.record_kind = self.kind;
        filter.min_version = self.min_version;
        filter.include_generic = !self.no_generic;
        filter.include_deleted = self.deleted;
        filter.exclude_reserved = self.concrete;
        filter
    }
}

pub fn run(args: ListArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let handles = db.list(&ctx.root, &args.filter())?;
    if handles.is_empty() {
        output::empty(&format!("No data sets in '{}'", ctx.root));
        return Ok(());
    }

    let mut table = create_standard_table();
    table.set_header(vec![
        header_cell("Key"),
        header_cell("Name"),
        header_cell("Format"),
        header_cell("Date"),
        header_cell("Version"),
        header_cell("State"),
    ]);
    for handle in &handles {
        table.add_row(vec![
            key_label(handle),
            handle.label(),
            handle.format().to_string(),
            handle.source_date().format("%Y-%m-%d").to_string(),
            handle.version().to_string(),
            state_flags(handle),
        ]);
    }
    println!("{}", table);
    println!(
        "{} data set(s) in {}",
        handles.len().to_string().cyan(),
        ctx.root.bold()
    );
    Ok(())
}
