use anyhow::Result;
use clap::Args;
use colored::*;

use crate::cli::context::{resolve_reference, Context};
use crate::cli::output;

#[derive(Args)]
pub struct DeleteArgs {
    /// Data set key or name
    pub reference: String,
}

#[derive(Args)]
pub struct RenameArgs {
    /// Data set key or name
    pub reference: String,

    /// New name; omit to clear the name
    pub name: Option<String>,
}

#[derive(Args)]
pub struct DescribeArgs {
    /// Data set key or name
    pub reference: String,

    pub description: String,
}

#[derive(Args)]
pub struct UnlockArgs {
    /// Data set key or name
    pub reference: String,
}

pub fn delete(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let handle = resolve_reference(&db, &ctx.root, &args.reference)?;
    db.delete(&ctx.root, handle.key())?;
    output::success(&format!(
        "Deleted data set {} ({})",
        handle.key().to_string().cyan(),
        handle.label()
    ));
    Ok(())
}

pub fn rename(args: RenameArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let handle = resolve_reference(&db, &ctx.root, &args.reference)?;
    let name = args.name.unwrap_or_default();
    db.rename(&ctx.root, handle.key(), &name)?;
    if name.trim().is_empty() {
        output::success(&format!("Cleared the name of data set {}", handle.key()));
    } else {
        output::success(&format!(
            "Renamed data set {} to '{}'",
            handle.key(),
            name.trim()
        ));
    }
    Ok(())
}

pub fn describe(args: DescribeArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let handle = resolve_reference(&db, &ctx.root, &args.reference)?;
    db.set_description(&ctx.root, handle.key(), &args.description)?;
    output::success(&format!("Updated description of data set {}", handle.key()));
    Ok(())
}

pub fn unlock(args: UnlockArgs, ctx: &Context) -> Result<()> {
    let db = ctx.open_initialized()?;
    let handle = resolve_reference(&db, &ctx.root, &args.reference)?;
    if db.force_unlock(&ctx.root, handle.key())? {
        output::success(&format!("Unlocked data set {}", handle.key()));
    } else {
        output::info(&format!("Data set {} was not locked", handle.key()));
    }
    Ok(())
}
