use anyhow::{Context as _, Result};
use clap::Args;

use stationdb_core::{save_config, Config};

use crate::cli::context::Context;
use crate::cli::output;

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing configuration file with the defaults
    #[arg(long)]
    pub reset_config: bool,
}

pub fn run(args: InitArgs, ctx: &Context) -> Result<()> {
    if args.reset_config || !ctx.config_path.exists() {
        let config = if args.reset_config {
            Config::default()
        } else {
            ctx.config.clone()
        };
        if let Some(parent) = ctx.config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        save_config(&ctx.config_path, &config)?;
        output::info(&format!(
            "Wrote configuration to {}",
            ctx.config_path.display()
        ));
    }

    let db = ctx.open()?;
    db.initialize_root(&ctx.root)?;
    output::success(&format!(
        "Root database '{}' is ready in {}",
        ctx.root,
        ctx.config.data_dir().display()
    ));
    Ok(())
}
