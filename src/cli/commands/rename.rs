//! Rename command - change a step's title.

use anyhow::Result;
use colored::Colorize;

use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::storage::StepId;

/// Arguments for the rename command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence rename 3 \"Submit payment form\"")]
pub struct Args {
    /// Step ID (see 'evidence steps')
    #[arg(value_name = "ID")]
    pub id: StepId,

    /// New title
    #[arg(value_name = "TITLE")]
    pub title: String,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the rename command.
pub fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;
        let result = controller
            .rename(args.id, args.title.as_str())
            .await
            .map_err(anyhow::Error::from);
        cli::finish(controller, result).await
    })??;

    println!("{} step {}", "Renamed".green(), args.id.to_string().cyan());
    Ok(())
}
