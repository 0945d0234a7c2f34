//! Reorder command - move a step to another position.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::storage::StepId;

/// Arguments for the reorder command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence reorder 5 1     Make step #5 the first step\n    \
    evidence reorder 2 4     Move step #2 to the fourth position")]
pub struct Args {
    /// Step ID (see 'evidence steps')
    #[arg(value_name = "ID")]
    pub id: StepId,

    /// New 1-based position
    #[arg(value_name = "POSITION")]
    #[arg(long_help = "The new 1-based position of the step, as shown in the '#'\n\
        column of 'evidence steps'. Steps in between shift by one.")]
    pub position: usize,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the reorder command.
pub fn run(args: Args) -> Result<()> {
    if args.position == 0 {
        bail!("Positions start at 1");
    }

    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;
        let result = controller
            .reorder(args.id, args.position - 1)
            .await
            .map_err(anyhow::Error::from);
        cli::finish(controller, result).await
    })??;

    println!(
        "{} step {} to position {}",
        "Moved".green(),
        args.id.to_string().cyan(),
        args.position
    );
    Ok(())
}
