//! Results command - record what a step was expected to show and what it did.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::storage::StepId;

/// Arguments for the results command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence results 2 -e \"Dashboard shown\" -a \"Error 500\"   Set both\n    \
    evidence results 2 --actual \"Dashboard shown\"            Set only the outcome\n    \
    evidence results 2 --clear                               Remove both")]
pub struct Args {
    /// Step ID (see 'evidence steps')
    #[arg(value_name = "ID")]
    pub id: StepId,

    /// Expected result
    #[arg(short, long, value_name = "TEXT")]
    pub expected: Option<String>,

    /// Actual result
    #[arg(short, long, value_name = "TEXT")]
    pub actual: Option<String>,

    /// Remove both results
    #[arg(long, conflicts_with_all = ["expected", "actual"])]
    pub clear: bool,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the results command.
pub fn run(args: Args) -> Result<()> {
    let (expected, actual) = if args.clear {
        (Some(String::new()), Some(String::new()))
    } else {
        (args.expected, args.actual)
    };
    if expected.is_none() && actual.is_none() {
        bail!("Provide --expected, --actual or --clear");
    }

    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;
        let result = controller
            .set_results(args.id, expected, actual)
            .await
            .map_err(anyhow::Error::from);
        cli::finish(controller, result).await
    })??;

    let verb = if args.clear { "Cleared" } else { "Updated" };
    println!(
        "{} results for step {}",
        verb.green(),
        args.id.to_string().cyan()
    );
    Ok(())
}
