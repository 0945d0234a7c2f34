//! Delete command - permanently remove a step and its screenshot.

use std::io::{self, Write};

use anyhow::{bail, Result};
use colored::Colorize;

use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::storage::StepId;

/// Arguments for the delete command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence delete 4            Delete step #4 (prompts for confirmation)\n    \
    evidence delete 4 --force    Delete without confirmation")]
pub struct Args {
    /// Step ID to delete
    #[arg(value_name = "ID")]
    pub id: StepId,

    /// Skip the confirmation prompt
    #[arg(long)]
    #[arg(long_help = "Skip the confirmation prompt and proceed with deletion.\n\
        The screenshot file is removed too, so this cannot be undone.")]
    pub force: bool,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the delete command.
pub fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    let deleted = cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;

        let result = async {
            let steps = controller.list_steps().await?;
            let Some(step) = steps.get(args.id) else {
                bail!(
                    "No step with ID {}. Run 'evidence steps' to list steps.",
                    args.id
                );
            };

            if !args.force {
                println!();
                println!(
                    "{} {} {}",
                    "Step".bold(),
                    (step.position + 1).to_string().bold(),
                    format!("(#{})", step.id).cyan()
                );
                println!("  {}  {}", "Title:".dimmed(), step.title);
                println!("  {}  {}", "Screenshot:".dimmed(), step.asset_path.display());
                println!();
                print!("Delete this step? [y/N] ");
                io::stdout().flush()?;

                let mut input = String::new();
                io::stdin().read_line(&mut input)?;
                if !input.trim().eq_ignore_ascii_case("y") {
                    return Ok(false);
                }
            }

            controller.delete(args.id).await?;
            Ok::<_, anyhow::Error>(true)
        }
        .await;

        cli::finish(controller, result).await
    })??;

    if deleted {
        println!("{} step {}", "Deleted".green(), args.id.to_string().cyan());
    } else {
        println!("{}", "Cancelled".dimmed());
    }
    Ok(())
}
