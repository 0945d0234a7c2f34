//! Notes command - set the free-text notes of a step.

use anyhow::{bail, Result};
use colored::Colorize;
use std::io::Read;

use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::storage::StepId;

/// Arguments for the notes command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence notes 2 \"Login succeeded\"     Set notes\n    \
    evidence notes 2 --clear               Remove notes\n    \
    cat result.txt | evidence notes 2 -    Read notes from stdin")]
pub struct Args {
    /// Step ID (see 'evidence steps')
    #[arg(value_name = "ID")]
    pub id: StepId,

    /// Notes text, or '-' to read from stdin
    #[arg(value_name = "TEXT", required_unless_present = "clear")]
    pub text: Option<String>,

    /// Remove the step's notes
    #[arg(long, conflicts_with = "text")]
    pub clear: bool,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the notes command.
pub fn run(args: Args) -> Result<()> {
    let notes = match args.text.as_deref() {
        Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf.trim_end().to_string()
        }
        Some(text) => text.to_string(),
        None if args.clear => String::new(),
        None => bail!("Provide notes text or --clear"),
    };

    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;
        let result = controller
            .set_notes(args.id, notes)
            .await
            .map_err(anyhow::Error::from);
        cli::finish(controller, result).await
    })??;

    let verb = if args.clear { "Cleared" } else { "Updated" };
    println!(
        "{} notes for step {}",
        verb.green(),
        args.id.to_string().cyan()
    );
    Ok(())
}
