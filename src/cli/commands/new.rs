//! New command - start an empty session directory.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::session::{SessionController, SessionOptions};

/// Arguments for the new command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence new runs/checkout       Create a session in runs/checkout\n    \
    evidence new                     Create a session in the current directory")]
pub struct Args {
    /// Directory for the new session (created if missing)
    #[arg(value_name = "DIR")]
    pub path: Option<PathBuf>,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the new command.
pub fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let root = match args.path {
        Some(path) => path,
        None => args.target.resolve(&config)?,
    };

    let status = cli::block_on(async {
        let mut controller = SessionController::new(SessionOptions::from(&config));
        let status = controller.new_session(&root).await?;
        cli::finish(controller, Ok(status)).await
    })??;

    println!(
        "{} session {} in {}",
        "Created".green(),
        status.session_id.to_string().cyan(),
        status.root.display()
    );
    Ok(())
}
