//! Watch command - capture every screenshot dropped into a folder.
//!
//! Keeps the session open and turns each new image file in the drop
//! folder into a step until interrupted. Point your screenshot tool's save
//! location at the drop folder to record a test run hands-free.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;

use crate::cli::{self, SessionArgs};
use evidence_cli::capture::DropFolderWatcher;
use evidence_cli::config::Config;

/// Arguments for the watch command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence watch ~/Screenshots                 Capture new screenshots\n    \
    evidence watch ~/Screenshots -s runs/login   Capture into another session\n\n\
Press Ctrl+C to stop. Files already in the folder are ignored.")]
pub struct Args {
    /// Folder to watch for new image files
    #[arg(value_name = "FOLDER")]
    pub folder: PathBuf,

    /// Milliseconds a file must be unchanged before it is captured
    #[arg(long, value_name = "MS", default_value = "500")]
    pub settle_ms: u64,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the watch command.
pub fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    println!(
        "{} {} into {}",
        "Watching".green(),
        args.folder.display(),
        root.display()
    );
    println!("{}", "Press Ctrl+C to stop".dimmed());

    let stats = cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;

        let result: Result<_> = async {
            let pipeline = controller.pipeline()?;
            let watcher = DropFolderWatcher::new(&args.folder, &config.watch_extensions)
                .with_debounce(Duration::from_millis(args.settle_ms));

            let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
            let task = tokio::spawn(watcher.watch(pipeline, shutdown_rx));

            signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            tracing::info!("Received Ctrl+C, shutting down...");
            let _ = shutdown_tx.send(());

            task.await.context("Watcher task panicked")?
        }
        .await;

        cli::finish(controller, result).await
    })??;

    println!();
    println!(
        "{} {} screenshot(s), {} error(s)",
        "Captured".green(),
        stats.captured,
        stats.errors
    );
    Ok(())
}
