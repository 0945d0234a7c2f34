//! Status command - show session health and persistence state.

use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::format::OutputFormat;
use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::session::{OpenReport, SessionController, SessionOptions, SessionStatus};
use evidence_cli::SessionError;

/// Arguments for the status command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence status                  Status of the current session\n    \
    evidence status --format json    Output as JSON for scripting")]
pub struct Args {
    /// Output format: text (default) or json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub target: SessionArgs,
}

#[derive(Serialize)]
struct StatusOutput {
    #[serde(flatten)]
    status: SessionStatus,
    missing_asset_ids: Vec<u64>,
    orphaned_assets: Vec<PathBuf>,
    swept_temp_files: usize,
}

/// Executes the status command.
pub fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    let outcome = cli::block_on(async {
        let mut controller = SessionController::new(SessionOptions::from(&config));
        let report = controller.open_session(&root).await?;
        let status = controller.status().await;
        let closed = controller.close_session().await;
        let status = status?;
        closed?;
        Ok::<_, SessionError>((status, report))
    })?;

    let (status, report) = match outcome {
        Ok(pair) => pair,
        Err(SessionError::SessionLocked { pid, .. }) => {
            println!(
                "{} Session at {} is in use by process {}",
                "Locked:".yellow(),
                root.display(),
                pid
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match args.format {
        OutputFormat::Json => print_json(status, report),
        OutputFormat::Text => {
            print_text(&status, &report);
            Ok(())
        }
    }
}

fn print_json(status: SessionStatus, report: OpenReport) -> Result<()> {
    let output = StatusOutput {
        status,
        missing_asset_ids: report.missing_assets.iter().map(|id| id.0).collect(),
        orphaned_assets: report.orphaned_assets,
        swept_temp_files: report.swept_temp_files,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(status: &SessionStatus, report: &OpenReport) {
    println!("{}", "Evidence Session".bold());
    println!();
    println!("  {}  {}", "Directory:".dimmed(), status.root.display());
    println!("  {}  {}", "Session:".dimmed(), status.session_id);
    println!(
        "  {}  {}",
        "Created:".dimmed(),
        status
            .created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(host) = &status.host {
        println!("  {}  {}", "Host:".dimmed(), host);
    }
    println!("  {}  {}", "Steps:".dimmed(), status.step_count);

    if report.missing_assets.is_empty() && report.orphaned_assets.is_empty() {
        println!();
        println!("{} All screenshots present", "✓".green());
    } else {
        println!();
        for id in &report.missing_assets {
            println!("{} Step {} is missing its screenshot", "✗".red(), id);
        }
        for path in &report.orphaned_assets {
            println!(
                "{} {} is not referenced by any step",
                "○".yellow(),
                path.display()
            );
        }
    }

    if report.swept_temp_files > 0 {
        println!(
            "{}",
            format!(
                "Cleaned up {} temporary file(s) from an interrupted save",
                report.swept_temp_files
            )
            .dimmed()
        );
    }
}
