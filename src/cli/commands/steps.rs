//! Steps command - list the steps of a session in order.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::format::OutputFormat;
use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::storage::{CaptureRegion, Step};

/// Arguments for the steps command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence steps                   List steps of the current session\n    \
    evidence steps -s runs/checkout  List steps of another session\n    \
    evidence steps --format json     Output as JSON for scripting")]
pub struct Args {
    /// Output format: text (default) or json
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// One step as printed by `--format json`.
#[derive(Serialize)]
struct StepOutput {
    number: usize,
    id: u64,
    title: String,
    notes: String,
    expected: String,
    actual: String,
    timestamp: DateTime<Utc>,
    asset_path: PathBuf,
    region: CaptureRegion,
    missing_asset: bool,
}

impl From<&Step> for StepOutput {
    fn from(step: &Step) -> Self {
        Self {
            number: step.position + 1,
            id: step.id.0,
            title: step.title.clone(),
            notes: step.notes.clone(),
            expected: step.expected.clone(),
            actual: step.actual.clone(),
            timestamp: step.timestamp,
            asset_path: step.asset_path.clone(),
            region: step.region,
            missing_asset: step.missing_asset,
        }
    }
}

/// Executes the steps command.
pub fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let root = args.target.resolve(&config)?;

    let snapshot = cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;
        let result = controller.list_steps().await.map_err(anyhow::Error::from);
        cli::finish(controller, result).await
    })??;

    match args.format {
        OutputFormat::Json => {
            let steps: Vec<StepOutput> = snapshot.steps().iter().map(StepOutput::from).collect();
            println!("{}", serde_json::to_string_pretty(&steps)?);
        }
        OutputFormat::Text => {
            if snapshot.is_empty() {
                println!("{}", "No steps captured yet.".dimmed());
                println!(
                    "{}",
                    "Run 'evidence capture --image <FILE>' to add one.".dimmed()
                );
                return Ok(());
            }

            println!(
                "{:>4}  {:<6}  {:<19}  {}",
                "#".bold(),
                "ID".bold(),
                "CAPTURED".bold(),
                "TITLE".bold()
            );
            for step in snapshot.steps() {
                let captured = step
                    .timestamp
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S");
                let mut line = format!(
                    "{:>4}  {:<6}  {:<19}  {}",
                    step.position + 1,
                    step.id.to_string().cyan(),
                    captured,
                    step.title
                );
                if step.missing_asset {
                    line.push_str(&format!("  {}", "(screenshot missing)".red()));
                }
                println!("{line}");

                if let Some(first) = step.notes.lines().next() {
                    let more = if step.notes.lines().nth(1).is_some() {
                        " ..."
                    } else {
                        ""
                    };
                    println!("{:>4}  {}{}", "", first.dimmed(), more.dimmed());
                }
            }
        }
    }

    Ok(())
}
