//! Export command - render the session into a document.
//!
//! Pending edits are saved before rendering, so the exported document
//! always matches what is on disk.

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::{self, SessionArgs};
use evidence_cli::config::Config;
use evidence_cli::export::{default_file_name, ExportFormat, ExportOptions};

/// Arguments for the export command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence export                          HTML into the session directory\n    \
    evidence export --format markdown        Markdown next to the manifest\n    \
    evidence export --format csv -o run.csv  CSV to a chosen file\n    \
    evidence export -o -                     Write to stdout")]
pub struct Args {
    /// Output format: html, markdown or csv (default from config)
    #[arg(short, long, value_enum)]
    pub format: Option<ExportFormat>,

    /// Output file, or '-' for stdout
    #[arg(short, long, value_name = "FILE")]
    #[arg(long_help = "Where to write the document. Defaults to\n\
        TestRun_<YYYYMMDD>_<HHMMSS>.<ext> inside the session directory,\n\
        which keeps Markdown image links valid.")]
    pub output: Option<PathBuf>,

    /// Document title (default from config)
    #[arg(short, long)]
    pub title: Option<String>,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Executes the export command.
pub fn run(args: Args) -> Result<()> {
    let config = Config::load()?;
    let root = args.target.resolve(&config)?;
    let format = args.format.unwrap_or(config.export_format);

    let now = Utc::now();
    let title = args
        .title
        .clone()
        .unwrap_or_else(|| config.document_title.clone());
    let options = ExportOptions::new(title, now);

    let bytes = cli::block_on(async {
        let controller = cli::open_session(&config, &root).await?;
        let result = controller
            .export(format, &options)
            .await
            .map_err(anyhow::Error::from);
        cli::finish(controller, result).await
    })??;

    match args.output {
        Some(path) if path.as_os_str() == "-" => {
            use std::io::Write;
            std::io::stdout().write_all(&bytes)?;
        }
        output => {
            let path = output.unwrap_or_else(|| root.join(default_file_name(format, now)));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Exported {} bytes of {} to {:?}", bytes.len(), format, path);
            println!(
                "{} {} document to {}",
                "Exported".green(),
                format,
                path.display()
            );
        }
    }

    Ok(())
}
