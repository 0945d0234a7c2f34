//! Capture command - add a screenshot to the session as a new step.
//!
//! The screenshot itself is taken by whatever tool the tester uses; this
//! command registers the resulting image file.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::{self, SessionArgs};
use evidence_cli::capture::FileSource;
use evidence_cli::config::Config;
use evidence_cli::storage::CaptureRegion;

/// Arguments for the capture command.
#[derive(clap::Args)]
#[command(after_help = "EXAMPLES:\n    \
    evidence capture --image shot.png                      Full-screen capture\n    \
    evidence capture --image shot.png --region 0,0,800,600 Region capture\n    \
    evidence capture --image shot.png --title \"Log in\"     Capture and name the step")]
pub struct Args {
    /// Image file to register
    #[arg(short, long, value_name = "FILE")]
    pub image: PathBuf,

    /// Captured region as X,Y,WIDTH,HEIGHT (default: full screen)
    #[arg(short, long, value_name = "X,Y,W,H", value_parser = parse_region)]
    pub region: Option<CaptureRegion>,

    /// Title for the new step
    #[arg(short, long)]
    pub title: Option<String>,

    /// Notes for the new step
    #[arg(short, long)]
    pub notes: Option<String>,

    #[command(flatten)]
    pub target: SessionArgs,
}

/// Parses `X,Y,WIDTH,HEIGHT`.
pub fn parse_region(s: &str) -> Result<CaptureRegion, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("expected X,Y,WIDTH,HEIGHT, got '{s}'"));
    }
    let x = parts[0].parse().map_err(|_| format!("invalid x '{}'", parts[0]))?;
    let y = parts[1].parse().map_err(|_| format!("invalid y '{}'", parts[1]))?;
    let width: u32 = parts[2]
        .parse()
        .map_err(|_| format!("invalid width '{}'", parts[2]))?;
    let height: u32 = parts[3]
        .parse()
        .map_err(|_| format!("invalid height '{}'", parts[3]))?;
    if width == 0 || height == 0 {
        return Err("region width and height must be non-zero".to_string());
    }
    Ok(CaptureRegion::Rect {
        x,
        y,
        width,
        height,
    })
}

/// Executes the capture command.
pub fn run(args: Args) -> Result<()> {
    if !args.image.is_file() {
        bail!("Image file not found: {}", args.image.display());
    }

    let config = Config::load()?;
    let root = args.target.resolve(&config)?;
    let region = args.region.unwrap_or(CaptureRegion::FullScreen);

    let (id, position) = cli::block_on(async {
        let mut controller = cli::open_session(&config, &root).await?;
        controller.set_capture_source(Arc::new(FileSource::new(&args.image)));

        let result = async {
            let id = controller.capture(region).await?;
            if let Some(title) = &args.title {
                controller.rename(id, title.as_str()).await?;
            }
            if let Some(notes) = &args.notes {
                controller.set_notes(id, notes.as_str()).await?;
            }
            let position = controller
                .list_steps()
                .await?
                .get(id)
                .map(|s| s.position)
                .unwrap_or_default();
            Ok::<_, anyhow::Error>((id, position))
        }
        .await;

        cli::finish(controller, result).await
    })??;

    println!(
        "{} step {} (#{}) from {}",
        "Captured".green(),
        (position + 1).to_string().bold(),
        id.to_string().cyan(),
        args.image.display()
    );
    Ok(())
}
