//! Command-line interface for Evidence.
//!
//! Every command opens the session, performs its work through a
//! [`SessionController`] and closes the session again, so nothing is left
//! unsaved when the process exits.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

use evidence_cli::config::Config;
use evidence_cli::session::{SessionController, SessionOptions};

/// Individual CLI command implementations.
pub mod commands;

/// Output format options shared by listing commands.
pub mod format;

/// Session directory selection shared by all session commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Session directory
    #[arg(short, long, value_name = "DIR")]
    #[arg(long_help = "The session directory to use. When omitted, EVIDENCE_SESSION\n\
        is used, then default_session from the config file, then the\n\
        current directory.")]
    pub session: Option<PathBuf>,
}

impl SessionArgs {
    /// Resolves the session directory from the flag, the environment, the
    /// config file and finally the working directory.
    pub fn resolve(&self, config: &Config) -> Result<PathBuf> {
        if let Some(path) = &self.session {
            return Ok(path.clone());
        }
        if let Some(path) = &config.default_session {
            return Ok(path.clone());
        }
        std::env::current_dir().context("Failed to determine current directory")
    }
}

/// Runs a future to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    Ok(rt.block_on(future))
}

/// Opens the existing session at `root`.
pub async fn open_session(config: &Config, root: &Path) -> Result<SessionController> {
    let mut controller = SessionController::new(SessionOptions::from(config));
    let report = controller.open_session(root).await?;

    if !report.missing_assets.is_empty() {
        tracing::warn!(
            "{} step(s) have missing screenshots",
            report.missing_assets.len()
        );
    }
    if report.swept_temp_files > 0 {
        tracing::info!(
            "Removed {} leftover temporary file(s)",
            report.swept_temp_files
        );
    }
    Ok(controller)
}

/// Closes `controller` and returns `result`, preferring the command's own
/// error over a close failure.
pub async fn finish<T>(mut controller: SessionController, result: Result<T>) -> Result<T> {
    let closed = controller.close_session().await;
    let value = result?;
    closed.context("Failed to save session")?;
    Ok(value)
}
