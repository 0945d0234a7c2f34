//! Drop-folder capture source.
//!
//! Watches a directory for new image files and submits each one to the
//! capture pipeline as a full-screen capture. This is how an external
//! screenshot hotkey (which saves into a folder) drives the engine while
//! edit commands keep flowing through the same session queue.

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use super::CapturePipeline;
use crate::error::SessionError;
use crate::storage::CaptureRegion;

/// Counters reported when the watcher stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    /// Files turned into steps.
    pub captured: u64,
    /// Files that could not be captured.
    pub errors: u64,
}

/// Watches a directory and turns new image files into steps.
pub struct DropFolderWatcher {
    dir: PathBuf,
    extensions: Vec<String>,
    debounce: Duration,
    /// Files already captured or present when watching started.
    seen: HashSet<PathBuf>,
}

impl DropFolderWatcher {
    /// Creates a watcher for `dir` accepting the given file extensions
    /// (case-insensitive, without the dot).
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
            debounce: Duration::from_millis(500),
            seen: HashSet::new(),
        }
    }

    /// Overrides how long a file must be quiet before it is picked up.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Records the files already in the folder so they are not captured.
    fn mark_existing(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read drop folder {:?}", self.dir))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && self.accepts(&path) {
                self.seen.insert(path);
            }
        }
        Ok(())
    }

    /// Runs until `shutdown_rx` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read or watched.
    pub async fn watch(
        mut self,
        pipeline: CapturePipeline,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<WatchStats> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create drop folder {:?}", self.dir))?;
        self.mark_existing()?;

        let (tx, mut rx) = mpsc::channel::<Vec<PathBuf>>(100);
        let extensions = self.extensions.clone();

        let mut debouncer = new_debouncer(
            self.debounce,
            move |events: Result<Vec<DebouncedEvent>, notify::Error>| {
                if let Ok(events) = events {
                    let mut paths: Vec<PathBuf> = events
                        .into_iter()
                        .map(|e| e.path)
                        .filter(|p| {
                            p.extension()
                                .and_then(|ext| ext.to_str())
                                .map(|ext| extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
                                .unwrap_or(false)
                        })
                        .collect();
                    paths.sort();
                    paths.dedup();

                    if !paths.is_empty() {
                        let _ = tx.blocking_send(paths);
                    }
                }
            },
        )
        .context("Failed to create file watcher")?;

        debouncer
            .watcher()
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to start watching directory {:?}", self.dir))?;

        tracing::info!(
            "Watching {:?} for new screenshots ({})",
            self.dir,
            self.extensions.join(", ")
        );

        let mut stats = WatchStats::default();
        loop {
            tokio::select! {
                Some(paths) = rx.recv() => {
                    for path in paths {
                        self.handle_file(&path, &pipeline, &mut stats).await;
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Drop folder watcher shutting down");
                    break;
                }
            }
        }

        Ok(stats)
    }

    async fn handle_file(&mut self, path: &Path, pipeline: &CapturePipeline, stats: &mut WatchStats) {
        // Deletes and renames away show up as events too
        if !path.is_file() || self.seen.contains(path) {
            return;
        }

        let image = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read {:?}: {}", path, e);
                stats.errors += 1;
                return;
            }
        };

        match pipeline.on_trigger(image, CaptureRegion::FullScreen).await {
            Ok(id) => {
                tracing::info!("Captured {:?} as step {}", path, id);
                self.seen.insert(path.to_path_buf());
                stats.captured += 1;
            }
            Err(SessionError::CaptureFailure(reason)) => {
                // Probably still being written; a later event will retry it
                tracing::debug!("Skipping {:?}: {}", path, reason);
            }
            Err(e) => {
                tracing::warn!("Failed to capture {:?}: {}", path, e);
                stats.errors += 1;
            }
        }
    }
}
