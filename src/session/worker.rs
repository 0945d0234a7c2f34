//! The single-writer mutation queue.
//!
//! One [`SessionWorker`] task owns the step store and the session directory.
//! Capture triggers, edit commands and the autosave timer all funnel through
//! its channel, so structural mutations run strictly one at a time in
//! arrival order and never interleave.
//!
//! Callers get their reply as soon as the in-memory mutation is done. The
//! manifest write for a structural change happens right after the reply and
//! before the next command is taken off the queue; note edits and renames
//! are debounced. Commands that hand data to an external reader (durable
//! snapshots for export, close) flush everything pending first.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::storage::{CaptureRegion, SessionDir, SessionMeta, Snapshot, StepId, StepStore};

const QUEUE_CAPACITY: usize = 64;

/// Commands accepted by the session worker.
pub(crate) enum Command {
    Capture {
        image: Vec<u8>,
        region: CaptureRegion,
        received_at: DateTime<Utc>,
        reply: oneshot::Sender<Result<StepId>>,
    },
    Rename {
        id: StepId,
        title: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetNotes {
        id: StepId,
        notes: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetResults {
        id: StepId,
        expected: Option<String>,
        actual: Option<String>,
        reply: oneshot::Sender<Result<()>>,
    },
    Reorder {
        id: StepId,
        position: usize,
        reply: oneshot::Sender<Result<()>>,
    },
    Delete {
        id: StepId,
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    DurableSnapshot {
        reply: oneshot::Sender<Result<Snapshot>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Close {
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Point-in-time view of the session's persistence state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub root: PathBuf,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub host: Option<String>,
    pub step_count: usize,
    /// In-memory changes not yet in the manifest
    pub dirty: bool,
    /// Last autosave failure, cleared by the next successful save
    pub last_save_error: Option<String>,
    pub saves_completed: u64,
    pub missing_assets: usize,
    /// Assets of deleted steps still waiting for a manifest save
    pub pending_asset_removals: usize,
}

/// Cloneable sender side of the mutation queue.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SessionError::WorkerStopped)?;
        rx.await.map_err(|_| SessionError::WorkerStopped)
    }

    /// Registers a captured image as a new step at the end of the session.
    pub(crate) async fn capture(
        &self,
        image: Vec<u8>,
        region: CaptureRegion,
        received_at: DateTime<Utc>,
    ) -> Result<StepId> {
        self.request(|reply| Command::Capture {
            image,
            region,
            received_at,
            reply,
        })
        .await?
    }

    pub async fn rename(&self, id: StepId, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        self.request(|reply| Command::Rename { id, title, reply })
            .await?
    }

    pub async fn set_notes(&self, id: StepId, notes: impl Into<String>) -> Result<()> {
        let notes = notes.into();
        self.request(|reply| Command::SetNotes { id, notes, reply })
            .await?
    }

    /// Sets the expected and/or actual outcome of a step. Debounced like notes.
    pub async fn set_results(
        &self,
        id: StepId,
        expected: Option<String>,
        actual: Option<String>,
    ) -> Result<()> {
        self.request(|reply| Command::SetResults {
            id,
            expected,
            actual,
            reply,
        })
        .await?
    }

    pub async fn reorder(&self, id: StepId, position: usize) -> Result<()> {
        self.request(|reply| Command::Reorder {
            id,
            position,
            reply,
        })
        .await?
    }

    pub async fn delete(&self, id: StepId) -> Result<()> {
        self.request(|reply| Command::Delete { id, reply }).await?
    }

    /// Current in-memory ordering. Does not wait for pending writes.
    pub async fn list_steps(&self) -> Result<Snapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Flushes pending writes, then returns the ordering that is on disk.
    pub async fn durable_snapshot(&self) -> Result<Snapshot> {
        self.request(|reply| Command::DurableSnapshot { reply })
            .await?
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Performs the final save and stops the worker.
    ///
    /// If the save fails the worker keeps running so nothing is lost and the
    /// close can be retried.
    pub(crate) async fn close(&self) -> Result<()> {
        self.request(|reply| Command::Close { reply }).await?
    }
}

/// Owns the step store and performs every mutation and write for a session.
pub(crate) struct SessionWorker {
    dir: SessionDir,
    meta: SessionMeta,
    store: StepStore,
    debounce: Duration,
    dirty: bool,
    save_deadline: Option<Instant>,
    pending_asset_removals: Vec<PathBuf>,
    last_save_error: Option<String>,
    saves_completed: u64,
}

impl SessionWorker {
    pub(crate) fn new(dir: SessionDir, meta: SessionMeta, store: StepStore, debounce: Duration) -> Self {
        Self {
            dir,
            meta,
            store,
            debounce,
            dirty: false,
            save_deadline: None,
            pending_asset_removals: Vec::new(),
            last_save_error: None,
            saves_completed: 0,
        }
    }

    /// Starts the worker on the current runtime.
    pub(crate) fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(self.run(rx));
        (SessionHandle { tx }, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        tracing::debug!("Session worker started for {:?}", self.dir.root());

        loop {
            let deadline = self.save_deadline;
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        // Every handle dropped without a close
                        if let Err(e) = self.flush().await {
                            tracing::error!("Final save failed: {}", e);
                        }
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.save_deadline = None;
                    self.autosave().await;
                }
            }
        }

        tracing::debug!("Session worker stopped for {:?}", self.dir.root());
    }

    /// Applies one command. Returns `false` once the worker should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Capture {
                image,
                region,
                received_at,
                reply,
            } => {
                let result = self.capture(image, region, received_at).await;
                let captured = result.is_ok();
                let _ = reply.send(result);
                if captured {
                    self.autosave_now().await;
                }
            }
            Command::Rename { id, title, reply } => {
                let result = self.store.rename(id, title);
                if result.is_ok() {
                    self.schedule_save();
                }
                let _ = reply.send(result);
            }
            Command::SetNotes { id, notes, reply } => {
                let result = self.store.set_notes(id, notes);
                if result.is_ok() {
                    self.schedule_save();
                }
                let _ = reply.send(result);
            }
            Command::SetResults {
                id,
                expected,
                actual,
                reply,
            } => {
                let result = self.store.set_results(id, expected, actual);
                if result.is_ok() {
                    self.schedule_save();
                }
                let _ = reply.send(result);
            }
            Command::Reorder {
                id,
                position,
                reply,
            } => match self.store.move_to(id, position) {
                Ok(moved) => {
                    let _ = reply.send(Ok(()));
                    if moved {
                        tracing::debug!("Moved step {} to position {}", id, position);
                        self.autosave_now().await;
                    }
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Delete { id, reply } => match self.store.delete(id) {
                Ok(step) => {
                    let _ = reply.send(Ok(()));
                    tracing::info!("Deleted step {} ({})", id, step.title);
                    // The asset goes only once a manifest without the step is on disk
                    self.pending_asset_removals.push(step.asset_path);
                    self.autosave_now().await;
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Snapshot { reply } => {
                let _ = reply.send(self.store.snapshot());
            }
            Command::DurableSnapshot { reply } => {
                let result = self.flush().await.map(|_| self.store.snapshot());
                let _ = reply.send(result);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            Command::Close { reply } => {
                let result = self.flush().await;
                let closed = result.is_ok();
                let _ = reply.send(result);
                // A failed final save keeps the worker running
                return !closed;
            }
        }
        true
    }

    /// Writes the asset, then makes the step visible.
    async fn capture(
        &mut self,
        image: Vec<u8>,
        region: CaptureRegion,
        received_at: DateTime<Utc>,
    ) -> Result<StepId> {
        if image.is_empty() {
            return Err(SessionError::CaptureFailure(
                "capture source returned an empty image".to_string(),
            ));
        }

        let id = self.store.allocate_id()?;
        let dir = self.dir.clone();
        let asset_path = tokio::task::spawn_blocking(move || dir.write_asset(id, &image))
            .await
            .map_err(|e| SessionError::io("Asset write task failed", std::io::Error::other(e)))??;

        let step = self.store.insert_end(id, received_at, asset_path, region)?;
        tracing::info!(
            "Captured step {} at position {} ({})",
            step.id,
            step.position,
            step.region
        );
        self.dirty = true;
        Ok(id)
    }

    fn schedule_save(&mut self) {
        self.dirty = true;
        self.save_deadline = Some(Instant::now() + self.debounce);
    }

    /// Saves immediately, used after structural mutations.
    async fn autosave_now(&mut self) {
        self.dirty = true;
        self.save_deadline = None;
        self.autosave().await;
    }

    /// Saves and downgrades a failure to a warning. The session stays dirty
    /// so the next mutation retries.
    async fn autosave(&mut self) {
        if let Err(e) = self.save().await {
            tracing::warn!(
                "Autosave failed, changes are kept in memory until the next save: {}",
                e
            );
            self.last_save_error = Some(e.to_string());
        }
    }

    /// Saves if anything is pending and returns the error to the caller.
    async fn flush(&mut self) -> Result<()> {
        self.save_deadline = None;
        if !self.dirty && self.pending_asset_removals.is_empty() {
            return Ok(());
        }
        self.save().await.inspect_err(|e| {
            self.last_save_error = Some(e.to_string());
        })
    }

    /// Writes the manifest, retrying once on failure.
    async fn save(&mut self) -> Result<()> {
        let manifest = self.store.to_manifest(&self.meta);

        if let Err(first) = self.write_manifest(manifest.clone()).await {
            tracing::warn!("Manifest save failed, retrying: {}", first);
            self.write_manifest(manifest).await?;
        }

        self.dirty = false;
        self.last_save_error = None;
        self.saves_completed += 1;
        self.remove_pending_assets();
        Ok(())
    }

    async fn write_manifest(&self, manifest: crate::storage::Manifest) -> Result<()> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || dir.save(&manifest))
            .await
            .map_err(|e| SessionError::io("Manifest write task failed", std::io::Error::other(e)))?
    }

    fn remove_pending_assets(&mut self) {
        let pending = std::mem::take(&mut self.pending_asset_removals);
        for relative in pending {
            if let Err(e) = self.dir.remove_asset(&relative) {
                tracing::warn!("{}", e);
                self.pending_asset_removals.push(relative);
            }
        }
    }

    fn status(&self) -> SessionStatus {
        let snapshot = self.store.snapshot();
        SessionStatus {
            root: self.dir.root().to_path_buf(),
            session_id: self.meta.id,
            created_at: self.meta.created_at,
            host: self.meta.host.clone(),
            step_count: snapshot.len(),
            dirty: self.dirty,
            last_save_error: self.last_save_error.clone(),
            saves_completed: self.saves_completed,
            missing_assets: snapshot.steps().iter().filter(|s| s.missing_asset).count(),
            pending_asset_removals: self.pending_asset_removals.len(),
        }
    }
}
