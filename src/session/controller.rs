//! Session lifecycle and the command surface used by front ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::worker::{SessionHandle, SessionStatus, SessionWorker};
use crate::capture::{CapturePipeline, CaptureSource};
use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::export::{renderer_for, ExportFormat, ExportOptions, ExportSnapshot};
use crate::storage::{
    CaptureRegion, Manifest, SessionDir, SessionLock, SessionMeta, Snapshot, StepId, StepStore,
};

/// Tunables for an open session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Delay between the last note edit or rename and the autosave.
    pub autosave_debounce: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            autosave_debounce: Duration::from_millis(750),
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            autosave_debounce: config.autosave_debounce(),
        }
    }
}

/// What `open_session` found while loading.
#[derive(Debug, Clone, Default)]
pub struct OpenReport {
    pub step_count: usize,
    /// Steps whose screenshot file is gone
    pub missing_assets: Vec<StepId>,
    /// Screenshot files no step refers to
    pub orphaned_assets: Vec<PathBuf>,
    /// Temporary files from interrupted writes that were cleaned up
    pub swept_temp_files: usize,
}

struct OpenSession {
    dir: SessionDir,
    handle: SessionHandle,
    pipeline: CapturePipeline,
    worker: JoinHandle<()>,
    // Released last, after the worker has stopped
    _lock: SessionLock,
}

/// Owns at most one open session and mediates every access to it.
///
/// Must be used from within a tokio runtime.
pub struct SessionController {
    options: SessionOptions,
    source: Option<Arc<dyn CaptureSource>>,
    open: Option<OpenSession>,
}

impl SessionController {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            source: None,
            open: None,
        }
    }

    /// Sets the source used by [`capture`](Self::capture).
    pub fn with_capture_source(mut self, source: Arc<dyn CaptureSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn set_capture_source(&mut self, source: Arc<dyn CaptureSource>) {
        self.source = Some(source);
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Root directory of the open session.
    pub fn root(&self) -> Option<&Path> {
        self.open.as_ref().map(|s| s.dir.root())
    }

    fn session(&self) -> Result<&OpenSession> {
        self.open.as_ref().ok_or(SessionError::NoSession)
    }

    fn ensure_closed(&self) -> Result<()> {
        match &self.open {
            Some(session) => Err(SessionError::SessionAlreadyOpen(
                session.dir.root().to_path_buf(),
            )),
            None => Ok(()),
        }
    }

    /// Starts a new session in `path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `SessionExists` if the directory already holds a session and
    /// `SessionLocked` if another controller is using it.
    pub async fn new_session(&mut self, path: impl AsRef<Path>) -> Result<SessionStatus> {
        self.ensure_closed()?;
        let dir = SessionDir::new(path.as_ref());
        dir.create()?;

        let lock = SessionLock::acquire(dir.root())?;
        if dir.has_manifest() {
            return Err(SessionError::SessionExists(dir.root().to_path_buf()));
        }

        let meta = SessionMeta::new();
        let manifest = Manifest::new(meta.clone());
        let save_dir = dir.clone();
        tokio::task::spawn_blocking(move || save_dir.save(&manifest))
            .await
            .map_err(|e| SessionError::io("Manifest write task failed", std::io::Error::other(e)))??;

        tracing::info!("Created session {} at {:?}", meta.id, dir.root());
        self.start(dir, lock, meta, StepStore::new());
        self.status().await
    }

    /// Opens the session stored in `path`.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound`, `SessionLocked` or `CorruptManifest`.
    /// Missing screenshots are reported in the returned [`OpenReport`]
    /// instead of failing.
    pub async fn open_session(&mut self, path: impl AsRef<Path>) -> Result<OpenReport> {
        self.ensure_closed()?;
        let dir = SessionDir::new(path.as_ref());
        if !dir.has_manifest() {
            return Err(SessionError::SessionNotFound(dir.root().to_path_buf()));
        }

        let lock = SessionLock::acquire(dir.root())?;
        let load_dir = dir.clone();
        let loaded = tokio::task::spawn_blocking(move || load_dir.load())
            .await
            .map_err(|e| SessionError::io("Manifest read task failed", std::io::Error::other(e)))??;

        let mut store = StepStore::from_manifest(&loaded.manifest);
        if let Some(id) = loaded.highest_orphan_id {
            if !store.reserve_through(id) {
                tracing::warn!("Orphaned asset id {} cannot be reserved", id);
            }
        }

        let report = OpenReport {
            step_count: store.len(),
            missing_assets: loaded.missing_assets,
            orphaned_assets: loaded.orphaned_assets,
            swept_temp_files: loaded.swept_temp_files,
        };
        tracing::info!(
            "Opened session {} at {:?} with {} steps",
            loaded.manifest.session.id,
            dir.root(),
            report.step_count
        );

        self.start(dir, lock, loaded.manifest.session, store);
        Ok(report)
    }

    fn start(&mut self, dir: SessionDir, lock: SessionLock, meta: SessionMeta, store: StepStore) {
        let worker = SessionWorker::new(dir.clone(), meta, store, self.options.autosave_debounce);
        let (handle, join) = worker.spawn();
        self.open = Some(OpenSession {
            dir,
            pipeline: CapturePipeline::new(handle.clone()),
            handle,
            worker: join,
            _lock: lock,
        });
    }

    /// Saves everything and releases the session directory.
    ///
    /// If the final save fails the session stays open so no step is lost.
    pub async fn close_session(&mut self) -> Result<()> {
        let session = self.open.take().ok_or(SessionError::NoSession)?;
        if let Err(e) = session.handle.close().await {
            tracing::error!("Failed to save session on close: {}", e);
            self.open = Some(session);
            return Err(e);
        }

        let root = session.dir.root().to_path_buf();
        if let Err(e) = session.worker.await {
            tracing::warn!("Session worker ended abnormally: {}", e);
        }
        tracing::info!("Closed session at {:?}", root);
        Ok(())
    }

    /// A pipeline other trigger producers can feed concurrently.
    pub fn pipeline(&self) -> Result<CapturePipeline> {
        Ok(self.session()?.pipeline.clone())
    }

    /// A handle for issuing edits from another task.
    pub fn handle(&self) -> Result<SessionHandle> {
        Ok(self.session()?.handle.clone())
    }

    /// Captures `region` from the configured source.
    pub async fn capture(&self, region: CaptureRegion) -> Result<StepId> {
        let session = self.session()?;
        let source = self
            .source
            .clone()
            .ok_or_else(|| SessionError::CaptureFailure("no capture source configured".to_string()))?;
        session.pipeline.trigger_from(source, region).await
    }

    /// Registers image bytes produced elsewhere.
    pub async fn capture_bytes(&self, image: Vec<u8>, region: CaptureRegion) -> Result<StepId> {
        self.session()?.pipeline.on_trigger(image, region).await
    }

    pub async fn rename(&self, id: StepId, title: impl Into<String>) -> Result<()> {
        self.session()?.handle.rename(id, title).await
    }

    pub async fn set_notes(&self, id: StepId, notes: impl Into<String>) -> Result<()> {
        self.session()?.handle.set_notes(id, notes).await
    }

    /// Records the expected and actual outcome of a step. `None` keeps the
    /// current value.
    pub async fn set_results(
        &self,
        id: StepId,
        expected: Option<String>,
        actual: Option<String>,
    ) -> Result<()> {
        self.session()?.handle.set_results(id, expected, actual).await
    }

    pub async fn reorder(&self, id: StepId, position: usize) -> Result<()> {
        self.session()?.handle.reorder(id, position).await
    }

    pub async fn delete(&self, id: StepId) -> Result<()> {
        self.session()?.handle.delete(id).await
    }

    pub async fn list_steps(&self) -> Result<Snapshot> {
        self.session()?.handle.list_steps().await
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.session()?.handle.status().await
    }

    /// Renders the session after all pending writes have reached disk.
    pub async fn export(&self, format: ExportFormat, options: &ExportOptions) -> Result<Vec<u8>> {
        let session = self.session()?;
        let snapshot = session.handle.durable_snapshot().await?;
        let dir = session.dir.clone();
        let options = options.clone();

        tokio::task::spawn_blocking(move || {
            let export = ExportSnapshot::new(&snapshot, &options, |step| {
                match std::fs::read(dir.resolve(&step.asset_path)) {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        tracing::warn!(
                            "Asset for step {} unavailable, using placeholder: {}",
                            step.id,
                            e
                        );
                        None
                    }
                }
            });
            renderer_for(format).render(&export)
        })
        .await
        .map_err(|e| SessionError::io("Export task failed", std::io::Error::other(e)))
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::{fixed_time, PNG};
    use crate::storage::persist::MANIFEST_FILE;
    use tempfile::tempdir;

    fn controller() -> SessionController {
        SessionController::new(SessionOptions {
            autosave_debounce: Duration::from_millis(20),
        })
    }

    fn read_manifest(root: &Path) -> Manifest {
        let contents = std::fs::read_to_string(root.join(MANIFEST_FILE)).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    #[tokio::test]
    async fn test_new_session_writes_empty_manifest() {
        let dir = tempdir().expect("Failed to create temp directory");
        let root = dir.path().join("run");
        let mut controller = controller();

        let status = controller.new_session(&root).await.unwrap();
        assert_eq!(status.step_count, 0);
        assert!(root.join("assets").is_dir());
        assert!(read_manifest(&root).steps.is_empty());

        controller.close_session().await.unwrap();
        assert!(!controller.is_open());
    }

    #[tokio::test]
    async fn test_new_session_refuses_existing_session() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();
        controller.close_session().await.unwrap();

        let err = controller.new_session(dir.path()).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionExists(_)));
        assert!(!controller.is_open());
        // The failed attempt released its lock
        assert_eq!(SessionLock::holder(dir.path()), None);
    }

    #[tokio::test]
    async fn test_open_missing_session() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();

        let err = controller.open_session(dir.path()).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_second_controller_is_locked_out() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut first = controller();
        first.new_session(dir.path()).await.unwrap();

        let mut second = controller();
        let err = second.open_session(dir.path()).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionLocked { .. }));

        first.close_session().await.unwrap();
        second.open_session(dir.path()).await.unwrap();
        second.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_one_session_per_controller() {
        let a = tempdir().expect("Failed to create temp directory");
        let b = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(a.path()).await.unwrap();

        let err = controller.new_session(b.path()).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionAlreadyOpen(_)));
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_need_open_session() {
        let controller = controller();
        assert!(matches!(
            controller.list_steps().await,
            Err(SessionError::NoSession)
        ));
        assert!(matches!(
            controller.rename(StepId(1), "x").await,
            Err(SessionError::NoSession)
        ));
    }

    #[tokio::test]
    async fn test_capture_persists_asset_then_manifest() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();

        let id = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        // Served after the capture's manifest flush
        let status = controller.status().await.unwrap();
        assert!(!status.dirty);

        let manifest = read_manifest(dir.path());
        assert_eq!(manifest.steps.len(), 1);
        assert_eq!(manifest.steps[0].id, id);
        assert_eq!(manifest.steps[0].title, "Step 1");
        assert!(dir.path().join(&manifest.steps[0].asset_path).is_file());

        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_capture_from_source() {
        let dir = tempdir().expect("Failed to create temp directory");
        let shot = dir.path().join("shot.png");
        std::fs::write(&shot, PNG).unwrap();
        let session_root = dir.path().join("session");

        let mut controller =
            controller().with_capture_source(Arc::new(crate::capture::FileSource::new(&shot)));
        controller.new_session(&session_root).await.unwrap();

        let region = CaptureRegion::Rect {
            x: 0,
            y: 0,
            width: 800,
            height: 600,
        };
        let id = controller.capture(region).await.unwrap();

        let steps = controller.list_steps().await.unwrap();
        assert_eq!(steps.get(id).unwrap().region, region);
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_capture_without_source_fails() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();

        let err = controller.capture(CaptureRegion::FullScreen).await.unwrap_err();
        assert!(matches!(err, SessionError::CaptureFailure(_)));
        assert!(controller.list_steps().await.unwrap().is_empty());
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_capture_registers_nothing() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();

        let err = controller
            .capture_bytes(Vec::new(), CaptureRegion::FullScreen)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::CaptureFailure(_)));
        assert!(controller.list_steps().await.unwrap().is_empty());
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_notes_are_debounced_then_saved() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = SessionController::new(SessionOptions {
            autosave_debounce: Duration::from_secs(3600),
        });
        controller.new_session(dir.path()).await.unwrap();
        let id = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();

        controller.set_notes(id, "Login succeeded").await.unwrap();
        let status = controller.status().await.unwrap();
        assert!(status.dirty);
        assert_eq!(read_manifest(dir.path()).steps[0].notes, "");

        // Close forces the pending save
        controller.close_session().await.unwrap();
        assert_eq!(read_manifest(dir.path()).steps[0].notes, "Login succeeded");
    }

    #[tokio::test]
    async fn test_debounce_timer_saves() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();
        let id = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();

        controller.rename(id, "Open login page").await.unwrap();
        let mut saved = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if read_manifest(dir.path()).steps[0].title == "Open login page" {
                saved = true;
                break;
            }
        }
        assert!(saved, "Rename should be saved after the debounce interval");
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_asset_after_manifest() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();
        let a = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        let b = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        let asset = dir.path().join(
            controller
                .list_steps()
                .await
                .unwrap()
                .get(a)
                .unwrap()
                .asset_path
                .clone(),
        );

        controller.delete(a).await.unwrap();
        let status = controller.status().await.unwrap();
        assert_eq!(status.pending_asset_removals, 0);
        assert!(!asset.exists());

        let manifest = read_manifest(dir.path());
        assert_eq!(manifest.steps.len(), 1);
        assert_eq!(manifest.steps[0].id, b);
        assert_eq!(manifest.steps[0].position, 0);

        assert!(matches!(
            controller.delete(a).await,
            Err(SessionError::NotFound(_))
        ));
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_reorder_errors_leave_state_unchanged() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();
        let a = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        let before = controller.list_steps().await.unwrap();

        assert!(matches!(
            controller.reorder(a, 1).await,
            Err(SessionError::InvalidPosition { position: 1, len: 1 })
        ));
        assert!(matches!(
            controller.reorder(StepId(77), 0).await,
            Err(SessionError::NotFound(StepId(77)))
        ));
        assert_eq!(controller.list_steps().await.unwrap(), before);
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_save_is_non_fatal_and_recovers() {
        let dir = tempdir().expect("Failed to create temp directory");
        let root = dir.path().join("run");
        let mut controller = controller();
        controller.new_session(&root).await.unwrap();
        let a = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        let b = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();

        // Pull the directory out from under the session
        std::fs::remove_dir_all(&root).unwrap();

        controller.reorder(b, 0).await.unwrap();
        let status = controller.status().await.unwrap();
        assert!(status.dirty);
        assert!(status.last_save_error.is_some());

        // In-memory state survived the failed save
        let steps = controller.list_steps().await.unwrap();
        assert_eq!(steps.steps()[0].id, b);
        assert_eq!(steps.steps()[1].id, a);

        std::fs::create_dir_all(&root).unwrap();
        controller.close_session().await.unwrap();

        let manifest = read_manifest(&root);
        assert_eq!(manifest.steps[0].id, b);
        assert_eq!(manifest.steps[1].id, a);
    }

    #[tokio::test]
    async fn test_close_fails_while_disk_unavailable() {
        let dir = tempdir().expect("Failed to create temp directory");
        let root = dir.path().join("run");
        let mut controller = SessionController::new(SessionOptions {
            autosave_debounce: Duration::from_secs(3600),
        });
        controller.new_session(&root).await.unwrap();
        let id = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        controller.set_notes(id, "pending").await.unwrap();

        std::fs::remove_dir_all(&root).unwrap();
        assert!(controller.close_session().await.is_err());
        assert!(controller.is_open(), "Session stays open when the final save fails");

        std::fs::create_dir_all(&root).unwrap();
        controller.close_session().await.unwrap();
        assert_eq!(read_manifest(&root).steps[0].notes, "pending");
    }

    #[tokio::test]
    async fn test_export_flushes_pending_notes() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = SessionController::new(SessionOptions {
            autosave_debounce: Duration::from_secs(3600),
        });
        controller.new_session(dir.path()).await.unwrap();
        let id = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        controller.set_notes(id, "Login succeeded").await.unwrap();

        let options = ExportOptions::new("Run", fixed_time());
        let bytes = controller.export(ExportFormat::Csv, &options).await.unwrap();
        let csv = String::from_utf8(bytes).unwrap();
        assert!(csv.contains("Login succeeded"));

        // Exported data is on disk
        assert_eq!(read_manifest(dir.path()).steps[0].notes, "Login succeeded");
        assert!(!controller.status().await.unwrap().dirty);
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_export_uses_placeholder_for_vanished_asset() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();
        let id = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        let asset = controller.list_steps().await.unwrap().get(id).unwrap().asset_path.clone();
        std::fs::remove_file(dir.path().join(&asset)).unwrap();

        let options = ExportOptions::new("Run", fixed_time());
        let html = controller.export(ExportFormat::Html, &options).await.unwrap();
        let html = String::from_utf8(html).unwrap();
        assert!(html.contains("[Screenshot missing: assets/1.png]"));
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_reports_missing_and_orphaned_assets() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();
        let a = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        controller.close_session().await.unwrap();

        std::fs::remove_file(dir.path().join("assets/1.png")).unwrap();
        // Left by a crash between asset write and manifest save
        std::fs::write(dir.path().join("assets/5.png"), PNG).unwrap();

        let report = controller.open_session(dir.path()).await.unwrap();
        assert_eq!(report.step_count, 2);
        assert_eq!(report.missing_assets, vec![a]);
        assert_eq!(report.orphaned_assets, vec![PathBuf::from("assets/5.png")]);
        assert_eq!(controller.status().await.unwrap().missing_assets, 1);

        // New ids skip past the orphan so it is never overwritten
        let next = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        assert_eq!(next, StepId(6));
        controller.close_session().await.unwrap();
    }

    #[tokio::test]
    async fn test_results_are_debounced_then_saved() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = SessionController::new(SessionOptions {
            autosave_debounce: Duration::from_secs(3600),
        });
        controller.new_session(dir.path()).await.unwrap();
        let id = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();

        controller
            .set_results(id, Some("Dashboard shown".into()), Some("Error 500".into()))
            .await
            .unwrap();
        assert!(controller.status().await.unwrap().dirty);
        assert_eq!(read_manifest(dir.path()).steps[0].expected, "");

        controller.set_results(id, None, Some("Dashboard shown".into())).await.unwrap();
        assert!(matches!(
            controller.set_results(StepId(9), None, None).await,
            Err(SessionError::NotFound(StepId(9)))
        ));

        controller.close_session().await.unwrap();
        let step = &read_manifest(dir.path()).steps[0];
        assert_eq!(step.expected, "Dashboard shown");
        assert_eq!(step.actual, "Dashboard shown");
    }

    #[tokio::test]
    async fn test_open_refuses_asset_path_outside_session() {
        let dir = tempdir().expect("Failed to create temp directory");
        let root = dir.path().join("run");
        let victim = dir.path().join("victim.txt");
        std::fs::write(&victim, "keep me").unwrap();

        let mut controller = controller();
        controller.new_session(&root).await.unwrap();
        controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        controller.close_session().await.unwrap();

        let mut manifest = read_manifest(&root);
        manifest.steps[0].asset_path = PathBuf::from("../victim.txt");
        std::fs::write(
            root.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&manifest).unwrap(),
        )
        .unwrap();

        let err = controller.open_session(&root).await.unwrap_err();
        assert!(matches!(err, SessionError::CorruptManifest { .. }));
        assert!(!controller.is_open());
        assert!(victim.is_file());
    }

    #[tokio::test]
    async fn test_orphan_named_with_max_id_does_not_reuse_ids() {
        let dir = tempdir().expect("Failed to create temp directory");
        let mut controller = controller();
        controller.new_session(dir.path()).await.unwrap();
        let first = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        controller.close_session().await.unwrap();

        std::fs::write(dir.path().join("assets/18446744073709551615.png"), b"GIF89a").unwrap();

        let report = controller.open_session(dir.path()).await.unwrap();
        assert_eq!(report.orphaned_assets.len(), 1);

        let second = controller
            .capture_bytes(PNG.to_vec(), CaptureRegion::FullScreen)
            .await
            .unwrap();
        assert_eq!(second, StepId(2));
        assert_ne!(second, first);
        controller.close_session().await.unwrap();

        let manifest = read_manifest(dir.path());
        let ids: Vec<StepId> = manifest.steps.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(std::fs::read(dir.path().join("assets/1.png")).unwrap(), PNG);
    }
}
