//! Trigger → step conversion.
//!
//! The pipeline stamps each trigger with the time it arrived and hands the
//! image to the session worker, which writes the asset before the step
//! becomes visible. The call returns once the step is registered; the
//! manifest flush runs in the worker right after.
//!
//! Steps are ordered by when their trigger reached the worker's queue, and
//! the timestamp is taken on the caller's side before queueing. Triggers
//! from one producer keep both orders in agreement. Triggers from separate
//! producers racing each other can land in an order that disagrees with
//! their timestamps by the time it took to enqueue them; position, not
//! timestamp, is the order of record.

use chrono::Utc;
use std::sync::Arc;

use super::CaptureSource;
use crate::error::{Result, SessionError};
use crate::session::SessionHandle;
use crate::storage::{CaptureRegion, StepId};

/// Entry point for capture triggers. Cheap to clone; every clone feeds the
/// same serialized mutation queue.
#[derive(Clone)]
pub struct CapturePipeline {
    handle: SessionHandle,
}

impl CapturePipeline {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }

    /// Registers `image` as a new step at the end of the session.
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailure` for an empty image, `Io` if the asset cannot
    /// be written (no step is created in that case), or `WorkerStopped` if
    /// the session has been closed.
    pub async fn on_trigger(&self, image: Vec<u8>, region: CaptureRegion) -> Result<StepId> {
        let received_at = Utc::now();
        if image.is_empty() {
            return Err(SessionError::CaptureFailure(
                "capture source returned no image".to_string(),
            ));
        }
        self.handle.capture(image, region, received_at).await
    }

    /// Asks `source` for an image and registers it.
    ///
    /// The step timestamp is the moment this was called, not when the
    /// source finished producing the image.
    pub async fn trigger_from(
        &self,
        source: Arc<dyn CaptureSource>,
        region: CaptureRegion,
    ) -> Result<StepId> {
        let received_at = Utc::now();
        let name = source.name().to_string();
        let image = tokio::task::spawn_blocking(move || source.grab(&region))
            .await
            .map_err(|e| SessionError::CaptureFailure(format!("{name} source panicked: {e}")))??;

        if image.is_empty() {
            return Err(SessionError::CaptureFailure(format!(
                "{name} source returned no image"
            )));
        }
        tracing::debug!("Got {} bytes from {} source", image.len(), name);
        self.handle.capture(image, region, received_at).await
    }
}
