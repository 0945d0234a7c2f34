//! Screenshot capture.
//!
//! The OS-level pieces (global hotkeys, pixel grabbing) live outside this
//! crate. They reach the engine either through a [`CaptureSource`], which
//! turns a trigger into image bytes, or by calling
//! [`CapturePipeline::on_trigger`] directly with bytes they already have.
//!
//! # Sources
//!
//! - [`FileSource`] - reads a screenshot an external tool just wrote
//! - [`folder::DropFolderWatcher`] - turns every new image dropped into a
//!   directory into a capture trigger

pub mod folder;
pub mod pipeline;

use std::path::{Path, PathBuf};

use crate::error::{Result, SessionError};
use crate::storage::CaptureRegion;

pub use folder::DropFolderWatcher;
pub use pipeline::CapturePipeline;

/// Turns a capture trigger into raw image bytes.
///
/// Implementations are stateless with respect to sessions and may block;
/// the pipeline calls them on the blocking thread pool.
pub trait CaptureSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produces the image for `region`.
    ///
    /// # Errors
    ///
    /// Returns `CaptureFailure` when no image could be produced.
    fn grab(&self, region: &CaptureRegion) -> Result<Vec<u8>>;
}

/// Capture source backed by an image file produced by another tool.
///
/// The region has already been applied by whatever wrote the file, so it is
/// only recorded, never used for cropping.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn grab(&self, _region: &CaptureRegion) -> Result<Vec<u8>> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            SessionError::CaptureFailure(format!("cannot read {}: {e}", self.path.display()))
        })?;
        if bytes.is_empty() {
            return Err(SessionError::CaptureFailure(format!(
                "{} is empty",
                self.path.display()
            )));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_source_reads_bytes() {
        let dir = tempdir().expect("Failed to create temp directory");
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"\x89PNGdata").unwrap();

        let source = FileSource::new(&path);
        let bytes = source.grab(&CaptureRegion::FullScreen).unwrap();
        assert_eq!(bytes, b"\x89PNGdata");
        assert_eq!(source.name(), "file");
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = tempdir().expect("Failed to create temp directory");
        let source = FileSource::new(dir.path().join("nope.png"));

        assert!(matches!(
            source.grab(&CaptureRegion::FullScreen),
            Err(SessionError::CaptureFailure(_))
        ));
    }

    #[test]
    fn test_file_source_empty_file() {
        let dir = tempdir().expect("Failed to create temp directory");
        let path = dir.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();

        match FileSource::new(&path).grab(&CaptureRegion::FullScreen) {
            Err(SessionError::CaptureFailure(reason)) => assert!(reason.contains("empty")),
            other => panic!("Expected CaptureFailure, got {other:?}"),
        }
    }
}
