//! Error taxonomy for the session engine.

use std::path::PathBuf;

use crate::storage::StepId;

/// Errors returned by the step store, persistence layer and session controller.
///
/// `InvalidPosition` and `NotFound` are usage errors and are never retried.
/// `Io` failures during autosave are retried once and then reported as
/// warnings; everywhere else they propagate to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A reorder target outside `[0, len)`.
    #[error("Invalid position {position}: session has {len} steps")]
    InvalidPosition {
        /// Requested position.
        position: usize,
        /// Number of steps at the time of the request.
        len: usize,
    },

    /// No step with this id exists in the session.
    #[error("Step {0} not found")]
    NotFound(StepId),

    /// A step with this id is already in the session.
    #[error("Step {0} already exists")]
    DuplicateStep(StepId),

    /// The step id counter cannot advance any further.
    #[error("No step ids left in this session")]
    IdsExhausted,

    /// Another controller owns the session directory.
    #[error("Session at {} is locked by process {pid}", .path.display())]
    SessionLocked {
        /// Session root.
        path: PathBuf,
        /// PID recorded in the lock file.
        pid: u32,
    },

    /// The directory does not contain a manifest.
    #[error("No session found at {}", .0.display())]
    SessionNotFound(PathBuf),

    /// The directory already contains a session.
    #[error("A session already exists at {}. Open it instead.", .0.display())]
    SessionExists(PathBuf),

    /// The manifest exists but cannot be turned back into a session.
    #[error("Corrupt manifest at {}: {reason}", .path.display())]
    CorruptManifest {
        /// Manifest path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A disk read or write failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The capture source produced no image.
    #[error("Capture failed: {0}")]
    CaptureFailure(String),

    /// An operation needs an open session.
    #[error("No session is open")]
    NoSession,

    /// The controller already has a session open.
    #[error("A session is already open at {}", .0.display())]
    SessionAlreadyOpen(PathBuf),

    /// The session worker has shut down.
    #[error("Session worker has stopped")]
    WorkerStopped,
}

impl SessionError {
    /// Wraps an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SessionError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result alias used throughout the engine.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_position_display() {
        let err = SessionError::InvalidPosition {
            position: 5,
            len: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains("2 steps"));
    }

    #[test]
    fn test_locked_display_includes_pid() {
        let err = SessionError::SessionLocked {
            path: PathBuf::from("/tmp/run"),
            pid: 4242,
        };
        assert!(err.to_string().contains("4242"));
        assert!(err.to_string().contains("/tmp/run"));
    }

    #[test]
    fn test_io_keeps_source() {
        use std::error::Error;

        let err = SessionError::io(
            "Failed to write manifest",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert!(err.to_string().contains("Failed to write manifest"));
        assert!(err.to_string().contains("disk full"));
        assert!(err.source().is_some());
    }
}
