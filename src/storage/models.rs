//! Core data models for evidence sessions
//!
//! These are the in-memory and on-disk representations of a test evidence
//! run, independent of any capture mechanism or export format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Stable identifier of a step within a session.
///
/// Assigned from a per-session counter that only moves forward, so an id
/// is never reused after its step is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u64);

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for StepId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(StepId)
    }
}

/// The part of the screen a capture covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureRegion {
    /// The whole screen.
    FullScreen,
    /// A rectangle in screen coordinates.
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureRegion::FullScreen => write!(f, "full screen"),
            CaptureRegion::Rect {
                x,
                y,
                width,
                height,
            } => write!(f, "{width}x{height} at ({x}, {y})"),
        }
    }
}

/// One unit of evidence: a screenshot with its note and place in the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Stable identifier, independent of position
    pub id: StepId,

    /// 0-based position in the session ordering
    pub position: usize,

    /// User-editable title, defaults to "Step N"
    pub title: String,

    /// Free-form notes, may be empty
    #[serde(default)]
    pub notes: String,

    /// What the tester expected to happen, may be empty
    #[serde(default)]
    pub expected: String,

    /// What actually happened, may be empty
    #[serde(default)]
    pub actual: String,

    /// When the capture trigger was received
    pub timestamp: DateTime<Utc>,

    /// Screenshot path relative to the session root
    pub asset_path: PathBuf,

    /// Screen region the screenshot covers
    pub region: CaptureRegion,

    /// Set when the asset file could not be found. Never persisted.
    #[serde(skip)]
    pub missing_asset: bool,
}

impl Step {
    /// The title a freshly captured step gets at the given position.
    pub fn default_title(position: usize) -> String {
        format!("Step {}", position + 1)
    }
}

/// Session-level metadata stored at the top of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Unique identifier for this session
    pub id: Uuid,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Machine the session was created on, if it could be determined
    pub host: Option<String>,
}

impl SessionMeta {
    /// Creates metadata for a brand new session on this machine.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            host: hostname::get().ok().and_then(|h| h.into_string().ok()),
        }
    }
}

impl Default for SessionMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// The persisted form of a session: metadata plus the ordered step list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version, see [`MANIFEST_VERSION`]
    pub version: u32,

    pub session: SessionMeta,

    /// Next id the step counter will hand out
    pub next_step_id: u64,

    /// Steps in position order
    pub steps: Vec<Step>,
}

impl Manifest {
    /// An empty manifest for a new session.
    pub fn new(session: SessionMeta) -> Self {
        Self {
            version: MANIFEST_VERSION,
            session,
            next_step_id: 1,
            steps: Vec::new(),
        }
    }
}
