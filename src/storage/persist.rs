//! Session directory persistence.
//!
//! A session lives in a directory with this layout:
//!
//! ```text
//! <root>/manifest.json        ordered step list and session metadata
//! <root>/assets/<id>.<ext>    one screenshot per step
//! ```
//!
//! Every file is written to a temporary sibling first, flushed to disk and
//! then renamed over the target, so an interrupted write never damages the
//! last good copy. Temporary files left behind by a crash are swept on the
//! next load.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;

use super::models::{Manifest, StepId, MANIFEST_VERSION};
use crate::error::{Result, SessionError};

/// Name of the manifest file in the session root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Name of the screenshot directory in the session root.
pub const ASSETS_DIR: &str = "assets";

const MANIFEST_TEMP_PREFIX: &str = ".manifest-";
const ASSET_TEMP_PREFIX: &str = ".asset-";
const TEMP_SUFFIX: &str = ".tmp";

/// Picks a file extension for an image from its magic bytes.
///
/// Unknown formats are stored as `png`, which is what screenshot tools
/// produce by default.
pub fn image_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.starts_with(b"GIF8") {
        "gif"
    } else if bytes.starts_with(b"BM") {
        "bmp"
    } else {
        "png"
    }
}

/// Result of loading a session directory.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    /// The manifest, with steps in position order and `missing_asset` set
    /// for every step whose screenshot is gone.
    pub manifest: Manifest,
    /// Steps whose asset file does not exist.
    pub missing_assets: Vec<StepId>,
    /// Files in `assets/` that no manifest entry references.
    pub orphaned_assets: Vec<PathBuf>,
    /// Highest step id encoded in an orphaned asset file name.
    pub highest_orphan_id: Option<StepId>,
    /// Number of leftover temporary files removed.
    pub swept_temp_files: usize,
}

/// A manifest written to a temporary file but not yet swapped in.
///
/// Dropping it without calling [`commit`](StagedManifest::commit) discards
/// the temporary file and leaves the current manifest untouched.
pub struct StagedManifest {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedManifest {
    /// Atomically replaces the manifest with the staged contents.
    pub fn commit(self) -> Result<()> {
        let dir = self.target.parent().map(Path::to_path_buf);
        self.file
            .persist(&self.target)
            .map_err(|e| SessionError::io("Failed to replace manifest", e.error))?;
        if let Some(dir) = dir {
            sync_dir(&dir);
        }
        Ok(())
    }
}

/// Handle on a session directory.
#[derive(Debug, Clone)]
pub struct SessionDir {
    root: PathBuf,
}

impl SessionDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// Resolves a manifest-relative asset path.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// Whether the directory already holds a session.
    pub fn has_manifest(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Creates the root and asset directories.
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(self.assets_dir()).map_err(|e| {
            SessionError::io(
                format!("Failed to create session directory {}", self.root.display()),
                e,
            )
        })
    }

    /// Writes a screenshot for `id` and returns its path relative to the root.
    ///
    /// The file is complete on disk when this returns.
    pub fn write_asset(&self, id: StepId, bytes: &[u8]) -> Result<PathBuf> {
        let relative = PathBuf::from(ASSETS_DIR).join(format!("{id}.{}", image_extension(bytes)));
        let target = self.resolve(&relative);
        let assets_dir = self.assets_dir();

        fs::create_dir_all(&assets_dir)
            .map_err(|e| SessionError::io("Failed to create assets directory", e))?;

        let mut file = tempfile::Builder::new()
            .prefix(ASSET_TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&assets_dir)
            .map_err(|e| SessionError::io("Failed to create temporary asset file", e))?;
        file.write_all(bytes)
            .map_err(|e| SessionError::io(format!("Failed to write asset for step {id}"), e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| SessionError::io(format!("Failed to flush asset for step {id}"), e))?;
        file.persist(&target)
            .map_err(|e| SessionError::io(format!("Failed to store asset for step {id}"), e.error))?;
        sync_dir(&assets_dir);

        tracing::debug!("Wrote asset {:?} ({} bytes)", relative, bytes.len());
        Ok(relative)
    }

    /// Deletes an asset file. A file that is already gone is not an error.
    ///
    /// Paths that would leave the session root are refused and left alone.
    pub fn remove_asset(&self, relative: &Path) -> Result<()> {
        if !is_session_relative(relative) {
            tracing::warn!(
                "Refusing to remove {:?}: not inside the session directory",
                relative
            );
            return Ok(());
        }
        match fs::remove_file(self.resolve(relative)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::io(
                format!("Failed to remove asset {}", relative.display()),
                e,
            )),
        }
    }

    /// Writes the manifest to a flushed temporary file next to the real one.
    pub fn stage(&self, manifest: &Manifest) -> Result<StagedManifest> {
        let json = serde_json::to_vec_pretty(manifest)
            .map_err(|e| SessionError::io("Failed to serialize manifest", e.into()))?;

        let mut file = tempfile::Builder::new()
            .prefix(MANIFEST_TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.root)
            .map_err(|e| SessionError::io("Failed to create temporary manifest", e))?;
        file.write_all(&json)
            .map_err(|e| SessionError::io("Failed to write manifest", e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| SessionError::io("Failed to flush manifest", e))?;

        Ok(StagedManifest {
            file,
            target: self.manifest_path(),
        })
    }

    /// Saves the manifest with a write-then-rename swap.
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        self.stage(manifest)?.commit()?;
        tracing::debug!(
            "Saved manifest with {} steps to {:?}",
            manifest.steps.len(),
            self.manifest_path()
        );
        Ok(())
    }

    /// Loads and validates the session stored in this directory.
    ///
    /// Missing screenshots do not fail the load; the affected steps are
    /// flagged instead so the rest of the evidence stays usable.
    pub fn load(&self) -> Result<LoadedSession> {
        let path = self.manifest_path();
        if !path.is_file() {
            return Err(SessionError::SessionNotFound(self.root.clone()));
        }

        let swept_temp_files = self.sweep_temp_files();

        let contents = fs::read_to_string(&path)
            .map_err(|e| SessionError::io(format!("Failed to read {}", path.display()), e))?;
        let mut manifest: Manifest =
            serde_json::from_str(&contents).map_err(|e| SessionError::CorruptManifest {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        validate(&mut manifest).map_err(|reason| SessionError::CorruptManifest {
            path: path.clone(),
            reason,
        })?;

        let mut missing_assets = Vec::new();
        for step in &mut manifest.steps {
            step.missing_asset = !self.resolve(&step.asset_path).is_file();
            if step.missing_asset {
                tracing::warn!(
                    "Asset for step {} is missing: {}",
                    step.id,
                    step.asset_path.display()
                );
                missing_assets.push(step.id);
            }
        }

        let (orphaned_assets, highest_orphan_id) = self.find_orphans(&manifest);
        for orphan in &orphaned_assets {
            tracing::warn!("Asset {:?} is not referenced by the manifest", orphan);
        }

        Ok(LoadedSession {
            manifest,
            missing_assets,
            orphaned_assets,
            highest_orphan_id,
            swept_temp_files,
        })
    }

    /// Removes temporary files left by interrupted writes.
    fn sweep_temp_files(&self) -> usize {
        let patterns = [
            self.root
                .join(format!("{MANIFEST_TEMP_PREFIX}*{TEMP_SUFFIX}")),
            self.assets_dir()
                .join(format!("{ASSET_TEMP_PREFIX}*{TEMP_SUFFIX}")),
        ];

        let mut swept = 0;
        for pattern in &patterns {
            for path in glob_files(pattern) {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::info!("Removed leftover temporary file {:?}", path);
                        swept += 1;
                    }
                    Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
                }
            }
        }
        swept
    }

    /// Lists asset files no step references, plus the highest id they encode.
    fn find_orphans(&self, manifest: &Manifest) -> (Vec<PathBuf>, Option<StepId>) {
        let referenced: HashSet<PathBuf> = manifest
            .steps
            .iter()
            .map(|s| self.resolve(&s.asset_path))
            .collect();

        let mut orphans = Vec::new();
        let mut highest: Option<StepId> = None;
        for path in glob_files(&self.assets_dir().join("*")) {
            if referenced.contains(&path) {
                continue;
            }
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<StepId>().ok());
            match id {
                Some(StepId(u64::MAX)) => {
                    tracing::warn!("Ignoring id of {:?}: no id can follow it", path);
                }
                Some(id) => highest = Some(highest.map_or(id, |h| h.max(id))),
                None => {}
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                orphans.push(relative.to_path_buf());
            }
        }
        orphans.sort();
        (orphans, highest)
    }
}

/// Whether `path` is a plain relative path that stays under the session root.
fn is_session_relative(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

/// Checks version, id range and uniqueness, asset paths, and that positions
/// cover `0..len`, then puts the steps in position order.
fn validate(manifest: &mut Manifest) -> std::result::Result<(), String> {
    if manifest.version > MANIFEST_VERSION {
        return Err(format!(
            "unsupported manifest version {} (expected {})",
            manifest.version, MANIFEST_VERSION
        ));
    }
    if manifest.next_step_id == u64::MAX {
        return Err(format!("next_step_id {} is out of range", manifest.next_step_id));
    }

    let len = manifest.steps.len();
    let mut seen_ids = HashSet::with_capacity(len);
    let mut seen_positions = vec![false; len];
    for step in &manifest.steps {
        if step.id.0 == u64::MAX {
            return Err(format!("step id {} is out of range", step.id));
        }
        if !seen_ids.insert(step.id) {
            return Err(format!("duplicate step id {}", step.id));
        }
        if !is_session_relative(&step.asset_path) {
            return Err(format!(
                "asset path {:?} of step {} is not inside the session directory",
                step.asset_path, step.id
            ));
        }
        match seen_positions.get_mut(step.position) {
            Some(seen) if !*seen => *seen = true,
            Some(_) => return Err(format!("duplicate position {}", step.position)),
            None => {
                return Err(format!(
                    "position {} out of range for {} steps",
                    step.position, len
                ))
            }
        }
    }

    manifest.steps.sort_by_key(|s| s.position);
    Ok(())
}

/// Files matching a glob rooted at an arbitrary (possibly special-character) path.
fn glob_files(pattern: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(file_pattern)) = (pattern.parent(), pattern.file_name()) else {
        return Vec::new();
    };
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        file_pattern.to_string_lossy()
    );

    match glob::glob(&full) {
        Ok(paths) => paths
            .filter_map(|p| p.ok())
            .filter(|p| p.is_file())
            .collect(),
        Err(e) => {
            tracing::warn!("Invalid glob pattern {}: {}", full, e);
            Vec::new()
        }
    }
}

/// Flushes directory metadata so a completed rename survives power loss.
fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        if let Ok(handle) = fs::File::open(dir) {
            let _ = handle.sync_all();
        }
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
    }
}
