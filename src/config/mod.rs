//! Configuration management
//!
//! Settings live in `~/.evidence/config.yaml`. A missing file means all
//! defaults. A few values can be overridden from the environment:
//!
//! - `EVIDENCE_DEBOUNCE_MS` overrides `autosave_debounce_ms`
//! - `EVIDENCE_EXPORT_FORMAT` overrides `export_format`
//! - `EVIDENCE_SESSION` overrides `default_session`

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::export::{ExportFormat, DEFAULT_DOCUMENT_TITLE};

/// Keys accepted by [`Config::get`] and [`Config::set`].
pub const CONFIG_KEYS: &[&str] = &[
    "autosave_debounce_ms",
    "export_format",
    "document_title",
    "watch_extensions",
    "default_session",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Quiet period after a note edit or rename before the manifest is saved
    pub autosave_debounce_ms: u64,

    /// Format used by `evidence export` when none is given
    pub export_format: ExportFormat,

    /// Heading at the top of exported documents
    pub document_title: String,

    /// File extensions the drop-folder watcher picks up
    pub watch_extensions: Vec<String>,

    /// Session directory used when `--session` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_session: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 750,
            export_format: ExportFormat::Html,
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            watch_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
            default_session: None,
        }
    }
}

impl Config {
    /// Loads `~/.evidence/config.yaml` and applies environment overrides.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Loads a config file without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_saphyr::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Writes the config as YAML, creating the parent directory.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_saphyr::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Applies `EVIDENCE_*` overrides using `lookup` to read variables.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(ms) = lookup("EVIDENCE_DEBOUNCE_MS") {
            self.autosave_debounce_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("EVIDENCE_DEBOUNCE_MS is not a number: {ms}"))?;
        }
        if let Some(format) = lookup("EVIDENCE_EXPORT_FORMAT") {
            self.export_format = format.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        }
        if let Some(session) = lookup("EVIDENCE_SESSION") {
            if !session.trim().is_empty() {
                self.default_session = Some(PathBuf::from(session));
            }
        }
        Ok(self)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Reads a value by key as display text.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "autosave_debounce_ms" => Some(self.autosave_debounce_ms.to_string()),
            "export_format" => Some(self.export_format.to_string()),
            "document_title" => Some(self.document_title.clone()),
            "watch_extensions" => Some(self.watch_extensions.join(",")),
            "default_session" => self
                .default_session
                .as_ref()
                .map(|p| p.display().to_string()),
            _ => None,
        }
    }

    /// Sets a value by key from text. `watch_extensions` takes a
    /// comma-separated list; an empty `default_session` clears it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "autosave_debounce_ms" => {
                self.autosave_debounce_ms = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Not a number: {value}"))?;
            }
            "export_format" => {
                self.export_format = value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            }
            "document_title" => self.document_title = value.to_string(),
            "watch_extensions" => {
                let extensions: Vec<String> = value
                    .split(',')
                    .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect();
                if extensions.is_empty() {
                    bail!("watch_extensions needs at least one extension");
                }
                self.watch_extensions = extensions;
            }
            "default_session" => {
                self.default_session = if value.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            _ => bail!(
                "Unknown config key '{}'. Valid keys: {}",
                key,
                CONFIG_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// `~/.evidence`, created if needed.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
            .join(".evidence");
        std::fs::create_dir_all(&dir).context("Failed to create ~/.evidence directory")?;
        Ok(dir)
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Log file written by `evidence watch`.
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("evidence.log"))
    }
}
