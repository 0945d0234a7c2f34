//! Rendering sessions into portable documents.
//!
//! Renderers are pure: they take an [`ExportSnapshot`] (an ordered copy of
//! the steps plus the image bytes that go with them) and return the bytes
//! of the output file. The same snapshot always produces the same bytes.
//!
//! # Formats
//!
//! - `html` - self-contained document with screenshots embedded inline
//! - `markdown` - document that links screenshots by relative path
//! - `csv` - one row per step, for spreadsheets

pub mod document;
pub mod table;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{Snapshot, Step};

pub use document::{render_document, DocumentSink, HtmlSink, MarkdownSink};
pub use table::CsvRenderer;

/// Title used when none is configured.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Manual Test Execution";

/// Output formats.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Self-contained HTML document (default).
    #[default]
    Html,
    /// Markdown document referencing the session's asset files.
    Markdown,
    /// Comma-separated table, one row per step.
    Csv,
}

impl ExportFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Html => write!(f, "html"),
            ExportFormat::Markdown => write!(f, "markdown"),
            ExportFormat::Csv => write!(f, "csv"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!(
                "unknown export format '{other}' (expected html, markdown or csv)"
            )),
        }
    }
}

/// Document-level settings for an export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub title: String,
    /// Printed in the document header. Passed in rather than read from the
    /// clock so renders are reproducible.
    pub generated_at: DateTime<Utc>,
}

impl ExportOptions {
    pub fn new(title: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            generated_at,
        }
    }
}

/// One step as the renderers see it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportStep {
    /// 1-based number derived from position
    pub number: usize,
    pub step: Step,
    /// Screenshot bytes, `None` when the asset is missing
    pub image: Option<Vec<u8>>,
}

impl ExportStep {
    /// Title to print, falling back for blank titles.
    pub fn display_title(&self) -> &str {
        if self.step.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.step.title
        }
    }
}

/// Everything a renderer needs, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSnapshot {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<ExportStep>,
}

impl ExportSnapshot {
    /// Pairs each step of `snapshot` with its image.
    ///
    /// `load_image` returns `None` for an asset that cannot be read; the
    /// step is then flagged as missing and rendered with a placeholder.
    pub fn new(
        snapshot: &Snapshot,
        options: &ExportOptions,
        mut load_image: impl FnMut(&Step) -> Option<Vec<u8>>,
    ) -> Self {
        let steps = snapshot
            .steps()
            .iter()
            .map(|step| {
                let image = if step.missing_asset {
                    None
                } else {
                    load_image(step)
                };
                let mut step = step.clone();
                step.missing_asset = image.is_none();
                ExportStep {
                    number: step.position + 1,
                    step,
                    image,
                }
            })
            .collect();

        Self {
            title: options.title.clone(),
            generated_at: options.generated_at,
            steps,
        }
    }
}

/// Turns an export snapshot into output bytes.
pub trait Renderer: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn render(&self, snapshot: &ExportSnapshot) -> Vec<u8>;
}

/// Renderer for HTML output.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Html
    }

    fn render(&self, snapshot: &ExportSnapshot) -> Vec<u8> {
        render_document(snapshot, HtmlSink::new())
    }
}

/// Renderer for Markdown output.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Markdown
    }

    fn render(&self, snapshot: &ExportSnapshot) -> Vec<u8> {
        render_document(snapshot, MarkdownSink::new())
    }
}

/// Returns the renderer for `format`.
pub fn renderer_for(format: ExportFormat) -> Box<dyn Renderer> {
    match format {
        ExportFormat::Html => Box::new(HtmlRenderer),
        ExportFormat::Markdown => Box::new(MarkdownRenderer),
        ExportFormat::Csv => Box::new(CsvRenderer),
    }
}

/// Default output file name, e.g. `TestRun_20260101_093000.html`.
pub fn default_file_name(format: ExportFormat, at: DateTime<Utc>) -> String {
    format!("TestRun_{}.{}", at.format("%Y%m%d_%H%M%S"), format.extension())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::{CaptureRegion, StepId, StepStore};
    use chrono::TimeZone;
    use std::path::PathBuf;

    pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 1, 2, 3];

    pub fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    /// Three steps; the second has notes and an expected result, the third
    /// a missing asset.
    pub fn sample_snapshot() -> ExportSnapshot {
        let mut store = StepStore::new();
        for _ in 0..3 {
            let id = store.allocate_id().unwrap();
            store
                .insert_end(
                    id,
                    fixed_time(),
                    PathBuf::from(format!("assets/{id}.png")),
                    CaptureRegion::FullScreen,
                )
                .unwrap();
        }
        store.rename(StepId(1), "Open login page").unwrap();
        store.set_notes(StepId(2), "Login succeeded").unwrap();
        store
            .set_results(StepId(2), Some("Dashboard shown".to_string()), None)
            .unwrap();
        store.set_missing_asset(StepId(3), true).unwrap();

        let options = ExportOptions::new("Checkout regression", fixed_time());
        ExportSnapshot::new(&store.snapshot(), &options, |_| Some(PNG.to_vec()))
    }
}
