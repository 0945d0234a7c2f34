//! Document-style exports.
//!
//! [`render_document`] walks the snapshot and drives a [`DocumentSink`],
//! which knows how to lay out headings, paragraphs and images in one
//! concrete format. Adding a format means adding a sink; the step layout
//! stays in one place.

use base64::Engine;
use chrono::SecondsFormat;
use std::path::Path;

use super::ExportSnapshot;

/// Layout primitives a document format must provide.
pub trait DocumentSink {
    /// Document title, emitted once at the top.
    fn title(&mut self, text: &str);

    /// Section heading for a step.
    fn heading(&mut self, text: &str);

    fn paragraph(&mut self, text: &str);

    /// Labelled value. An empty value still produces the label.
    fn field(&mut self, label: &str, value: &str);

    fn image(&mut self, bytes: &[u8], asset_path: &Path, caption: &str);

    /// Stand-in for an image that could not be found.
    fn placeholder(&mut self, text: &str);

    /// Separator between steps.
    fn break_section(&mut self);

    fn finish(self) -> Vec<u8>;
}

/// Lays out every step of `snapshot` into `sink`.
pub fn render_document<S: DocumentSink>(snapshot: &ExportSnapshot, mut sink: S) -> Vec<u8> {
    sink.title(&snapshot.title);
    sink.paragraph(&format!(
        "Generated: {}",
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    sink.paragraph(&format!("Total Steps: {}", snapshot.steps.len()));
    sink.break_section();

    for entry in &snapshot.steps {
        sink.heading(&format!("Step {}: {}", entry.number, entry.display_title()));

        match &entry.image {
            Some(bytes) => sink.image(
                bytes,
                &entry.step.asset_path,
                &format!("Screenshot for step {}", entry.number),
            ),
            None => sink.placeholder(&format!(
                "[Screenshot missing: {}]",
                entry.step.asset_path.display()
            )),
        }

        let step = &entry.step;
        if !step.expected.is_empty() || !step.actual.is_empty() {
            sink.field("Expected Result", or_na(&step.expected));
            sink.field("Actual Result", or_na(&step.actual));
        }

        sink.field("Notes", &step.notes);
        sink.field(
            "Captured",
            &step.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        sink.break_section();
    }

    sink.finish()
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn mime_type(asset_path: &Path) -> &'static str {
    match asset_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/png",
    }
}

/// Single-file HTML with screenshots inlined as data URIs.
#[derive(Debug, Default)]
pub struct HtmlSink {
    body: String,
    title: String,
}

impl HtmlSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentSink for HtmlSink {
    fn title(&mut self, text: &str) {
        self.title = escape_html(text);
        self.body.push_str(&format!("<h1>{}</h1>\n", self.title));
    }

    fn heading(&mut self, text: &str) {
        self.body.push_str(&format!("<h2>{}</h2>\n", escape_html(text)));
    }

    fn paragraph(&mut self, text: &str) {
        self.body.push_str(&format!("<p>{}</p>\n", escape_html(text)));
    }

    fn field(&mut self, label: &str, value: &str) {
        let value = escape_html(value).replace('\n', "<br>\n");
        self.body.push_str(&format!(
            "<p class=\"field\"><strong>{}:</strong> <span>{}</span></p>\n",
            escape_html(label),
            value
        ));
    }

    fn image(&mut self, bytes: &[u8], asset_path: &Path, caption: &str) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.body.push_str(&format!(
            "<figure>\n<img src=\"data:{};base64,{}\" alt=\"{}\">\n<figcaption>{}</figcaption>\n</figure>\n",
            mime_type(asset_path),
            encoded,
            escape_html(caption),
            escape_html(caption)
        ));
    }

    fn placeholder(&mut self, text: &str) {
        self.body
            .push_str(&format!("<p class=\"missing\">{}</p>\n", escape_html(text)));
    }

    fn break_section(&mut self) {
        self.body.push_str("<hr>\n");
    }

    fn finish(self) -> Vec<u8> {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
             <style>\nbody {{ font-family: sans-serif; max-width: 60em; margin: auto; }}\n\
             img {{ max-width: 100%; border: 1px solid #ccc; }}\n\
             .missing {{ color: #a00; font-style: italic; }}\n</style>\n</head>\n<body>\n{}</body>\n</html>\n",
            self.title, self.body
        )
        .into_bytes()
    }
}

/// Markdown that links screenshots relative to the session root, meant to
/// be written next to `manifest.json`.
#[derive(Debug, Default)]
pub struct MarkdownSink {
    out: String,
}

impl MarkdownSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentSink for MarkdownSink {
    fn title(&mut self, text: &str) {
        self.out.push_str(&format!("# {text}\n\n"));
    }

    fn heading(&mut self, text: &str) {
        self.out.push_str(&format!("## {text}\n\n"));
    }

    fn paragraph(&mut self, text: &str) {
        self.out.push_str(&format!("{text}\n\n"));
    }

    fn field(&mut self, label: &str, value: &str) {
        if value.contains('\n') {
            self.out.push_str(&format!("**{label}:**\n\n{value}\n\n"));
        } else {
            self.out.push_str(&format!("**{label}:** {value}\n\n"));
        }
    }

    fn image(&mut self, _bytes: &[u8], asset_path: &Path, caption: &str) {
        // Forward slashes keep the link portable
        let link = asset_path.to_string_lossy().replace('\\', "/");
        self.out.push_str(&format!("![{caption}]({link})\n\n"));
    }

    fn placeholder(&mut self, text: &str) {
        self.out.push_str(&format!("> {text}\n\n"));
    }

    fn break_section(&mut self) {
        self.out.push_str("---\n\n");
    }

    fn finish(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}
