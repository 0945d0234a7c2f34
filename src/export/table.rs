//! Tabular export.

use chrono::SecondsFormat;

use super::{ExportFormat, ExportSnapshot, Renderer};

const HEADER: [&str; 7] = [
    "step_id",
    "title",
    "notes",
    "expected",
    "actual",
    "asset_path",
    "timestamp",
];

/// RFC 4180 CSV, one row per step in position order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRenderer;

impl Renderer for CsvRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn render(&self, snapshot: &ExportSnapshot) -> Vec<u8> {
        let mut out = String::new();
        push_row(&mut out, HEADER.iter().map(|h| h.to_string()));

        for entry in &snapshot.steps {
            let step = &entry.step;
            push_row(
                &mut out,
                [
                    step.id.to_string(),
                    step.title.clone(),
                    step.notes.clone(),
                    step.expected.clone(),
                    step.actual.clone(),
                    step.asset_path.to_string_lossy().replace('\\', "/"),
                    step.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                ]
                .into_iter(),
            );
        }

        out.into_bytes()
    }
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote(&field));
    }
    out.push_str("\r\n");
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::test_support::*;

    fn rows() -> Vec<String> {
        let bytes = CsvRenderer.render(&sample_snapshot());
        String::from_utf8(bytes)
            .unwrap()
            .split("\r\n")
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_header_and_rows() {
        let rows = rows();
        assert_eq!(
            rows[0],
            "step_id,title,notes,expected,actual,asset_path,timestamp"
        );
        assert_eq!(
            rows[1],
            "1,Open login page,,,,assets/1.png,2026-03-14T09:26:53Z"
        );
        assert_eq!(
            rows[2],
            "2,Step 2,Login succeeded,Dashboard shown,,assets/2.png,2026-03-14T09:26:53Z"
        );
        // Trailing CRLF leaves an empty final element
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[4], "");
    }

    #[test]
    fn test_rows_follow_snapshot_order() {
        let mut snapshot = sample_snapshot();
        snapshot.steps.swap(0, 2);

        let out = String::from_utf8(CsvRenderer.render(&snapshot)).unwrap();
        let first_row = out.split("\r\n").nth(1).unwrap();
        assert!(first_row.starts_with("3,"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("a,b"), "\"a,b\"");
        assert_eq!(quote("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("two\nlines"), "\"two\nlines\"");
    }
}
