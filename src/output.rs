//! Report output in human-readable or JSON Lines form.

use std::io::{self, Write};

use serde::Serialize;

use crate::core::{bytes_to_string, report_line, ReportRow, ReportSummary};

/// Output mode for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// One report row as emitted in JSON mode
#[derive(Debug, Serialize)]
pub struct RowRecord<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub size_bytes: u64,
    /// Human-readable size, e.g. `1.5KB`
    pub size: String,
    pub owner: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_on: Option<String>,
}

impl<'a> From<&'a ReportRow> for RowRecord<'a> {
    fn from(row: &'a ReportRow) -> Self {
        Self {
            id: &row.id,
            name: &row.name,
            size_bytes: row.size_bytes,
            size: bytes_to_string(i64::try_from(row.size_bytes).unwrap_or(i64::MAX)),
            owner: &row.owner,
            modified_on: row.modified_on_display(),
        }
    }
}

/// Run totals emitted in JSON mode
#[derive(Debug, Serialize)]
struct SummaryRecord<'a> {
    organization: &'a str,
    pages_fetched: u32,
    records_seen: u64,
    rows_reported: usize,
    rows_dropped: u64,
    total_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    csv_path: Option<String>,
    duration_secs: f64,
}

/// Writes report rows and errors in the selected mode
#[derive(Debug, Clone)]
pub struct OutputWriter {
    pub mode: OutputMode,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            mode: if json { OutputMode::Json } else { OutputMode::Human },
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Render one row: the console report line, or one JSON object
    pub fn render_row(&self, row: &ReportRow) -> String {
        match self.mode {
            OutputMode::Human => report_line(row),
            OutputMode::Json => serde_json::to_string(&RowRecord::from(row))
                .unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", sanitize_error(&e.to_string()))),
        }
    }

    /// Write all rows, one per line
    pub fn write_rows<W: Write>(&self, out: &mut W, rows: &[ReportRow]) -> io::Result<()> {
        for row in rows {
            writeln!(out, "{}", self.render_row(row))?;
        }
        out.flush()
    }

    /// Emit the run totals in JSON mode. Human mode uses the styled summary table.
    pub fn summary(&self, summary: &ReportSummary) {
        if !self.is_json() {
            return;
        }
        let record = SummaryRecord {
            organization: &summary.organization,
            pages_fetched: summary.pages_fetched,
            records_seen: summary.records_seen,
            rows_reported: summary.rows.len(),
            rows_dropped: summary.rows_dropped,
            total_size_bytes: summary.total_bytes(),
            csv_path: summary.csv_path.as_ref().map(|p| p.display().to_string()),
            duration_secs: summary.elapsed.as_secs_f64(),
        };
        if let Ok(json) = serde_json::to_string(&record) {
            eprintln!("{}", json);
        }
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        match self.mode {
            OutputMode::Json => {
                let value = serde_json::json!({ "error": sanitize_error(msg) });
                eprintln!("{}", value);
            }
            OutputMode::Human => crate::cli_style::print_error(&sanitize_error(msg), None),
        }
    }
}

/// Sanitize error messages by collapsing whitespace
pub fn sanitize_error(msg: &str) -> String {
    msg.split_whitespace().collect::<Vec<&str>>().join(" ")
}
