/*!
 * Console styling for the report CLI
 *
 * Report lines go to stdout. Everything decorative (notices, the summary
 * table, errors) goes to stderr so stdout can be piped.
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};

use crate::core::{bytes_to_string, ReportSummary};

// ============================================================================
// THEME COLORS
// ============================================================================

/// Colors shared by all console output
pub struct Theme;

impl Theme {
    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold cyan)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }
}

// ============================================================================
// ICONS
// ============================================================================

pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const ARROW_RIGHT: &'static str = "→";
}

// ============================================================================
// HEADERS AND TABLES
// ============================================================================

/// Section header with a trailing rule, e.g. the organization name
pub fn section_header(title: &str) {
    println!("{}", section_header_text(title));
}

fn section_header_text(title: &str) -> String {
    let line_len = 50 - title.chars().count().min(40);
    format!(
        "\n{} {}",
        Theme::header(title),
        Theme::muted("─".repeat(line_len))
    )
}

/// Minimal table without outer borders
pub fn create_minimal_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Key/value table of the run totals
pub fn summary_table(summary: &ReportSummary) -> Table {
    let mut table = create_minimal_table();
    let total_size = bytes_to_string(i64::try_from(summary.total_bytes()).unwrap_or(i64::MAX));

    let mut rows: Vec<(&str, String, Color)> = vec![
        ("Pages fetched", summary.pages_fetched.to_string(), Color::White),
        ("Records seen", summary.records_seen.to_string(), Color::White),
        ("Rows reported", summary.rows.len().to_string(), Color::Green),
    ];
    if summary.rows_dropped > 0 {
        rows.push(("Rows dropped", summary.rows_dropped.to_string(), Color::Yellow));
    }
    rows.push(("Total payload size", total_size, Color::White));
    rows.push((
        "Duration",
        format_duration(summary.elapsed.as_secs_f64()),
        Color::White,
    ));
    if let Some(path) = &summary.csv_path {
        rows.push(("CSV report", path.display().to_string(), Color::DarkGrey));
    }

    for (key, value, color) in rows {
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(value).fg(color).add_attribute(Attribute::Bold),
        ]);
    }
    table
}

/// Print the summary table to stderr
pub fn print_summary(summary: &ReportSummary) {
    eprintln!();
    eprintln!("{}", summary_table(summary));
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Format duration into human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours, mins)
    }
}

/// Print a styled error message with optional hint
pub fn print_error(message: &str, hint: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = hint {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    eprintln!(
        "{} {}",
        Theme::success(Icons::SUCCESS),
        Theme::success(message)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.5), "500ms");
        assert_eq!(format_duration(1.0), "1.0s");
        assert_eq!(format_duration(65.0), "1m 5s");
        assert_eq!(format_duration(3665.0), "1h 1m");
    }

    #[test]
    fn test_section_header_contains_title() {
        console::set_colors_enabled(false);
        let text = section_header_text("Contoso (dev)");
        assert!(text.contains("Contoso (dev)"));
        assert!(text.contains("─"));
    }

    #[test]
    fn test_summary_table() {
        let summary = ReportSummary {
            organization: "Contoso".to_string(),
            rows: Vec::new(),
            pages_fetched: 3,
            records_seen: 25,
            rows_dropped: 25,
            total_record_count: Some(25),
            csv_path: Some(PathBuf::from("desktopflow.csv")),
            elapsed: Duration::from_millis(1500),
        };
        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("Pages fetched"));
        assert!(rendered.contains("Rows dropped"));
        assert!(rendered.contains("0B"));
        assert!(rendered.contains("1.5s"));
        assert!(rendered.contains("desktopflow.csv"));
    }
}
