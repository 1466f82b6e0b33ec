/*!
 * Report sinks: incremental CSV file and console lines
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::record::ReportRow;
use super::size::bytes_to_string;
use crate::config::SortOrder;
use crate::error::{FlowError, Result};

/// Header line of the CSV report
pub const CSV_HEADER: &str = "Name,Size,Owner,ModifiedOn";

/// CSV report written page by page.
///
/// Fields are written as-is: commas or newlines inside a flow name are not
/// quoted, matching the format consumers of this report already parse.
/// The file is flushed after every page; dropping the sink releases it.
pub struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
    rows_written: u64,
}

impl CsvSink {
    /// Create or truncate `path` and write the header
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| FlowError::io_at(&path, e))?;
        let mut sink = Self {
            path,
            writer: BufWriter::new(file),
            rows_written: 0,
        };
        sink.write_line(CSV_HEADER)?;
        sink.flush()?;
        Ok(sink)
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Append the accepted rows of one page and flush
    pub fn append_page(&mut self, rows: &[ReportRow]) -> Result<()> {
        for row in rows {
            let line = csv_line(row);
            self.write_line(&line)?;
            self.rows_written += 1;
        }
        self.flush()
    }

    /// Flush and close the file
    pub fn finish(mut self) -> Result<PathBuf> {
        self.flush()?;
        Ok(self.path)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line).map_err(|e| FlowError::io_at(&self.path, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| FlowError::io_at(&self.path, e))
    }
}

/// `name,size_bytes,owner,modified_on` without quoting
pub fn csv_line(row: &ReportRow) -> String {
    format!(
        "{},{},{},{}",
        row.name,
        row.size_bytes,
        row.owner,
        row.modified_on_display().unwrap_or_default()
    )
}

/// Sort rows by size in place. Rows of equal size keep their arrival order.
pub fn sort_rows(rows: &mut [ReportRow], order: SortOrder) {
    match order {
        SortOrder::Ascending => rows.sort_by_key(|row| row.size_bytes),
        SortOrder::Descending => rows.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
    }
}

/// Console report line for one row
pub fn report_line(row: &ReportRow) -> String {
    let mut line = format!(
        "DesktopFlow: {} with id: {}, Size: {}, Owner: {}",
        row.name,
        row.id,
        bytes_to_string(i64::try_from(row.size_bytes).unwrap_or(i64::MAX)),
        row.owner
    );
    if let Some(modified) = row.modified_on_display() {
        line.push_str(", Last Modified date: ");
        line.push_str(&modified);
    }
    line
}
