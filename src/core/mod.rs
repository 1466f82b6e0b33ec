/*!
 * Desktop flow report pipeline
 *
 * Pages flow one way: the driver fetches a page, the transformer measures and
 * filters its records, the accepted rows are appended to the CSV sink and
 * kept for the final sorted report. Nothing is fetched until the previous
 * page has been fully processed.
 */

pub mod pagination;
pub mod record;
pub mod sink;
pub mod size;
pub mod transform;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{OwnerLabel, ReportConfig, SortOrder};
use crate::error::Result;
use crate::protocol::dataverse::FetchQuery;

pub use pagination::{CancellationFlag, Cursor, Page, PageDriver, PagingInfo, RecordSource};
pub use record::{RawRecord, ReportRow};
pub use sink::{report_line, sort_rows, CsvSink};
pub use size::{bytes_to_string, utf16_byte_len};
pub use transform::RecordTransformer;

/// Settings of one report run
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub min_size: u64,
    pub page_size: u32,
    pub sort_order: SortOrder,
    pub owner_label: OwnerLabel,
    pub include_modified: bool,
    pub max_pages: Option<u32>,
    pub csv_path: Option<PathBuf>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for ReportOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            min_size: config.min_size,
            page_size: config.page_size,
            sort_order: config.sort_order,
            owner_label: config.owner_label,
            include_modified: config.include_modified,
            max_pages: config.max_pages,
            csv_path: config.csv_path().map(PathBuf::from),
        }
    }
}

/// Progress after one page has been processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    pub page_number: u32,
    pub records_in_page: usize,
    pub accepted_in_page: usize,
    pub accepted_total: usize,
    pub total_record_count: Option<u64>,
}

/// Receives progress notifications during a run
pub trait ReportObserver {
    fn page_processed(&self, _progress: &PageProgress) {}

    fn finished(&self) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl ReportObserver for NoopObserver {}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct ReportSummary {
    pub organization: String,
    /// Accepted rows, sorted by size
    pub rows: Vec<ReportRow>,
    pub pages_fetched: u32,
    pub records_seen: u64,
    pub rows_dropped: u64,
    pub total_record_count: Option<u64>,
    pub csv_path: Option<PathBuf>,
    pub elapsed: Duration,
}

impl ReportSummary {
    /// Sum of the reported payload sizes
    pub fn total_bytes(&self) -> u64 {
        self.rows.iter().map(|row| row.size_bytes).sum()
    }
}

/// Run the full listing against `source` and build the report.
///
/// Any fetch, data or file error aborts the run. Rows already appended to the
/// CSV file stay on disk; the file is released before the error is returned.
pub async fn run_report<S: RecordSource + ?Sized>(
    source: &S,
    options: &ReportOptions,
    cancel: CancellationFlag,
    observer: &dyn ReportObserver,
) -> Result<ReportSummary> {
    let started = Instant::now();
    let query = FetchQuery::desktop_flows(options.owner_label, options.include_modified);
    let transformer = RecordTransformer::new(options.min_size);

    let mut sink = options.csv_path.as_ref().map(CsvSink::create).transpose()?;
    let mut driver = PageDriver::new(source, &query, options.page_size)
        .with_max_pages(options.max_pages)
        .with_cancellation(cancel);

    let mut rows: Vec<ReportRow> = Vec::new();
    let mut records_seen = 0u64;
    let mut total_record_count = None;

    while let Some(page) = driver.next_page().await? {
        let page_number = driver.pages_fetched();
        let records_in_page = page.records.len();
        if page_number == 1 {
            total_record_count = page.total_record_count;
        }

        let mut accepted = Vec::with_capacity(records_in_page);
        for record in page.records {
            records_seen += 1;
            if let Some(row) = transformer.transform(record)? {
                accepted.push(row);
            }
        }

        if let Some(sink) = sink.as_mut() {
            sink.append_page(&accepted)?;
        }

        let progress = PageProgress {
            page_number,
            records_in_page,
            accepted_in_page: accepted.len(),
            accepted_total: rows.len() + accepted.len(),
            total_record_count,
        };
        info!(
            page = page_number,
            records = records_in_page,
            accepted = progress.accepted_in_page,
            accepted_total = progress.accepted_total,
            "processed page"
        );
        observer.page_processed(&progress);

        rows.extend(accepted);
    }

    let csv_path = sink.map(CsvSink::finish).transpose()?;
    sort_rows(&mut rows, options.sort_order);
    observer.finished();

    if let Some(expected) = total_record_count {
        if expected != records_seen {
            warn!(expected, seen = records_seen, "record count changed during listing");
        }
    }

    let rows_dropped = records_seen - rows.len() as u64;
    Ok(ReportSummary {
        organization: source.organization_name().to_string(),
        rows,
        pages_fetched: driver.pages_fetched(),
        records_seen,
        rows_dropped,
        total_record_count,
        csv_path,
        elapsed: started.elapsed(),
    })
}
