/*!
 * Integration tests for the report pipeline
 *
 * A scripted in-memory source stands in for the Dataverse session:
 * - every page is consumed, in order, with cursors threaded through
 * - the size filter, owner contract and sort order hold across pages
 * - the CSV file grows page by page and keeps earlier pages on failure
 */

use assert_fs::prelude::*;
use async_trait::async_trait;
use desktopflow::{
    config::{OwnerLabel, SortOrder},
    core::{
        run_report, CancellationFlag, Cursor, NoopObserver, Page, PagingInfo, RawRecord,
        RecordSource, ReportOptions,
    },
    error::{FlowError, EXIT_FATAL, EXIT_INTEGRITY},
    protocol::dataverse::{parse_page, DataverseError, DataverseResult, FetchQuery},
};
use predicates::prelude::*;
use serde_json::json;
use std::sync::Mutex;

const HEADER: &str = "Name,Size,Owner,ModifiedOn\n";

/// Serves scripted pages; a page may be replaced by an error
struct ScriptedSource {
    pages: Vec<DataverseResult<Vec<RawRecord>>>,
    requests: Mutex<Vec<PagingInfo>>,
}

impl ScriptedSource {
    fn new(pages: Vec<DataverseResult<Vec<RawRecord>>>) -> Self {
        Self {
            pages,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_pages(&self) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.page_number)
            .collect()
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    fn organization_name(&self) -> &str {
        "Contoso Test"
    }

    async fn retrieve_page(&self, _query: &FetchQuery, paging: &PagingInfo) -> DataverseResult<Page> {
        self.requests.lock().unwrap().push(paging.clone());
        let index = (paging.page_number - 1) as usize;
        let records = match &self.pages[index] {
            Ok(records) => records.clone(),
            Err(e) => return Err(DataverseError::Network(e.to_string())),
        };
        let more_records = index + 1 < self.pages.len();
        Ok(Page {
            records,
            more_records,
            cursor: more_records.then(|| Cursor::new(format!("cookie-{}", paging.page_number))),
            total_record_count: None,
        })
    }
}

/// A flow whose payload measures `2 * chars` bytes
fn flow(id: &str, chars: usize) -> RawRecord {
    RawRecord::new(id)
        .with_name(format!("Flow {}", id))
        .with_payload("a".repeat(chars))
        .with_owner(format!("{}@contoso.com", id))
}

fn options(csv: Option<&std::path::Path>) -> ReportOptions {
    ReportOptions {
        csv_path: csv.map(|p| p.to_path_buf()),
        ..ReportOptions::default()
    }
}

#[tokio::test]
async fn test_all_pages_consumed_in_order() {
    let pages = (1..=4)
        .map(|page| {
            Ok((1..=3)
                .map(|i| flow(&format!("p{}r{}", page, i), page * 10 + i))
                .collect())
        })
        .collect();
    let source = ScriptedSource::new(pages);

    let summary = run_report(&source, &options(None), CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(source.request_pages(), vec![1, 2, 3, 4]);
    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.records_seen, 12);
    assert_eq!(summary.rows.len(), 12);
    assert_eq!(summary.rows.first().unwrap().id, "p4r3");
    assert_eq!(summary.rows.last().unwrap().id, "p1r1");
    assert!(summary
        .rows
        .windows(2)
        .all(|w| w[0].size_bytes >= w[1].size_bytes));
}

#[tokio::test]
async fn test_cursor_passed_back_verbatim() {
    let source = ScriptedSource::new(vec![Ok(vec![flow("a", 1)]), Ok(vec![flow("b", 1)]), Ok(vec![])]);
    run_report(&source, &options(None), CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();

    let requests = source.requests.lock().unwrap();
    assert_eq!(requests[0].cursor, None);
    assert_eq!(requests[1].cursor, Some(Cursor::new("cookie-1")));
    assert_eq!(requests[2].cursor, Some(Cursor::new("cookie-2")));
    assert!(requests.iter().all(|r| r.count == 10));
}

#[tokio::test]
async fn test_min_size_boundary_is_inclusive() {
    let source = ScriptedSource::new(vec![Ok(vec![flow("small", 49), flow("exact", 50), flow("big", 51)])]);
    let options = ReportOptions {
        min_size: 100,
        sort_order: SortOrder::Ascending,
        csv_path: None,
        ..ReportOptions::default()
    };

    let summary = run_report(&source, &options, CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();

    let ids: Vec<_> = summary.rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["exact", "big"]);
    assert_eq!(summary.rows_dropped, 1);
}

#[tokio::test]
async fn test_csv_written_in_arrival_order() {
    let temp = assert_fs::TempDir::new().unwrap();
    let csv = temp.child("flows.csv");
    let source = ScriptedSource::new(vec![Ok(vec![flow("a", 1), flow("b", 9)]), Ok(vec![flow("c", 5)])]);

    let summary = run_report(&source, &options(Some(csv.path())), CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();

    csv.assert(format!(
        "{}Flow a,2,a@contoso.com,\nFlow b,18,b@contoso.com,\nFlow c,10,c@contoso.com,\n",
        HEADER
    ));
    assert_eq!(summary.csv_path.as_deref(), Some(csv.path()));
    // Console rows are sorted, the file is not
    assert_eq!(summary.rows[0].id, "b");
}

#[tokio::test]
async fn test_failure_keeps_earlier_pages() {
    let temp = assert_fs::TempDir::new().unwrap();
    let csv = temp.child("flows.csv");
    let source = ScriptedSource::new(vec![
        Ok(vec![flow("a", 1)]),
        Ok(vec![flow("b", 2)]),
        Err(DataverseError::Network("connection reset".to_string())),
        Ok(vec![flow("never", 3)]),
    ]);

    let err = run_report(&source, &options(Some(csv.path())), CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Fetch { page: 3, .. }));
    assert_eq!(err.exit_code(), EXIT_FATAL);
    assert_eq!(source.request_pages(), vec![1, 2, 3]);
    csv.assert(predicate::str::starts_with(HEADER));
    csv.assert(predicate::str::contains("Flow b,4,b@contoso.com,\n"));
    csv.assert(predicate::str::contains("never").not());
}

#[tokio::test]
async fn test_missing_owner_on_reported_row_is_integrity_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    let csv = temp.child("flows.csv");
    let orphan = RawRecord::new("orphan").with_name("Orphan").with_payload("xxxx");
    let source = ScriptedSource::new(vec![Ok(vec![flow("a", 1)]), Ok(vec![orphan])]);

    let err = run_report(&source, &options(Some(csv.path())), CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::MissingOwner { ref record_id } if record_id == "orphan"));
    assert_eq!(err.exit_code(), EXIT_INTEGRITY);
    csv.assert(format!("{}Flow a,2,a@contoso.com,\n", HEADER));
}

#[tokio::test]
async fn test_missing_owner_on_dropped_row_is_ignored() {
    let orphan = RawRecord::new("orphan").with_payload("x");
    let source = ScriptedSource::new(vec![Ok(vec![orphan, flow("big", 100)])]);
    let options = ReportOptions {
        min_size: 10,
        csv_path: None,
        ..ReportOptions::default()
    };

    let summary = run_report(&source, &options, CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();
    assert_eq!(summary.rows.len(), 1);
    assert_eq!(summary.rows[0].id, "big");
}

#[tokio::test]
async fn test_no_csv_file_when_disabled() {
    let temp = assert_fs::TempDir::new().unwrap();
    let csv = temp.child("desktopflow.csv");
    let source = ScriptedSource::new(vec![Ok(vec![flow("a", 1)])]);

    let summary = run_report(&source, &options(None), CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();

    csv.assert(predicate::path::missing());
    assert_eq!(summary.csv_path, None);
}

#[tokio::test]
async fn test_existing_csv_is_replaced() {
    let temp = assert_fs::TempDir::new().unwrap();
    let csv = temp.child("flows.csv");
    csv.write_str("old,report\nstale,row\n").unwrap();
    let source = ScriptedSource::new(vec![Ok(vec![])]);

    run_report(&source, &options(Some(csv.path())), CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();

    csv.assert(HEADER);
}

#[tokio::test]
async fn test_cancelled_before_first_page() {
    let temp = assert_fs::TempDir::new().unwrap();
    let csv = temp.child("flows.csv");
    let source = ScriptedSource::new(vec![Ok(vec![flow("a", 1)])]);
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = run_report(&source, &options(Some(csv.path())), cancel, &NoopObserver)
        .await
        .unwrap_err();

    assert!(matches!(err, FlowError::Cancelled { pages_fetched: 0 }));
    assert!(source.request_pages().is_empty());
    csv.assert(HEADER);
}

#[tokio::test]
async fn test_page_cap_exceeded() {
    let source = ScriptedSource::new(vec![Ok(vec![flow("a", 1)]), Ok(vec![flow("b", 1)]), Ok(vec![])]);
    let options = ReportOptions {
        max_pages: Some(2),
        csv_path: None,
        ..ReportOptions::default()
    };

    let err = run_report(&source, &options, CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::PageLimitExceeded { max_pages: 2 }));
    assert_eq!(source.request_pages(), vec![1, 2]);
}

/// Serves canned Web API response bodies and records the FetchXML it was sent
struct WireSource {
    bodies: Vec<serde_json::Value>,
    fetch_xml: Mutex<Vec<String>>,
}

#[async_trait]
impl RecordSource for WireSource {
    fn organization_name(&self) -> &str {
        "Contoso Wire"
    }

    async fn retrieve_page(&self, query: &FetchQuery, paging: &PagingInfo) -> DataverseResult<Page> {
        self.fetch_xml.lock().unwrap().push(query.to_fetch_xml(paging));
        parse_page(&self.bodies[(paging.page_number - 1) as usize], query)
    }
}

#[tokio::test]
async fn test_wire_responses_end_to_end() {
    let source = WireSource {
        bodies: vec![
            json!({
                "@Microsoft.Dynamics.CRM.totalrecordcount": 2,
                "@Microsoft.Dynamics.CRM.morerecords": true,
                "@Microsoft.Dynamics.CRM.fetchxmlpagingcookie":
                    "<cookie pagenumber=\"2\" pagingcookie=\"%253ccookie%2520page%253d%25221%2522%253e%253c%252fcookie%253e\" istracking=\"False\" />",
                "value": [{
                    "workflowid": "w1",
                    "name": "Payroll export",
                    "clientdata": "é€",
                    "modifiedon": "2024-05-06T07:08:09Z",
                    "owner.fullname": "Ada Lovelace"
                }]
            }),
            json!({
                "@Microsoft.Dynamics.CRM.morerecords": false,
                "value": [{
                    "workflowid": "w2",
                    "name": "Emoji bot",
                    "clientdata": "😀",
                    "owner.fullname": "Grace Hopper"
                }]
            }),
        ],
        fetch_xml: Mutex::new(Vec::new()),
    };
    let options = ReportOptions {
        owner_label: OwnerLabel::Name,
        csv_path: None,
        ..ReportOptions::default()
    };

    let summary = run_report(&source, &options, CancellationFlag::new(), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(summary.organization, "Contoso Wire");
    assert_eq!(summary.total_record_count, Some(2));
    let rows: Vec<_> = summary
        .rows
        .iter()
        .map(|r| (r.id.as_str(), r.size_bytes, r.owner.as_str()))
        .collect();
    // Both payloads are two UTF-16 code units
    assert_eq!(rows, vec![("w1", 4, "Ada Lovelace"), ("w2", 4, "Grace Hopper")]);
    assert!(summary.rows[0].modified_on.is_some());

    let fetch_xml = source.fetch_xml.lock().unwrap();
    assert!(fetch_xml[0].contains(r#"page="1""#));
    assert!(fetch_xml[0].contains(r#"<attribute name="fullname"/>"#));
    assert!(fetch_xml[1].contains(r#"page="2""#));
    assert!(fetch_xml[1].contains(r#"paging-cookie="&lt;cookie page=&quot;1&quot;&gt;&lt;/cookie&gt;""#));
}
