/*!
 * Paginated retrieval of query results
 *
 * The driver walks a listing one page at a time: the first request carries
 * page number 1 and no cursor, each following request carries the cursor of
 * the previous response and the next page number. The walk ends when a
 * response reports no more records.
 */

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

use super::record::RawRecord;
use crate::error::{FlowError, Result};
use crate::protocol::dataverse::{DataverseResult, FetchQuery};

/// Continuation value returned by the service and passed back verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Paging parameters of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingInfo {
    /// 1-based page number
    pub page_number: u32,
    /// Records per page
    pub count: u32,
    /// Cursor from the previous page, absent on the first request
    pub cursor: Option<Cursor>,
    /// Ask the service for the total record count
    pub return_total_record_count: bool,
}

impl PagingInfo {
    /// Paging for the first request of a listing
    pub fn first(count: u32) -> Self {
        Self {
            page_number: 1,
            count,
            cursor: None,
            return_total_record_count: true,
        }
    }

    /// Paging for the request following this one
    pub fn next(&self, cursor: Option<Cursor>) -> Self {
        Self {
            page_number: self.page_number + 1,
            count: self.count,
            cursor,
            return_total_record_count: false,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub more_records: bool,
    pub cursor: Option<Cursor>,
    pub total_record_count: Option<u64>,
}

/// An authenticated session able to run paged queries
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Display name of the organization/environment behind the session
    fn organization_name(&self) -> &str;

    /// Retrieve one page of `query`
    async fn retrieve_page(&self, query: &FetchQuery, paging: &PagingInfo) -> DataverseResult<Page>;
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cancellation shared between the driver and a signal handler.
///
/// Checked before each page request and raced against the request in flight.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<CancelState>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel is not missed
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Lazy, finite, non-restartable sequence of pages for one query
pub struct PageDriver<'a, S: RecordSource + ?Sized> {
    source: &'a S,
    query: &'a FetchQuery,
    next: Option<PagingInfo>,
    max_pages: Option<u32>,
    cancel: CancellationFlag,
    pages_fetched: u32,
}

impl<'a, S: RecordSource + ?Sized> PageDriver<'a, S> {
    pub fn new(source: &'a S, query: &'a FetchQuery, page_size: u32) -> Self {
        Self {
            source,
            query,
            next: Some(PagingInfo::first(page_size)),
            max_pages: None,
            cancel: CancellationFlag::new(),
            pages_fetched: 0,
        }
    }

    /// Fail instead of fetching more than `max_pages` pages
    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Fetch the next page, or `None` once the service reported no more records.
    ///
    /// A failed fetch ends the sequence. Cancelling while a request is in
    /// flight drops the request and fails with `Cancelled`.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        let Some(paging) = self.next.take() else {
            return Ok(None);
        };

        if self.cancel.is_cancelled() {
            return Err(FlowError::Cancelled {
                pages_fetched: self.pages_fetched,
            });
        }
        if let Some(max_pages) = self.max_pages {
            if self.pages_fetched >= max_pages {
                return Err(FlowError::PageLimitExceeded { max_pages });
            }
        }

        debug!(
            page = paging.page_number,
            count = paging.count,
            has_cursor = paging.cursor.is_some(),
            "retrieving page"
        );
        let page = tokio::select! {
            result = self.source.retrieve_page(self.query, &paging) => {
                result.map_err(|source| FlowError::Fetch {
                    page: paging.page_number,
                    source,
                })?
            }
            _ = self.cancel.cancelled() => {
                return Err(FlowError::Cancelled {
                    pages_fetched: self.pages_fetched,
                });
            }
        };
        self.pages_fetched += 1;

        if page.more_records {
            self.next = Some(paging.next(page.cursor.clone()));
        }

        Ok(Some(page))
    }
}
