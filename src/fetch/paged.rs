//! Page-by-page retrieval of a result set whose size is reported on the first page.

use crate::fetch::error::FetchError;
use log::{debug, warn};
use reqwest::StatusCode;
use std::future::Future;

/// Fixed page size used against the ground-truth service.
pub const DEFAULT_PAGE_SIZE: u32 = 720;

/// What one page request produced.
#[derive(Debug)]
pub enum PageResponse<T> {
    /// A page of items plus the total item count across all pages.
    Page { items: Vec<T>, total_count: u64 },
    /// A well-formed response without the nested items field (e.g. no data for the range).
    MissingItems,
    /// A non-success HTTP status.
    HttpStatus(StatusCode),
}

/// A paginated upstream query, already bound to its date range and identifier.
pub trait PageSource {
    type Item;

    /// Fetches page `page_no` (1-based) holding at most `page_size` items.
    fn fetch_page(
        &self,
        page_no: u32,
        page_size: u32,
    ) -> impl Future<Output = Result<PageResponse<Self::Item>, FetchError>> + Send;
}

/// The accumulated result of a paginated fetch.
#[derive(Debug, PartialEq)]
pub enum FetchOutcome<T> {
    /// Every page was fetched.
    Complete(Vec<T>),
    /// A page failed with an HTTP error after earlier pages succeeded.
    Partial {
        items: Vec<T>,
        status: StatusCode,
        failed_page: u32,
    },
    /// Nothing to return: no items field, no rows, or the first page failed.
    NoData,
}

impl<T> FetchOutcome<T> {
    pub fn is_partial(&self) -> bool {
        matches!(self, FetchOutcome::Partial { .. })
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            FetchOutcome::Complete(items) | FetchOutcome::Partial { items, .. } => items,
            FetchOutcome::NoData => Vec::new(),
        }
    }

    /// Maps the item list while keeping the completeness information.
    pub fn map_items<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Complete(items) => FetchOutcome::Complete(f(items)),
            FetchOutcome::Partial {
                items,
                status,
                failed_page,
            } => FetchOutcome::Partial {
                items: f(items),
                status,
                failed_page,
            },
            FetchOutcome::NoData => FetchOutcome::NoData,
        }
    }
}

/// Number of pages needed for `total` items, `ceil(total / page_size)`.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1)))
}

/// Walks a [`PageSource`] from page 1 to the last page implied by the first page's total count,
/// concatenating items in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagedFetcher {
    page_size: u32,
}

impl Default for PagedFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl PagedFetcher {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Fetches every page. Decode and network errors are returned as `Err` so the caller's retry
    /// policy can decide; an HTTP error status ends the loop with whatever was gathered so far.
    pub async fn fetch_all<S: PageSource>(
        &self,
        source: &S,
    ) -> Result<FetchOutcome<S::Item>, FetchError> {
        let mut page_no: u32 = 1;
        let mut total_pages: u64 = 1;
        let mut items = Vec::new();

        while u64::from(page_no) <= total_pages {
            match source.fetch_page(page_no, self.page_size).await? {
                PageResponse::Page {
                    items: page_items,
                    total_count,
                } => {
                    if page_no == 1 {
                        total_pages = page_count(total_count, self.page_size);
                        debug!(
                            "Total count {} at page size {}: {} page(s)",
                            total_count, self.page_size, total_pages
                        );
                    }
                    items.extend(page_items);
                    page_no += 1;
                }
                PageResponse::MissingItems => {
                    warn!("Response for page {} has no items, treating as no data", page_no);
                    return Ok(FetchOutcome::NoData);
                }
                PageResponse::HttpStatus(status) => {
                    warn!("HTTP error {} on page {}, stopping pagination", status, page_no);
                    if items.is_empty() {
                        return Ok(FetchOutcome::NoData);
                    }
                    return Ok(FetchOutcome::Partial {
                        items,
                        status,
                        failed_page: page_no,
                    });
                }
            }
        }

        if items.is_empty() {
            Ok(FetchOutcome::NoData)
        } else {
            Ok(FetchOutcome::Complete(items))
        }
    }
}
