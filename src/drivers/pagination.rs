use crate::data_model::{Acceptance, DateRange, Record};
use crate::error::Result;
use crate::fetch::{FetchOutcome, ResilientFetcher};
use crate::storage::Collector;
use crate::utils::prometheus_metrics::{PAGES_FETCHED_TOTAL, PARSE_FAILURES_TOTAL};
use futures::stream::{self, Stream, StreamExt};
use futures::pin_mut;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One parsed payload: items (individually fallible) and the next cursor.
#[derive(Debug)]
pub struct Page<R> {
    pub items: Vec<Result<R>>,
    pub next_cursor: Option<String>,
}

/// Turns a fetched payload into records. Source-specific.
pub trait PageParser: Send + Sync {
    type Item: Record;

    /// `Err` means the whole page is unusable; per-item failures go in `Page::items`.
    fn parse_page(&self, payload: &str) -> Result<Page<Self::Item>>;
}

/// Base URL, fixed query parameters and the name of the cursor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub label: String,
    pub base_url: String,
    pub params: Vec<(String, String)>,
    pub cursor_param: String,
}

impl ListingQuery {
    pub fn new(label: impl Into<String>, base_url: impl Into<String>) -> Self {
        ListingQuery {
            label: label.into(),
            base_url: base_url.into(),
            params: Vec::new(),
            cursor_param: "after".to_string(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn url(&self, cursor: Option<&str>) -> Result<Url> {
        let mut url = ResilientFetcher::parse_url(&self.base_url)?;
        if !self.params.is_empty() || cursor.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.params {
                pairs.append_pair(key, value);
            }
            if let Some(cursor) = cursor {
                pairs.append_pair(&self.cursor_param, cursor);
            }
        }
        Ok(url)
    }
}

/// Why a pagination sequence ended. Only `EndOfData` and `EmptyPage` are clean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndOfData,
    EmptyPage,
    FetchFailed(&'static str),
    ParseFailed,
    InvalidQuery,
    Cancelled,
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StopReason::FetchFailed(_) | StopReason::ParseFailed | StopReason::InvalidQuery
        )
    }
}

pub enum PageEvent<R> {
    Page(Vec<R>),
    Stopped(StopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationReport {
    pub pages: usize,
    /// Parsed records offered to the collector.
    pub found: usize,
    pub accepted: usize,
    pub stop: StopReason,
}

enum PageState {
    Fetch(Option<String>),
    Stop(StopReason),
    Done,
}

/// Walks an opaque `after` cursor until the source runs dry.
pub struct Paginator<'a, P> {
    fetcher: &'a ResilientFetcher,
    parser: &'a P,
}

impl<P> Clone for Paginator<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for Paginator<'_, P> {}

impl<'a, P: PageParser> Paginator<'a, P> {
    pub fn new(fetcher: &'a ResilientFetcher, parser: &'a P) -> Self {
        Paginator { fetcher, parser }
    }

    pub fn fetcher(&self) -> &'a ResilientFetcher {
        self.fetcher
    }

    /// Lazy page sequence, ending with exactly one `Stopped` event.
    pub fn pages(&self, query: ListingQuery) -> impl Stream<Item = PageEvent<P::Item>> + 'a {
        let fetcher = self.fetcher;
        let parser = self.parser;
        let query = Arc::new(query);
        stream::unfold(PageState::Fetch(None), move |state| {
            let query = Arc::clone(&query);
            async move {
                match state {
                    PageState::Done => None,
                    PageState::Stop(reason) => Some((PageEvent::Stopped(reason), PageState::Done)),
                    PageState::Fetch(cursor) => {
                        Some(next_page(fetcher, parser, &query, cursor).await)
                    }
                }
            }
        })
    }

    /// Lazy record sequence for one query.
    pub fn paginate(&self, query: ListingQuery) -> impl Stream<Item = P::Item> + 'a {
        self.pages(query)
            .filter_map(|event| async move {
                match event {
                    PageEvent::Page(records) => Some(stream::iter(records)),
                    PageEvent::Stopped(_) => None,
                }
            })
            .flatten()
    }

    /// Paginates each query in turn; only the cursor resets between them.
    pub fn paginate_windows(&self, queries: Vec<ListingQuery>) -> impl Stream<Item = P::Item> + 'a {
        let this = *self;
        stream::iter(queries).flat_map(move |query| this.paginate(query))
    }

    /// Drains one query into `collector`.
    pub async fn run(
        &self,
        query: ListingQuery,
        collector: &mut Collector<P::Item>,
        window: Option<&DateRange>,
    ) -> PaginationReport {
        let label = query.label.clone();
        let pages = self.pages(query);
        pin_mut!(pages);

        let mut report = PaginationReport {
            pages: 0,
            found: 0,
            accepted: 0,
            stop: StopReason::EndOfData,
        };
        while let Some(event) = pages.next().await {
            match event {
                PageEvent::Page(records) => {
                    report.pages += 1;
                    let offered = records.len();
                    let mut accepted_here = 0;
                    for record in records {
                        if collector.offer(record, window).await == Acceptance::Accepted {
                            accepted_here += 1;
                        }
                    }
                    report.found += offered;
                    report.accepted += accepted_here;
                    debug!(query = %label, page = report.pages, offered, accepted = accepted_here, "Page processed");
                }
                PageEvent::Stopped(reason) => report.stop = reason,
            }
        }
        info!(
            query = %label,
            pages = report.pages,
            found = report.found,
            accepted = report.accepted,
            stop = ?report.stop,
            "Pagination finished"
        );
        report
    }
}

async fn next_page<P: PageParser>(
    fetcher: &ResilientFetcher,
    parser: &P,
    query: &ListingQuery,
    cursor: Option<String>,
) -> (PageEvent<P::Item>, PageState) {
    let stop = |reason| (PageEvent::Stopped(reason), PageState::Done);

    if fetcher.shutdown().is_triggered() {
        return stop(StopReason::Cancelled);
    }
    let url = match query.url(cursor.as_deref()) {
        Ok(url) => url,
        Err(e) => {
            error!(query = %query.label, error = %e, "Cannot build page URL");
            return stop(StopReason::InvalidQuery);
        }
    };

    let body = match fetcher.fetch(&url).await {
        FetchOutcome::Success(body) => body,
        FetchOutcome::Cancelled => return stop(StopReason::Cancelled),
        other => {
            warn!(query = %query.label, outcome = other.label(), "Failed to fetch page, stopping pagination");
            return stop(StopReason::FetchFailed(other.label()));
        }
    };
    PAGES_FETCHED_TOTAL.inc();

    let page = match parser.parse_page(&body) {
        Ok(page) => page,
        Err(e) => {
            PARSE_FAILURES_TOTAL.inc();
            warn!(query = %query.label, error = %e, "Unparseable page, stopping pagination");
            return stop(StopReason::ParseFailed);
        }
    };
    if page.items.is_empty() {
        info!(query = %query.label, "No more items in pagination");
        return stop(StopReason::EmptyPage);
    }

    let mut records = Vec::with_capacity(page.items.len());
    for item in page.items {
        match item {
            Ok(record) => records.push(record),
            Err(e) => {
                PARSE_FAILURES_TOTAL.inc();
                debug!(error = %e, "Skipping unparseable item");
            }
        }
    }

    let next = match page.next_cursor {
        Some(cursor) if !cursor.is_empty() => PageState::Fetch(Some(cursor)),
        _ => PageState::Stop(StopReason::EndOfData),
    };
    (PageEvent::Page(records), next)
}
