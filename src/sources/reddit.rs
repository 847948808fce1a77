//! Subreddit listings on old.reddit.com's public JSON endpoints.
//!
//! Two ways of reaching posts are offered: sorted listings (`new`, `hot`,
//! `top`, ...) walked with the `after` cursor, and a time-chunked search that
//! slices the date range into windows so no single query hits the listing
//! ceiling of roughly 1000 posts.

use crate::data_model::{DateRange, Record};
use crate::drivers::chunking::ChunkDriver;
use crate::drivers::pagination::{ListingQuery, Page, PageParser, Paginator};
use crate::drivers::strategy::{Strategy, StrategyYield};
use crate::error::{Result, ScraperError};
use crate::fetch::ResilientFetcher;
use crate::storage::Collector;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "https://old.reddit.com";
pub const PAGE_LIMIT: u32 = 100;

#[derive(clap::ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    New,
    Hot,
    Top,
    Rising,
    Controversial,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::New => "new",
            SortMode::Hot => "hot",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
            SortMode::Controversial => "controversial",
        }
    }

    /// Every sort, in the order they are scraped by default.
    pub fn all() -> Vec<SortMode> {
        vec![
            SortMode::New,
            SortMode::Hot,
            SortMode::Top,
            SortMode::Rising,
            SortMode::Controversial,
        ]
    }

    /// Ranked sorts are paginated once per time window; `None` means no `t` parameter.
    pub fn time_windows(&self) -> Vec<Option<&'static str>> {
        match self {
            SortMode::Top | SortMode::Controversial => {
                vec![Some("month"), Some("year"), Some("all")]
            }
            _ => vec![None],
        }
    }
}

/// One post, flattened so it fits a CSV row.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub score: i64,
    pub upvote_ratio: Option<f64>,
    pub num_comments: u64,
    pub created_utc: f64,
    pub created_date: String,
    pub url: Option<String>,
    pub permalink: String,
    pub selftext: String,
    pub is_self: bool,
    pub link_flair_text: Option<String>,
    pub over_18: bool,
    pub spoiler: bool,
    pub stickied: bool,
}

impl Record for RedditPost {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.created_utc.trunc() as i64, 0).unwrap_or_default()
    }
}

// Shape of `data` inside each listing child. Missing optional fields default.
#[derive(Deserialize)]
struct RawPost {
    id: String,
    #[serde(default)]
    title: String,
    author: Option<String>,
    #[serde(default)]
    score: i64,
    upvote_ratio: Option<f64>,
    #[serde(default)]
    num_comments: u64,
    created_utc: f64,
    url: Option<String>,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    is_self: bool,
    link_flair_text: Option<String>,
    #[serde(default)]
    over_18: bool,
    #[serde(default)]
    spoiler: bool,
    #[serde(default)]
    stickied: bool,
}

impl RawPost {
    fn into_post(self) -> Result<RedditPost> {
        if self.id.is_empty() {
            return Err(ScraperError::parse_failure("reddit post", "empty id"));
        }
        let created = DateTime::from_timestamp(self.created_utc.trunc() as i64, 0).ok_or_else(|| {
            ScraperError::parse_failure(
                "reddit post",
                format!("created_utc {} out of range", self.created_utc),
            )
        })?;
        Ok(RedditPost {
            id: self.id,
            title: self.title,
            author: self.author,
            score: self.score,
            upvote_ratio: self.upvote_ratio,
            num_comments: self.num_comments,
            created_utc: self.created_utc,
            created_date: created.to_rfc3339(),
            url: self.url,
            permalink: format!("https://reddit.com{}", self.permalink),
            selftext: self.selftext,
            is_self: self.is_self,
            link_flair_text: self.link_flair_text,
            over_18: self.over_18,
            spoiler: self.spoiler,
            stickied: self.stickied,
        })
    }
}

/// Parses `{"data": {"children": [{"data": {...}}], "after": "t3_.."}}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedditListingParser;

impl PageParser for RedditListingParser {
    type Item = RedditPost;

    fn parse_page(&self, payload: &str) -> Result<Page<RedditPost>> {
        let document: Value = serde_json::from_str(payload)?;
        let data = document
            .get("data")
            .ok_or_else(|| ScraperError::parse_failure("reddit listing", "missing 'data'"))?;

        let items = match data.get("children").and_then(Value::as_array) {
            Some(children) => children
                .iter()
                .map(|child| {
                    let post = child.get("data").cloned().unwrap_or(Value::Null);
                    serde_json::from_value::<RawPost>(post)
                        .map_err(|e| ScraperError::parse_failure("reddit post", e))
                        .and_then(RawPost::into_post)
                })
                .collect(),
            None => Vec::new(),
        };
        let next_cursor = data
            .get("after")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Page { items, next_cursor })
    }
}

/// `r/rust`, `/r/rust/` and `rust` all name the same subreddit.
pub fn subreddit_name(raw: &str) -> &str {
    let name = raw.trim().trim_matches('/');
    name.strip_prefix("r/").unwrap_or(name).trim_matches('/')
}

/// Builds listing and search queries for one subreddit.
#[derive(Debug, Clone)]
pub struct RedditSource {
    base_url: String,
    subreddit: String,
}

impl RedditSource {
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, subreddit)
    }

    pub fn with_base_url(base_url: impl Into<String>, subreddit: impl Into<String>) -> Self {
        let subreddit: String = subreddit.into();
        RedditSource {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            subreddit: subreddit_name(&subreddit).to_string(),
        }
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    pub fn listing_query(&self, sort: SortMode, window: Option<&str>) -> ListingQuery {
        let label = match window {
            Some(t) => format!("{}/{}", sort.as_str(), t),
            None => sort.as_str().to_string(),
        };
        let query = ListingQuery::new(
            label,
            format!("{}/r/{}/{}/.json", self.base_url, self.subreddit, sort.as_str()),
        )
        .param("limit", PAGE_LIMIT);
        match window {
            Some(t) => query.param("t", t),
            None => query,
        }
    }

    /// CloudSearch timestamp query for `[range.start, range.end)`; the upstream
    /// range is inclusive so the end is pulled back one second.
    pub fn search_query(&self, range: &DateRange) -> ListingQuery {
        let start_ts = range.start.timestamp();
        let end_ts = (range.end - Duration::seconds(1)).timestamp().max(start_ts);
        ListingQuery::new(
            format!("search {}", range),
            format!("{}/r/{}/search/.json", self.base_url, self.subreddit),
        )
        .param("q", format!("(and timestamp:{}..{})", start_ts, end_ts))
        .param("restrict_sr", "on")
        .param("sort", "new")
        .param("syntax", "cloudsearch")
        .param("limit", PAGE_LIMIT)
    }
}

/// Paginates every time window of `sort` in turn, resetting only the cursor.
pub async fn paginate_sorted(
    paginator: &Paginator<'_, RedditListingParser>,
    source: &RedditSource,
    sort: SortMode,
    collector: &mut Collector<RedditPost>,
) -> StrategyYield {
    let mut produced = StrategyYield::default();
    for window in sort.time_windows() {
        if paginator.fetcher().shutdown().is_triggered() {
            break;
        }
        let report = paginator
            .run(source.listing_query(sort, window), collector, None)
            .await;
        produced.found += report.found;
        produced.accepted += report.accepted;
    }
    info!(
        sort = sort.as_str(),
        found = produced.found,
        accepted = produced.accepted,
        "Sort scrape finished"
    );
    produced
}

/// One sorted listing as a chain member.
pub struct ListingStrategy {
    fetcher: Arc<ResilientFetcher>,
    source: RedditSource,
    sort: SortMode,
}

impl ListingStrategy {
    pub fn new(fetcher: Arc<ResilientFetcher>, source: RedditSource, sort: SortMode) -> Self {
        ListingStrategy {
            fetcher,
            source,
            sort,
        }
    }
}

#[async_trait]
impl Strategy<RedditPost> for ListingStrategy {
    fn name(&self) -> String {
        format!("listing:{}", self.sort.as_str())
    }

    async fn run(&self, collector: &mut Collector<RedditPost>) -> Result<StrategyYield> {
        let parser = RedditListingParser;
        let paginator = Paginator::new(&self.fetcher, &parser);
        Ok(paginate_sorted(&paginator, &self.source, self.sort, collector).await)
    }
}

/// Time-chunked search over the collector's range.
pub struct SearchChunkStrategy {
    fetcher: Arc<ResilientFetcher>,
    source: RedditSource,
    chunk_width: Duration,
    delay_min_secs: f64,
    delay_max_secs: f64,
}

impl SearchChunkStrategy {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        source: RedditSource,
        chunk_width: Duration,
        delay_min_secs: f64,
        delay_max_secs: f64,
    ) -> Self {
        SearchChunkStrategy {
            fetcher,
            source,
            chunk_width,
            delay_min_secs,
            delay_max_secs,
        }
    }
}

#[async_trait]
impl Strategy<RedditPost> for SearchChunkStrategy {
    fn name(&self) -> String {
        "search_chunks".to_string()
    }

    async fn run(&self, collector: &mut Collector<RedditPost>) -> Result<StrategyYield> {
        let parser = RedditListingParser;
        let paginator = Paginator::new(&self.fetcher, &parser);
        let driver = ChunkDriver::new(paginator, self.delay_min_secs, self.delay_max_secs);
        let range = *collector.range();
        let source = &self.source;
        let report = driver
            .chunk_scrape(
                &range,
                self.chunk_width,
                |window| Ok(source.search_query(window)),
                collector,
            )
            .await;
        info!(
            windows = report.windows,
            failed_windows = report.failed_windows,
            accepted = report.accepted,
            "Search chunk scrape finished"
        );
        Ok(StrategyYield {
            found: report.found,
            accepted: report.accepted,
        })
    }
}
