use crate::config::random_delay;
use crate::data_model::DateRange;
use crate::drivers::pagination::{ListingQuery, PageParser, Paginator};
use crate::error::Result;
use crate::storage::Collector;
use crate::utils::prometheus_metrics::CHUNKS_COMPLETED_TOTAL;
use chrono::Duration;
use tracing::{error, info, warn};

/// Splits `full` into consecutive `[start, end)` windows of `width`; the last
/// one is clipped to `full.end`. No empty trailing window is produced, and a
/// non-positive width yields the whole range as a single window.
pub fn split_range(full: &DateRange, width: Duration) -> Vec<DateRange> {
    if full.is_empty() {
        return Vec::new();
    }
    if width <= Duration::zero() {
        return vec![*full];
    }
    let mut windows = Vec::new();
    let mut start = full.start;
    while start < full.end {
        let end = match start.checked_add_signed(width) {
            Some(end) if end < full.end => end,
            _ => full.end,
        };
        windows.push(DateRange::new(start, end));
        start = end;
    }
    windows
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub windows: usize,
    pub failed_windows: usize,
    pub found: usize,
    pub accepted: usize,
}

/// Runs one bounded pagination per time window, strictly in order.
pub struct ChunkDriver<'a, P> {
    paginator: Paginator<'a, P>,
    delay_min_secs: f64,
    delay_max_secs: f64,
}

impl<'a, P: PageParser> ChunkDriver<'a, P> {
    pub fn new(paginator: Paginator<'a, P>, delay_min_secs: f64, delay_max_secs: f64) -> Self {
        ChunkDriver {
            paginator,
            delay_min_secs,
            delay_max_secs,
        }
    }

    fn inter_chunk_delay(&self) -> std::time::Duration {
        random_delay(self.delay_min_secs, self.delay_max_secs)
    }

    /// Items are accepted only inside their own window. Failed windows are
    /// logged and skipped; retries happen per request inside the fetcher.
    pub async fn chunk_scrape<F>(
        &self,
        full_range: &DateRange,
        width: Duration,
        query_for: F,
        collector: &mut Collector<P::Item>,
    ) -> ChunkReport
    where
        F: Fn(&DateRange) -> Result<ListingQuery> + Send + Sync,
    {
        let windows = split_range(full_range, width);
        let shutdown = self.paginator.fetcher().shutdown().clone();
        let mut report = ChunkReport::default();
        let total = windows.len();

        for (index, window) in windows.iter().enumerate() {
            if shutdown.is_triggered() {
                warn!(remaining = total - index, "Shutdown requested, skipping remaining windows");
                break;
            }
            info!(window = %window, index = index + 1, total, "Scraping chunk");
            report.windows += 1;

            match query_for(window) {
                Ok(query) => {
                    let result = self.paginator.run(query, collector, Some(window)).await;
                    report.found += result.found;
                    report.accepted += result.accepted;
                    if result.stop.is_failure() && result.accepted == 0 {
                        report.failed_windows += 1;
                        warn!(window = %window, stop = ?result.stop, "Chunk failed, moving to next window");
                    } else {
                        info!(window = %window, accepted = result.accepted, "Chunk scraped");
                    }
                }
                Err(e) => {
                    report.failed_windows += 1;
                    error!(window = %window, error = %e, "Cannot build chunk query");
                }
            }
            CHUNKS_COMPLETED_TOTAL.inc();

            if index + 1 < total && !shutdown.sleep(self.inter_chunk_delay()).await {
                break;
            }
        }
        report
    }
}
