// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_histogram, Counter, Histogram};

// Metrics from the Fetcher
pub static FETCH_ATTEMPTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_fetch_attempts_total",
        "Total number of HTTP attempts, retries included."
    )
    .expect("Failed to register FETCH_ATTEMPTS_TOTAL counter")
});

pub static FETCH_SUCCESS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_fetch_success_total",
        "Total number of fetches that ended in a successful response."
    )
    .expect("Failed to register FETCH_SUCCESS_TOTAL counter")
});

pub static FETCH_RATE_LIMITED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_fetch_rate_limited_total",
        "Total number of 429 responses received."
    )
    .expect("Failed to register FETCH_RATE_LIMITED_TOTAL counter")
});

pub static FETCH_BLOCKED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_fetch_blocked_total",
        "Total number of fetches that ended blocked (403)."
    )
    .expect("Failed to register FETCH_BLOCKED_TOTAL counter")
});

pub static FETCH_TRANSIENT_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_fetch_transient_errors_total",
        "Total number of timeouts, network errors and 5xx responses."
    )
    .expect("Failed to register FETCH_TRANSIENT_ERRORS_TOTAL counter")
});

pub static FETCH_FAILED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_fetch_failed_total",
        "Total number of fetches that ended without a payload."
    )
    .expect("Failed to register FETCH_FAILED_TOTAL counter")
});

pub static FETCH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "scraper_fetch_duration_seconds",
        "Histogram of single HTTP attempt latencies."
    )
    .expect("Failed to register FETCH_DURATION_SECONDS histogram")
});

// Metrics from the drivers and the collector
pub static PAGES_FETCHED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_pages_fetched_total",
        "Total number of listing pages parsed."
    )
    .expect("Failed to register PAGES_FETCHED_TOTAL counter")
});

pub static CHUNKS_COMPLETED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_chunks_completed_total",
        "Total number of time windows processed."
    )
    .expect("Failed to register CHUNKS_COMPLETED_TOTAL counter")
});

pub static RECORDS_ACCEPTED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_records_accepted_total",
        "Total number of records accepted into the collection."
    )
    .expect("Failed to register RECORDS_ACCEPTED_TOTAL counter")
});

pub static RECORDS_DUPLICATE_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_records_duplicate_total",
        "Total number of records skipped as already seen."
    )
    .expect("Failed to register RECORDS_DUPLICATE_TOTAL counter")
});

pub static RECORDS_OUT_OF_RANGE_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_records_out_of_range_total",
        "Total number of records skipped for falling outside the date range."
    )
    .expect("Failed to register RECORDS_OUT_OF_RANGE_TOTAL counter")
});

pub static PARSE_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_parse_failures_total",
        "Total number of unparseable items or pages."
    )
    .expect("Failed to register PARSE_FAILURES_TOTAL counter")
});

pub static CHECKPOINT_WRITES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_checkpoint_writes_total",
        "Total number of successful checkpoint writes."
    )
    .expect("Failed to register CHECKPOINT_WRITES_TOTAL counter")
});

pub static CHECKPOINT_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "scraper_checkpoint_errors_total",
        "Total number of failed checkpoint writes."
    )
    .expect("Failed to register CHECKPOINT_ERRORS_TOTAL counter")
});
