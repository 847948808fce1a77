// src/config.rs
use crate::data_model::DateRange;
use crate::error::{Result, ScraperError};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod market;
pub mod reddit;

/// Output document format for the final record collection.
#[derive(clap::ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

/// Shape of a JSON output document. CSV output ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JsonLayout {
    /// A bare array of records.
    #[default]
    Array,
    /// `{"metadata": {..}, "<records_key>": [..]}`. The metadata block holds
    /// the record total under `total_key`, per-category counts under
    /// `category_key`, `scraped_at` and `duration_seconds`.
    WithMetadata {
        records_key: String,
        total_key: String,
        category_key: String,
    },
}

// --- Fetcher Configuration ---

/// Knobs for [`crate::fetch::ResilientFetcher`]. Passed at construction, never global.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub delay_min_secs: f64,
    pub delay_max_secs: f64,
    /// Retries after the first attempt. 403 never consumes one.
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Fallback wait on 429 without a usable Retry-After, multiplied by attempt+1.
    pub rate_limit_backoff_secs: u64,
    /// Wait after a timeout / network error / 5xx, multiplied by attempt+1.
    pub transient_backoff_secs: u64,
    /// Retry-After hints above this are returned as `RateLimited` instead of slept.
    pub max_retry_after_secs: u64,
    pub proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            delay_min_secs: 2.0,
            delay_max_secs: 5.0,
            max_retries: 3,
            timeout_secs: 30,
            rate_limit_backoff_secs: 10,
            transient_backoff_secs: 10,
            max_retry_after_secs: 300,
            proxy: None,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<()> {
        validate_delay_range(
            "FetchConfig",
            ("delay_min_secs", self.delay_min_secs),
            ("delay_max_secs", self.delay_max_secs),
        )?;
        if self.timeout_secs == 0 {
            return Err(ScraperError::ConfigValidationError(
                "FetchConfig: timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.trim().is_empty() {
                return Err(ScraperError::ConfigValidationError(
                    "FetchConfig: proxy must not be empty when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_secs(self.transient_backoff_secs)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }

    /// A config with no waits at all, for tests and dry runs.
    pub fn immediate() -> Self {
        FetchConfig {
            delay_min_secs: 0.0,
            delay_max_secs: 0.0,
            ..FetchConfig::default()
        }
    }
}

// --- Run Configuration ---

/// Everything a run needs besides the fetcher: range, chunking, persistence.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub range: DateRange,
    pub output_format: OutputFormat,
    pub json_layout: JsonLayout,
    pub output_path: PathBuf,
    pub checkpoint_path: PathBuf,
    pub chunk_width_days: u32,
    /// Accepted records between two checkpoint writes.
    pub checkpoint_every: usize,
    pub inter_chunk_delay_min_secs: f64,
    pub inter_chunk_delay_max_secs: f64,
    /// Seed dedupe from the checkpoint's ids. When false the checkpoint is
    /// still written but a previous run's ids are ignored.
    pub resume: bool,
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.range.is_empty() {
            return Err(ScraperError::ConfigValidationError(format!(
                "ScrapeConfig: date range {} is empty or inverted",
                self.range
            )));
        }
        if self.chunk_width_days == 0 {
            return Err(ScraperError::ConfigValidationError(
                "ScrapeConfig: chunk_width_days must be greater than 0".to_string(),
            ));
        }
        if self.checkpoint_every == 0 {
            return Err(ScraperError::ConfigValidationError(
                "ScrapeConfig: checkpoint_every must be greater than 0".to_string(),
            ));
        }
        validate_delay_range(
            "ScrapeConfig",
            ("inter_chunk_delay_min_secs", self.inter_chunk_delay_min_secs),
            ("inter_chunk_delay_max_secs", self.inter_chunk_delay_max_secs),
        )
    }

    pub fn chunk_width(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.chunk_width_days))
    }
}

/// Upper bound for any configured delay, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Both ends finite, within `[0, MAX_DELAY_SECS]`, and `min <= max`.
fn validate_delay_range(owner: &str, min: (&str, f64), max: (&str, f64)) -> Result<()> {
    for (name, value) in [min, max] {
        if !value.is_finite() || !(0.0..=MAX_DELAY_SECS).contains(&value) {
            return Err(ScraperError::ConfigValidationError(format!(
                "{}: {} ({}) must be a finite number between 0 and {}",
                owner, name, value, MAX_DELAY_SECS
            )));
        }
    }
    if min.1 > max.1 {
        return Err(ScraperError::ConfigValidationError(format!(
            "{}: {} ({}) must not exceed {} ({})",
            owner, min.0, min.1, max.0, max.1
        )));
    }
    Ok(())
}

/// A uniform random delay in `[min, max]` seconds. Bounds are clamped to
/// `[0, MAX_DELAY_SECS]`; non-finite values count as zero.
pub fn random_delay(min: f64, max: f64) -> Duration {
    let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, MAX_DELAY_SECS) } else { 0.0 };
    let (min, max) = (clamp(min), clamp(max));
    let secs = if min >= max {
        min
    } else {
        rand::thread_rng().gen_range(min..=max)
    };
    Duration::from_secs_f64(secs)
}

/// `YYYY-MM-DD` parser used by the CLI arguments.
pub fn parse_day(value: &str) -> std::result::Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fetch_config_is_valid() {
        assert!(FetchConfig::default().validate().is_ok());
        assert!(FetchConfig::immediate().validate().is_ok());
    }

    #[test]
    fn inverted_delays_are_rejected() {
        let config = FetchConfig {
            delay_min_secs: 6.0,
            delay_max_secs: 2.0,
            ..FetchConfig::default()
        };
        match config.validate() {
            Err(ScraperError::ConfigValidationError(msg)) => {
                assert!(msg.contains("delay_min_secs"))
            }
            other => panic!("Expected ConfigValidationError, got {:?}", other),
        }
    }

    #[test]
    fn non_finite_and_huge_delays_are_rejected() {
        for bad in [f64::INFINITY, f64::NAN, 1e20, -1.0] {
            let config = FetchConfig {
                delay_max_secs: bad,
                ..FetchConfig::default()
            };
            match config.validate() {
                Err(ScraperError::ConfigValidationError(msg)) => {
                    assert!(msg.contains("delay_max_secs"), "{}", msg)
                }
                other => panic!("Expected ConfigValidationError for {}, got {:?}", bad, other),
            }
        }
        let config = FetchConfig {
            delay_min_secs: f64::NAN,
            ..FetchConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn inter_chunk_delays_are_bounded() {
        let base = ScrapeConfig {
            range: DateRange::from_days(
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            ),
            output_format: OutputFormat::Json,
            json_layout: JsonLayout::Array,
            output_path: PathBuf::from("out.json"),
            checkpoint_path: PathBuf::from("checkpoint.json"),
            chunk_width_days: 7,
            checkpoint_every: 10,
            inter_chunk_delay_min_secs: 1.0,
            inter_chunk_delay_max_secs: 2.0,
            resume: true,
        };
        assert!(base.validate().is_ok());

        let infinite = ScrapeConfig {
            inter_chunk_delay_max_secs: f64::INFINITY,
            ..base.clone()
        };
        assert!(matches!(
            infinite.validate(),
            Err(ScraperError::ConfigValidationError(msg)) if msg.contains("inter_chunk_delay_max_secs")
        ));

        let huge = ScrapeConfig {
            inter_chunk_delay_min_secs: 1e20,
            inter_chunk_delay_max_secs: 1e20,
            ..base.clone()
        };
        assert!(huge.validate().is_err());

        let inverted = ScrapeConfig {
            inter_chunk_delay_min_secs: 3.0,
            ..base
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn random_delay_never_panics_on_bad_bounds() {
        assert_eq!(random_delay(f64::NAN, f64::INFINITY), Duration::ZERO);
        assert_eq!(random_delay(5.0, 1.0), Duration::from_secs(5));
        assert_eq!(random_delay(1e20, 1e20), Duration::from_secs_f64(MAX_DELAY_SECS));
        let sampled = random_delay(1.0, 2.0);
        assert!(sampled >= Duration::from_secs(1) && sampled <= Duration::from_secs(2));
    }

    #[test]
    fn parse_day_rejects_garbage() {
        assert!(parse_day("2024-02-30").is_err());
        assert!(parse_day("yesterday").is_err());
        assert_eq!(
            parse_day("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }
}
