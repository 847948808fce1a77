use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An extracted item. Created by a parser, never mutated afterwards.
pub trait Record: Serialize + Clone + Send + Sync + 'static {
    /// Stable unique identifier, used for dedupe and resume.
    fn id(&self) -> &str;

    /// Used for range filtering and for the final sort.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Optional grouping key for run summaries (e.g. market name).
    fn category(&self) -> Option<&str> {
        None
    }
}

/// Half-open interval `[start, end)` over UTC timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        DateRange { start, end }
    }

    /// Builds a range from calendar days where `last_day` is inclusive:
    /// the exclusive end is the midnight following it.
    pub fn from_days(first_day: NaiveDate, last_day: NaiveDate) -> Self {
        let start = first_day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let end = (last_day + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        DateRange { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// What the collector did with an offered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accepted,
    Duplicate,
    OutOfRange,
}

/// End-of-run report, logged by the binaries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total_records: usize,
    pub by_strategy: Vec<(String, usize)>,
    pub by_category: BTreeMap<String, usize>,
    pub elapsed_secs: f64,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn tally_categories<R: Record>(&mut self, records: &[R]) {
        self.by_category.clear();
        for record in records {
            if let Some(category) = record.category() {
                *self.by_category.entry(category.to_string()).or_insert(0) += 1;
            }
        }
        self.total_records = records.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_days_includes_whole_last_day() {
        let range = DateRange::from_days(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        let last_minute = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap()
            .and_utc();
        assert!(range.contains(last_minute));
        assert!(!range.contains(range.end));
        assert!(range.contains(range.start));
        assert_eq!(range.duration(), Duration::days(15));
    }
}
