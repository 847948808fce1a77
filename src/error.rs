use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, ScraperError>;

/// The Error type for scraping runs.
///
/// Transient network failures, rate limits and blocks are not errors: the
/// fetcher reports them as [`crate::fetch::FetchOutcome`] values so callers can
/// decide whether to skip, stop a window or stop the run.
#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("YAML error: {source}")]
    YamlError {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("CSV error: {source}")]
    CsvError {
        #[from]
        source: csv::Error,
    },

    #[error("HTTP client error: {source}")]
    HttpClientError {
        #[from]
        source: reqwest::Error,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Per-item or per-page; callers skip and keep going.
    #[error("Failed to parse {what}: {reason}")]
    ParseFailure { what: String, reason: String },

    #[error("Failed to persist {what}: {source}")]
    PersistenceFailure {
        what: String,
        source: Box<ScraperError>,
    },

    #[error("Strategy '{strategy}' failed: {source}")]
    StrategyError {
        strategy: String,
        source: Box<ScraperError>,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ScraperError {
    pub fn parse_failure(what: impl Into<String>, reason: impl ToString) -> Self {
        ScraperError::ParseFailure {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(what: impl Into<String>, source: ScraperError) -> Self {
        ScraperError::PersistenceFailure {
            what: what.into(),
            source: Box::new(source),
        }
    }
}
