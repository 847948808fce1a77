// --- Market scraper configuration: CLI arguments and the YAML site list ---
use crate::config::{FetchConfig, JsonLayout, OutputFormat, ScrapeConfig};
use crate::data_model::DateRange;
use crate::error::{Result, ScraperError};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Weekly market discount scraper (A101, BIM, SOK)", long_about = None)]
pub struct Args {
    /// Path to a YAML file describing markets, aggregators and direct sites.
    /// Built-in defaults are used when omitted.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Output file
    #[arg(short = 'o', long, default_value = "market_deals.json")]
    pub output: PathBuf,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Checkpoint file, snapshotted while the run is in progress
    #[arg(long, default_value = "market_checkpoint.json")]
    pub checkpoint_file: PathBuf,

    /// Skip deals recorded in the checkpoint by an earlier run. The output
    /// then holds only deals new since that run.
    #[arg(long)]
    pub resume: bool,

    /// Upstream proxy URL (optional)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Min delay between requests (seconds)
    #[arg(long, default_value_t = 2.0)]
    pub delay_min: f64,

    /// Max delay between requests (seconds)
    #[arg(long, default_value_t = 5.0)]
    pub delay_max: f64,

    /// Retries per URL after the first attempt
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout (seconds)
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Log file (written in addition to stdout)
    #[arg(long, default_value = "market_scraper.log")]
    pub log_file: PathBuf,

    /// Optional: Port for the Prometheus metrics HTTP endpoint
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Validate the market configuration and exit
    #[arg(long)]
    pub validate_config: bool,
}

impl Args {
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            delay_min_secs: self.delay_min,
            delay_max_secs: self.delay_max,
            max_retries: self.max_retries,
            timeout_secs: self.timeout,
            proxy: self.proxy.clone(),
            ..FetchConfig::default()
        }
    }

    /// Deals are stamped when scraped, so the range only has to cover this run.
    pub fn scrape_config(&self, now: DateTime<Utc>) -> ScrapeConfig {
        let today = now.date_naive();
        ScrapeConfig {
            range: DateRange::from_days(today, today + Duration::days(1)),
            output_format: self.format,
            json_layout: JsonLayout::WithMetadata {
                records_key: "deals".to_string(),
                total_key: "total_deals".to_string(),
                category_key: "by_market".to_string(),
            },
            output_path: self.output.clone(),
            checkpoint_path: self.checkpoint_file.clone(),
            chunk_width_days: 1,
            checkpoint_every: 50,
            inter_chunk_delay_min_secs: 0.0,
            inter_chunk_delay_max_secs: 0.0,
            resume: self.resume,
        }
    }

    pub fn market_config(&self) -> Result<MarketConfig> {
        match &self.config {
            Some(path) => load_market_config(path),
            None => Ok(MarketConfig::default()),
        }
    }
}

/// Markets to scrape and where to find them.
#[derive(Deserialize, Debug, Clone)]
pub struct MarketConfig {
    pub markets: Vec<String>,
    /// Tried first; a site listing every market.
    pub aggregator: AggregatorConfig,
    /// Fallback, tried in order when the aggregator yields nothing.
    pub direct: Vec<DirectSiteConfig>,
}

impl MarketConfig {
    pub fn validate(&self) -> Result<()> {
        if self.markets.is_empty() {
            return Err(ScraperError::ConfigValidationError(
                "MarketConfig: markets must not be empty".to_string(),
            ));
        }
        self.aggregator.validate()?;
        for site in &self.direct {
            site.validate()?;
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AggregatorConfig {
    pub name: String,
    /// URL with a `{market}` placeholder.
    pub url_pattern: String,
    pub parser: ParserConfig,
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.url_pattern.contains("{market}") {
            return Err(ScraperError::ConfigValidationError(format!(
                "AggregatorConfig '{}': url_pattern must contain '{{market}}'",
                self.name
            )));
        }
        self.parser.validate()
    }

    pub fn url_for(&self, market: &str) -> String {
        self.url_pattern.replace("{market}", market)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct DirectSiteConfig {
    pub market: String,
    pub url: String,
    pub parser: ParserConfig,
}

impl DirectSiteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(ScraperError::ConfigValidationError(format!(
                "DirectSiteConfig '{}': url must not be empty",
                self.market
            )));
        }
        self.parser.validate()
    }
}

/// How product cards are located in a page.
/// Uses Serde's internally tagged enum representation.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ParserConfig {
    CardPattern(CardPatternParams),
    Bim(BimParams),
}

impl ParserConfig {
    pub fn name(&self) -> &'static str {
        match self {
            ParserConfig::CardPattern(_) => "CardPattern",
            ParserConfig::Bim(_) => "Bim",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ParserConfig::CardPattern(params) => params.validate(),
            ParserConfig::Bim(params) => params.validate(),
        }
    }
}

/// Class-name regexes matched case-insensitively against `div`/`article` cards
/// and their title/price descendants.
#[derive(Deserialize, Debug, Clone)]
pub struct CardPatternParams {
    pub card_pattern: String,
    pub title_pattern: String,
    #[serde(default = "default_price_pattern")]
    pub price_pattern: String,
    #[serde(default = "default_max_cards")]
    pub max_cards: usize,
}

fn default_price_pattern() -> String {
    "price|fiyat".to_string()
}

fn default_max_cards() -> usize {
    50
}

impl CardPatternParams {
    pub fn validate(&self) -> Result<()> {
        for (field, pattern) in [
            ("card_pattern", &self.card_pattern),
            ("title_pattern", &self.title_pattern),
            ("price_pattern", &self.price_pattern),
        ] {
            regex::Regex::new(pattern).map_err(|e| {
                ScraperError::ConfigValidationError(format!(
                    "CardPatternParams: {} is not a valid regex: {}",
                    field, e
                ))
            })?;
        }
        if self.max_cards == 0 {
            return Err(ScraperError::ConfigValidationError(
                "CardPatternParams: max_cards must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct BimParams {
    #[serde(default = "default_bim_max_cards")]
    pub max_cards: usize,
}

fn default_bim_max_cards() -> usize {
    100
}

impl BimParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_cards == 0 {
            return Err(ScraperError::ConfigValidationError(
                "BimParams: max_cards must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        let generic = |card: &str, title: &str| {
            ParserConfig::CardPattern(CardPatternParams {
                card_pattern: card.to_string(),
                title_pattern: title.to_string(),
                price_pattern: default_price_pattern(),
                max_cards: default_max_cards(),
            })
        };
        MarketConfig {
            markets: vec!["a101".into(), "bim".into(), "sok".into()],
            aggregator: AggregatorConfig {
                name: "aktuel-urunler.com".to_string(),
                url_pattern: "https://aktuel-urunler.com/{market}-aktuel-urunler/".to_string(),
                parser: generic("product|item|card|aktuel", "title|name|product"),
            },
            direct: vec![
                DirectSiteConfig {
                    market: "sok".to_string(),
                    url: "https://kurumsal.sokmarket.com.tr/haftanin-firsatlari/firsatlar"
                        .to_string(),
                    parser: generic("product|urun|item|firsat", "title|name|baslik"),
                },
                DirectSiteConfig {
                    market: "bim".to_string(),
                    url: "https://www.bim.com.tr/Categories/100/aktuel-urunler.aspx".to_string(),
                    parser: ParserConfig::Bim(BimParams {
                        max_cards: default_bim_max_cards(),
                    }),
                },
                DirectSiteConfig {
                    market: "a101".to_string(),
                    url: "https://www.a101.com.tr/afisler".to_string(),
                    parser: generic("product|urun|item|afis", "title|name|baslik"),
                },
            ],
        }
    }
}

/// Loads and parses the market configuration YAML file.
pub fn load_market_config<P: AsRef<Path>>(config_path: P) -> Result<MarketConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        ScraperError::ConfigError(format!(
            "Failed to read market config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&config_content).map_err(|e| {
        ScraperError::ConfigError(format!(
            "Failed to parse market config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })
}
