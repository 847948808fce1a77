// --- Command-Line Arguments for the reddit binary ---
use crate::config::{parse_day, FetchConfig, JsonLayout, OutputFormat, ScrapeConfig};
use crate::data_model::DateRange;
use crate::sources::reddit::{subreddit_name, SortMode};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Subreddit scraper over public JSON listings", long_about = None)]
pub struct Args {
    /// Subreddit name (without r/)
    pub subreddit: String,

    /// First day to keep (YYYY-MM-DD, inclusive)
    #[arg(long, default_value = "2024-01-01", value_parser = parse_day)]
    pub start_date: NaiveDate,

    /// Last day to keep (YYYY-MM-DD, inclusive). Defaults to today.
    #[arg(long, value_parser = parse_day)]
    pub end_date: Option<NaiveDate>,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Output file name. Defaults to <subreddit>_<unix time>.<format>
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

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

    /// Checkpoint file used to resume interrupted runs
    #[arg(long, default_value = "checkpoint.json")]
    pub checkpoint_file: PathBuf,

    /// Accepted posts between checkpoint writes
    #[arg(long, default_value_t = 100)]
    pub checkpoint_every: usize,

    /// Listing sort orders to paginate, in order
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = SortMode::all())]
    pub sorts: Vec<SortMode>,

    /// Also run the time-chunked search strategy
    #[arg(long)]
    pub search_chunks: bool,

    /// Width of each search window in days
    #[arg(long, default_value_t = 7)]
    pub chunk_days: u32,

    /// Log file (written in addition to stdout)
    #[arg(long, default_value = "reddit_scraper.log")]
    pub log_file: PathBuf,

    /// Optional: Port for the Prometheus metrics HTTP endpoint
    #[arg(long)]
    pub metrics_port: Option<u16>,
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

    pub fn scrape_config(&self, now: DateTime<Utc>) -> ScrapeConfig {
        let end_date = self.end_date.unwrap_or_else(|| now.date_naive());
        let output_path = self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}_{}.{}",
                subreddit_name(&self.subreddit),
                now.timestamp(),
                self.format.extension()
            ))
        });
        ScrapeConfig {
            range: DateRange::from_days(self.start_date, end_date),
            output_format: self.format,
            json_layout: JsonLayout::Array,
            output_path,
            checkpoint_path: self.checkpoint_file.clone(),
            chunk_width_days: self.chunk_days,
            checkpoint_every: self.checkpoint_every,
            inter_chunk_delay_min_secs: self.delay_min,
            inter_chunk_delay_max_secs: self.delay_max,
            resume: true,
        }
    }
}
