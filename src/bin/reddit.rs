// src/bin/reddit.rs

//! Subreddit scraper binary.
//!
//! Paginates each requested sort order of a subreddit's public JSON listing
//! (and, with `--search-chunks`, a week-by-week timestamp search), keeps the
//! posts created inside the requested date range, and writes them newest
//! first as JSON or CSV. Progress is checkpointed so an interrupted run can be
//! resumed without re-collecting posts.

use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use ScrapeBlaster::config::reddit::Args;
use ScrapeBlaster::drivers::strategy::{ChainMode, Strategy, StrategyChain};
use ScrapeBlaster::error::Result;
use ScrapeBlaster::fetch::{HeaderProfile, ResilientFetcher};
use ScrapeBlaster::run_logic::run_scrape;
use ScrapeBlaster::sources::reddit::{
    subreddit_name, ListingStrategy, RedditPost, RedditSource, SearchChunkStrategy,
};
use ScrapeBlaster::utils::{create_progress_bar, init_tracing, setup_prometheus_metrics, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(&args.log_file)?;

    if let Err(e) = setup_prometheus_metrics(args.metrics_port).await {
        error!("Failed to start Prometheus metrics endpoint: {}", e);
    }

    let scrape_config = args.scrape_config(Utc::now());
    let fetch_config = args.fetch_config();

    info!("Reddit scraper started.");
    info!("Subreddit: r/{}", subreddit_name(&args.subreddit));
    info!("Date range: {}", scrape_config.range);
    info!("Sorts: {:?}", args.sorts);
    info!("Output File: {}", scrape_config.output_path.display());

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current request");
            trigger.trigger();
        }
    });

    let fetcher = Arc::new(
        ResilientFetcher::from_config(fetch_config, HeaderProfile::Json)?
            .with_shutdown(shutdown.clone()),
    );
    let source = RedditSource::new(&args.subreddit);

    let mut strategies: Vec<Box<dyn Strategy<RedditPost>>> = args
        .sorts
        .iter()
        .map(|sort| {
            Box::new(ListingStrategy::new(fetcher.clone(), source.clone(), *sort))
                as Box<dyn Strategy<RedditPost>>
        })
        .collect();
    if args.search_chunks {
        strategies.push(Box::new(SearchChunkStrategy::new(
            fetcher.clone(),
            source.clone(),
            scrape_config.chunk_width(),
            scrape_config.inter_chunk_delay_min_secs,
            scrape_config.inter_chunk_delay_max_secs,
        )));
    }
    let chain = StrategyChain::new(ChainMode::All, strategies);

    let progress = create_progress_bar(
        0,
        "Scraping posts",
        "{spinner:.green} [{elapsed_precise}] {msg} Posts collected: {pos} ({per_sec})",
    );

    match run_scrape(&chain, &scrape_config, &shutdown, Some(progress)).await {
        Ok(summary) => {
            info!(
                total = summary.total_records,
                elapsed_secs = summary.elapsed_secs,
                "Reddit scrape complete"
            );
            Ok(())
        }
        Err(e) => {
            error!("Reddit scrape failed: {}", e);
            Err(e)
        }
    }
}
