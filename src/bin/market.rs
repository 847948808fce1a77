// src/bin/market.rs

//! Weekly market deals scraper binary.
//!
//! Tries the aggregator site for every configured market first; only when
//! that yields nothing at all are the markets' own sites scraped directly.

use chrono::Utc;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use ScrapeBlaster::config::market::Args;
use ScrapeBlaster::drivers::strategy::{ChainMode, Strategy, StrategyChain};
use ScrapeBlaster::error::Result;
use ScrapeBlaster::fetch::{HeaderProfile, ResilientFetcher};
use ScrapeBlaster::run_logic::run_scrape;
use ScrapeBlaster::sources::market::{AggregatorStrategy, Deal, DirectStrategy};
use ScrapeBlaster::utils::{create_progress_bar, init_tracing, setup_prometheus_metrics, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(&args.log_file)?;

    let market_config = args.market_config()?;
    market_config.validate()?;
    if args.validate_config {
        info!(
            markets = market_config.markets.len(),
            direct_sites = market_config.direct.len(),
            "Market configuration is valid"
        );
        return Ok(());
    }

    if let Err(e) = setup_prometheus_metrics(args.metrics_port).await {
        error!("Failed to start Prometheus metrics endpoint: {}", e);
    }

    let scrape_config = args.scrape_config(Utc::now());
    info!("Market scraper started.");
    info!("Markets: {}", market_config.markets.join(", "));
    info!("Output File: {}", scrape_config.output_path.display());

    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current request");
            trigger.trigger();
        }
    });

    let fetcher = Arc::new(
        ResilientFetcher::from_config(args.fetch_config(), HeaderProfile::Html)?
            .with_shutdown(shutdown.clone()),
    );
    let strategies: Vec<Box<dyn Strategy<Deal>>> = vec![
        Box::new(AggregatorStrategy::new(
            fetcher.clone(),
            market_config.aggregator.clone(),
            market_config.markets.clone(),
        )?),
        Box::new(DirectStrategy::new(fetcher.clone(), market_config.direct.clone())?),
    ];
    let chain = StrategyChain::new(ChainMode::FirstNonEmpty, strategies);

    let progress = create_progress_bar(
        0,
        "Scraping deals",
        "{spinner:.green} [{elapsed_precise}] {msg} Deals collected: {pos}",
    );

    match run_scrape(&chain, &scrape_config, &shutdown, Some(progress)).await {
        Ok(summary) => {
            for (market, count) in &summary.by_category {
                info!(market = %market, deals = count, "Market total");
            }
            Ok(())
        }
        Err(e) => {
            error!("Market scrape failed: {}", e);
            Err(e)
        }
    }
}
