use crate::config::{JsonLayout, ScrapeConfig};
use crate::data_model::{Record, RunSummary};
use crate::drivers::strategy::StrategyChain;
use crate::error::{Result, ScraperError};
use crate::output::{write_output, write_report};
use crate::storage::{CheckpointStore, Collector};
use crate::utils::shutdown::Shutdown;
use chrono::Utc;
use indicatif::ProgressBar;
use serde_json::json;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs `chain` (resuming from the checkpoint when configured), then persists everything.
pub async fn run_scrape<R: Record>(
    chain: &StrategyChain<R>,
    config: &ScrapeConfig,
    shutdown: &Shutdown,
    progress: Option<ProgressBar>,
) -> Result<RunSummary> {
    config.validate()?;
    let started = Instant::now();
    let store = CheckpointStore::new(&config.checkpoint_path);
    let mut collector = if config.resume {
        Collector::resume(config.range, store, config.checkpoint_every).await
    } else {
        Collector::persisted(config.range, store, config.checkpoint_every)
    };
    if let Some(progress) = progress.clone() {
        collector = collector.with_progress(progress);
    }
    info!(range = %config.range, strategies = chain.len(), "Starting scrape");

    let by_strategy = chain.run(&mut collector, shutdown).await;
    if let Some(progress) = &progress {
        progress.finish_with_message(format!("Collected {} records", collector.len()));
    }
    finalize_run(collector, config, by_strategy, started, shutdown.is_triggered()).await
}

/// Final checkpoint first, then the output document. A checkpoint failure is
/// logged; an output failure fails the run with the checkpoint left in place.
pub async fn finalize_run<R: Record>(
    mut collector: Collector<R>,
    config: &ScrapeConfig,
    by_strategy: Vec<(String, usize)>,
    started: Instant,
    interrupted: bool,
) -> Result<RunSummary> {
    if interrupted {
        warn!("Run interrupted, saving what was collected so far");
    }
    if let Err(e) = collector.checkpoint().await {
        error!(error = %e, "Final checkpoint save failed");
    }

    let mut records = collector.into_records();
    let mut summary = RunSummary {
        by_strategy,
        elapsed_secs: started.elapsed().as_secs_f64(),
        interrupted,
        ..RunSummary::default()
    };
    summary.tally_categories(&records);

    let written = match &config.json_layout {
        JsonLayout::Array => write_output(&config.output_path, config.output_format, &mut records),
        JsonLayout::WithMetadata {
            records_key,
            total_key,
            category_key,
        } => {
            let metadata = run_metadata(&summary, total_key, category_key);
            write_report(
                &config.output_path,
                config.output_format,
                &mut records,
                records_key,
                &metadata,
            )
        }
    };
    if let Err(e) = written {
        error!(path = %config.output_path.display(), error = %e, "Failed to write output");
        return Err(ScraperError::persistence(
            format!("output '{}'", config.output_path.display()),
            e,
        ));
    }

    log_summary(&summary, config);
    Ok(summary)
}

fn run_metadata(summary: &RunSummary, total_key: &str, category_key: &str) -> serde_json::Value {
    let mut metadata = serde_json::Map::new();
    metadata.insert(total_key.to_string(), json!(summary.total_records));
    metadata.insert(category_key.to_string(), json!(summary.by_category));
    metadata.insert("scraped_at".to_string(), json!(Utc::now().to_rfc3339()));
    metadata.insert(
        "duration_seconds".to_string(),
        json!((summary.elapsed_secs * 100.0).round() / 100.0),
    );
    serde_json::Value::Object(metadata)
}

fn log_summary(summary: &RunSummary, config: &ScrapeConfig) {
    info!("--------------------");
    info!("Scrape Summary:");
    info!("  Total records: {}", summary.total_records);
    for (strategy, count) in &summary.by_strategy {
        info!("    - {}: {}", strategy, count);
    }
    for (category, count) in &summary.by_category {
        info!("    - {}: {}", category, count);
    }
    info!("  Duration: {:.2}s", summary.elapsed_secs);
    info!("  Output File: {}", config.output_path.display());
    info!("  Checkpoint File: {}", config.checkpoint_path.display());
    if summary.interrupted {
        info!("  (Interrupted before all strategies finished.)");
    }
    info!("--------------------");
}
