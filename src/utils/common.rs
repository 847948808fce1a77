// src/utils/common.rs
// Shared setup for the scraper binaries: logging, metrics endpoint, progress bars.

use crate::error::{Result, ScraperError};
use axum::{http::StatusCode, routing::get, serve, Router};
use indicatif::{ProgressBar, ProgressStyle};
use prometheus::{gather, Encoder, TextEncoder};
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a stdout layer plus a plain-text layer appending to `log_file`.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. The returned guard
/// must be held until exit so buffered log lines get flushed.
pub fn init_tracing(log_file: &Path) -> Result<WorkerGuard> {
    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = log_file.file_name().ok_or_else(|| {
        ScraperError::ConfigError(format!(
            "Log file path '{}' has no file name",
            log_file.display()
        ))
    })?;
    std::fs::create_dir_all(directory)?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| ScraperError::ConfigError(format!("Failed to install tracing subscriber: {}", e)))?;
    Ok(guard)
}

// Axum handler for /metrics
async fn metrics_handler() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&gather(), &mut buffer) {
        error!("Could not encode prometheus metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not encode prometheus metrics: {}", e),
        );
    }
    match String::from_utf8(buffer) {
        Ok(s) => (StatusCode::OK, s),
        Err(e) => {
            error!("Prometheus metrics UTF-8 error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Prometheus metrics UTF-8 error: {}", e),
            )
        }
    }
}

/// Serves `/metrics` on `0.0.0.0:<port>` in a background task. No-op without a port.
pub async fn setup_prometheus_metrics(metrics_port: Option<u16>) -> Result<()> {
    let Some(port) = metrics_port else {
        info!("Prometheus metrics endpoint not configured (no port specified).");
        return Ok(());
    };
    let app = Router::new().route("/metrics", get(metrics_handler));
    let listener_addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&listener_addr).await?;
    info!(
        "Metrics endpoint will be available at http://{}/metrics",
        listener_addr
    );

    tokio::spawn(async move {
        if let Err(e) = serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });
    Ok(())
}

/// A spinner when `total_items` is 0 (unknown total), a bar otherwise.
pub fn create_progress_bar(total_items: u64, message: &str, template: &str) -> ProgressBar {
    let pb = if total_items == 0 {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::new(total_items)
    };
    pb.set_message(message.to_string());
    pb.set_style(
        ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}
