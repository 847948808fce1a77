use crate::config::{random_delay, FetchConfig};
use crate::error::{Result, ScraperError};
use crate::fetch::headers::{random_headers, HeaderProfile};
use crate::fetch::transport::{ReqwestTransport, Transport, TransportError};
use crate::utils::prometheus_metrics::*;
use crate::utils::shutdown::Shutdown;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of a whole fetch sequence for one URL. Exactly one per `fetch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    /// The server asked for a longer pause than `max_retry_after`.
    RateLimited(Duration),
    /// 403: a durable block, never retried.
    Blocked,
    /// Any other non-retryable status (404, 410, ...).
    Rejected(StatusCode),
    /// Timeouts / network errors / 5xx past the retry cap.
    TransientError,
    /// 429s past the retry cap.
    ExhaustedRetries,
    Cancelled,
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::RateLimited(_) => "rate_limited",
            FetchOutcome::Blocked => "blocked",
            FetchOutcome::Rejected(_) => "rejected",
            FetchOutcome::TransientError => "transient_error",
            FetchOutcome::ExhaustedRetries => "exhausted_retries",
            FetchOutcome::Cancelled => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn into_body(self) -> Option<String> {
        match self {
            FetchOutcome::Success(body) => Some(body),
            _ => None,
        }
    }
}

/// One attempt's request. Rebuilt for every attempt.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    Timeout,
    Network,
    ServerError(StatusCode),
}

/// Structured notification of fetcher progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Attempt {
        url: String,
        attempt: u32,
    },
    Retrying {
        url: String,
        attempt: u32,
        wait: Duration,
        reason: RetryReason,
    },
    Finished {
        url: String,
        attempts: u32,
        outcome: &'static str,
    },
}

enum FailureKind {
    RateLimited,
    Transient,
}

/// HTTP GET with random pre-request delay, rotating headers and bounded retries.
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    config: FetchConfig,
    profile: HeaderProfile,
    shutdown: Shutdown,
    events: Option<mpsc::UnboundedSender<FetchEvent>>,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig, profile: HeaderProfile) -> Self {
        ResilientFetcher {
            transport,
            config,
            profile,
            shutdown: Shutdown::never(),
            events: None,
        }
    }

    /// Fetcher over `reqwest`, honoring `config.proxy`.
    pub fn from_config(config: FetchConfig, profile: HeaderProfile) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.proxy.as_deref())?;
        Ok(Self::new(Arc::new(transport), config, profile))
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_event_channel(mut self, events: mpsc::UnboundedSender<FetchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn parse_url(raw: &str) -> Result<Url> {
        Url::parse(raw).map_err(|e| ScraperError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
    }

    fn emit(&self, event: FetchEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn pre_request_delay(&self) -> Duration {
        random_delay(self.config.delay_min_secs, self.config.delay_max_secs)
    }

    fn finish(&self, url: &Url, attempts: u32, outcome: FetchOutcome) -> FetchOutcome {
        match &outcome {
            FetchOutcome::Success(_) => {
                FETCH_SUCCESS_TOTAL.inc();
                info!(url = %url, attempts, "Fetched");
            }
            FetchOutcome::Blocked => {
                FETCH_BLOCKED_TOTAL.inc();
                FETCH_FAILED_TOTAL.inc();
                warn!(url = %url, attempts, "Blocked (403), not retrying");
            }
            FetchOutcome::Cancelled => {
                debug!(url = %url, attempts, "Fetch cancelled by shutdown");
            }
            other => {
                FETCH_FAILED_TOTAL.inc();
                warn!(url = %url, attempts, outcome = other.label(), "Fetch failed");
            }
        }
        self.emit(FetchEvent::Finished {
            url: url.to_string(),
            attempts,
            outcome: outcome.label(),
        });
        outcome
    }

    /// Runs the bounded retry loop for `url`. Never returns an error:
    /// terminal conditions are reported as outcomes.
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        let mut attempt: u32 = 0;
        loop {
            if !self.shutdown.sleep(self.pre_request_delay()).await {
                return self.finish(url, attempt, FetchOutcome::Cancelled);
            }

            let request = FetchRequest {
                url: url.clone(),
                headers: random_headers(self.profile),
                timeout: self.config.timeout(),
                attempt,
            };
            self.emit(FetchEvent::Attempt {
                url: url.to_string(),
                attempt,
            });
            debug!(url = %request.url, attempt, "Sending request");
            FETCH_ATTEMPTS_TOTAL.inc();
            let timer = FETCH_DURATION_SECONDS.start_timer();
            let result = self
                .transport
                .get(&request.url, request.headers, request.timeout)
                .await;
            timer.observe_duration();

            let (wait, kind, reason) = match result {
                Ok(response) if response.status.is_success() => {
                    return self.finish(url, attempt + 1, FetchOutcome::Success(response.body));
                }
                Ok(response) if response.status == StatusCode::FORBIDDEN => {
                    return self.finish(url, attempt + 1, FetchOutcome::Blocked);
                }
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    FETCH_RATE_LIMITED_TOTAL.inc();
                    let hint = response
                        .retry_after
                        .as_deref()
                        .and_then(|value| parse_retry_after(value, Utc::now()));
                    if let Some(hint) = hint {
                        if hint > self.config.max_retry_after() {
                            return self.finish(
                                url,
                                attempt + 1,
                                FetchOutcome::RateLimited(hint),
                            );
                        }
                    }
                    let wait = hint.unwrap_or(self.config.rate_limit_backoff() * (attempt + 1));
                    (wait, FailureKind::RateLimited, RetryReason::RateLimited)
                }
                Ok(response) if response.status.is_server_error() => {
                    FETCH_TRANSIENT_ERRORS_TOTAL.inc();
                    (
                        self.config.transient_backoff() * (attempt + 1),
                        FailureKind::Transient,
                        RetryReason::ServerError(response.status),
                    )
                }
                Ok(response) => {
                    return self.finish(url, attempt + 1, FetchOutcome::Rejected(response.status));
                }
                Err(err) => {
                    FETCH_TRANSIENT_ERRORS_TOTAL.inc();
                    let reason = match err {
                        TransportError::Timeout => RetryReason::Timeout,
                        TransportError::Network(_) => RetryReason::Network,
                    };
                    warn!(url = %url, attempt, error = %err, "Request failed");
                    (
                        self.config.transient_backoff() * (attempt + 1),
                        FailureKind::Transient,
                        reason,
                    )
                }
            };

            if attempt >= self.config.max_retries {
                let outcome = match kind {
                    FailureKind::RateLimited => FetchOutcome::ExhaustedRetries,
                    FailureKind::Transient => FetchOutcome::TransientError,
                };
                return self.finish(url, attempt + 1, outcome);
            }

            warn!(
                url = %url,
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                wait_secs = wait.as_secs_f64(),
                reason = ?reason,
                "Retrying"
            );
            self.emit(FetchEvent::Retrying {
                url: url.to_string(),
                attempt,
                wait,
                reason,
            });
            if !self.shutdown.sleep(wait).await {
                return self.finish(url, attempt + 1, FetchOutcome::Cancelled);
            }
            attempt += 1;
        }
    }
}

/// Parses a Retry-After value: delta-seconds or an HTTP date.
/// Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
