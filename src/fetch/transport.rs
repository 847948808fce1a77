use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Proxy, StatusCode, Url};
use std::fmt;
use std::time::Duration;

/// Status, Retry-After hint and (for successes) the body of one HTTP attempt.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub retry_after: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        RawResponse {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }
}

/// Failure below the HTTP layer. Both kinds are retried by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Network(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Network(msg) => write!(f, "network error: {}", msg),
        }
    }
}

/// One HTTP GET. Implementations must not retry or sleep on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        headers: HeaderMap,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// Production transport over a pooled `reqwest::Client`.
pub struct ReqwestTransport {
    client: Client,
}

const MAX_IDLE_PER_HOST: usize = 5;

impl ReqwestTransport {
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .connect_timeout(Duration::from_secs(10));
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(Proxy::all(proxy_url)?);
        }
        Ok(ReqwestTransport {
            client: builder.build()?,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &Url,
        headers: HeaderMap,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        // Error bodies are never used.
        let body = if status.is_success() {
            response.text().await.map_err(map_reqwest_error)?
        } else {
            String::new()
        };

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}
