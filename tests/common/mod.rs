// Shared helpers for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ScrapeBlaster::config::FetchConfig;
use ScrapeBlaster::data_model::Record;
use ScrapeBlaster::fetch::{HeaderProfile, RawResponse, ResilientFetcher, Transport, TransportError};

pub type Scripted = std::result::Result<RawResponse, TransportError>;

/// In-memory transport. Fixed routes (matched by URL prefix) win over the
/// queue; an exhausted queue answers 404.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Scripted>>,
    routes: Mutex<Vec<(String, Scripted)>>,
    requests: Mutex<Vec<(String, HeaderMap)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(script: Vec<Scripted>) -> Arc<Self> {
        let transport = Self::default();
        transport.queue.lock().unwrap().extend(script);
        Arc::new(transport)
    }

    pub fn route(&self, url_prefix: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .push((url_prefix.to_string(), response));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn headers(&self) -> Vec<HeaderMap> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, headers)| headers.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url, headers: HeaderMap, _timeout: Duration) -> Scripted {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers));
        let routed = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| url.as_str().starts_with(prefix.as_str()))
            .map(|(_, response)| response.clone());
        if let Some(response) = routed {
            return response;
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(StatusCode::NOT_FOUND, "")))
    }
}

pub fn ok(body: impl Into<String>) -> Scripted {
    Ok(RawResponse::new(StatusCode::OK, body))
}

pub fn status(code: u16) -> Scripted {
    Ok(RawResponse::new(StatusCode::from_u16(code).unwrap(), ""))
}

pub fn rate_limited(retry_after: Option<&str>) -> Scripted {
    let response = RawResponse::new(StatusCode::TOO_MANY_REQUESTS, "");
    Ok(match retry_after {
        Some(value) => response.with_retry_after(value),
        None => response,
    })
}

pub fn timeout() -> Scripted {
    Err(TransportError::Timeout)
}

/// A fetcher with no pre-request delay, default backoffs.
pub fn fetcher_over(transport: Arc<ScriptedTransport>, max_retries: u32) -> ResilientFetcher {
    let config = FetchConfig {
        max_retries,
        ..FetchConfig::immediate()
    };
    ResilientFetcher::new(transport, config, HeaderProfile::Json)
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Reddit-shaped listing payload.
pub fn listing(posts: &[(&str, i64)], after: Option<&str>) -> String {
    let children: Vec<_> = posts
        .iter()
        .map(|(id, created)| {
            json!({
                "kind": "t3",
                "data": {
                    "id": id,
                    "title": format!("Post {}", id),
                    "author": "someone",
                    "score": 10,
                    "upvote_ratio": 0.9,
                    "num_comments": 2,
                    "created_utc": *created as f64,
                    "url": format!("https://example.com/{}", id),
                    "permalink": format!("/r/rust/comments/{}/", id),
                    "selftext": "",
                    "is_self": true,
                    "link_flair_text": null,
                    "over_18": false,
                    "spoiler": false,
                    "stickied": false
                }
            })
        })
        .collect();
    json!({ "kind": "Listing", "data": { "children": children, "after": after } }).to_string()
}

/// Minimal record for driver-level tests.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TestRecord {
    pub id: String,
    pub at: DateTime<Utc>,
}

impl TestRecord {
    pub fn new(id: &str, secs: i64) -> Self {
        TestRecord {
            id: id.to_string(),
            at: ts(secs),
        }
    }
}

impl Record for TestRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }
}
