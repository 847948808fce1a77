use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, DNT,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

/// Real browser fingerprints rotated per attempt.
pub const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/120.0.0.0 Safari/537.36",
];

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json";

const HTML_LANGUAGES: [&str; 2] = [
    "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7",
    "tr,en-US;q=0.8,en;q=0.6",
];
const JSON_LANGUAGES: [&str; 2] = ["en-US,en;q=0.9", "en-GB,en;q=0.8"];

/// What kind of payload the caller expects back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    Html,
    Json,
}

/// Builds a fresh header set. Accept-Encoding is left to the HTTP client.
pub fn random_headers(profile: HeaderProfile) -> HeaderMap {
    let mut rng = rand::thread_rng();
    let (accept, languages) = match profile {
        HeaderProfile::Html => (HTML_ACCEPT, &HTML_LANGUAGES),
        HeaderProfile::Json => (JSON_ACCEPT, &JSON_LANGUAGES),
    };

    let mut headers = HeaderMap::new();
    let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
    let language = languages.choose(&mut rng).copied().unwrap_or(languages[0]);
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(language));
    headers.insert(DNT, HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    if profile == HeaderProfile::Html {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    }
    headers
}
