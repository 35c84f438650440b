use std::sync::Arc;
use std::time::{Duration, Instant};

use ontoscope_core::config::HttpConfig;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Result, SourceError};

const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

// ─── RetryPolicy ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&HttpConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(http: &HttpConfig) -> Self {
        Self {
            max_retries: http.max_retries,
            base_delay: Duration::from_millis(http.base_delay_ms),
            max_delay: Duration::from_millis(http.max_delay_ms),
        }
    }

    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn cap(&self, wait: Duration) -> Duration {
        wait.min(self.max_delay)
    }
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    retry: RetryPolicy,
}

impl RateLimitedClient {
    pub fn new(
        min_interval: Duration,
        retry: RetryPolicy,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            retry,
        })
    }

    /// Client for one provider: the spacing is the larger of the global floor
    /// and the provider's own page delay.
    pub fn from_config(http: &HttpConfig, page_delay_ms: u64) -> Result<Self> {
        let min_interval = Duration::from_millis(http.min_interval_ms.max(page_delay_ms));
        Self::new(
            min_interval,
            RetryPolicy::from_config(http),
            &http.user_agent,
            Duration::from_secs(http.timeout_secs),
        )
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            debug!(url, attempt, "GET");
            let resp = self.client.get(url).headers(headers.clone()).send().await;

            let wait = match resp {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = retry_after(r.headers())
                        .unwrap_or_else(|| self.retry.backoff(attempt));
                    if attempt >= self.retry.max_retries {
                        return Err(SourceError::RateLimit(host_of(url), wait.as_secs()));
                    }
                    self.retry.cap(wait)
                }
                Ok(r) if r.status() == StatusCode::FORBIDDEN && quota_exhausted(r.headers()) => {
                    let wait = until_reset(r.headers())
                        .unwrap_or_else(|| self.retry.backoff(attempt));
                    if attempt >= self.retry.max_retries {
                        return Err(SourceError::RateLimit(host_of(url), wait.as_secs()));
                    }
                    self.retry.cap(wait)
                }
                Ok(r) if r.status().is_server_error() => {
                    if attempt >= self.retry.max_retries {
                        return Err(api_error(url, r).await);
                    }
                    self.retry.backoff(attempt)
                }
                Ok(r) if !r.status().is_success() => return Err(api_error(url, r).await),
                Ok(r) => return r.text().await.map_err(SourceError::Http),
                Err(e) => {
                    if attempt >= self.retry.max_retries {
                        return Err(SourceError::Http(e));
                    }
                    debug!(error = %e, "transport error");
                    self.retry.backoff(attempt)
                }
            };

            attempt += 1;
            warn!(
                url,
                attempt,
                max_retries = self.retry.max_retries,
                wait_ms = wait.as_millis() as u64,
                "request failed, retrying"
            );
            sleep(wait).await;
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get_json_with_headers(url, HeaderMap::new()).await
    }

    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<T> {
        let text = self.get_with_headers(url, headers).await?;
        serde_json::from_str(&text).map_err(|e| SourceError::Parse(format!("{url}: {e}")))
    }
}

async fn api_error(url: &str, resp: reqwest::Response) -> SourceError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let body: String = body.chars().take(300).collect();
    SourceError::Api(url.to_string(), format!("HTTP {status}: {body}"))
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    header_u64(headers, RETRY_AFTER.as_str()).map(Duration::from_secs)
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    header_u64(headers, RATELIMIT_REMAINING) == Some(0)
}

/// Seconds until the epoch timestamp in `x-ratelimit-reset`, plus one.
fn until_reset(headers: &HeaderMap) -> Option<Duration> {
    let reset = i64::try_from(header_u64(headers, RATELIMIT_RESET)?).ok()?;
    let now = chrono::Utc::now().timestamp();
    let secs = u64::try_from(reset.saturating_sub(now)).unwrap_or(0) + 1;
    Some(Duration::from_secs(secs))
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
