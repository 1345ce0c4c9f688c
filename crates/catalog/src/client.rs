use std::{
    borrow::Cow,
    time::{Duration, Instant},
};

use {
    bytes::Bytes,
    reqwest::{
        Method, StatusCode,
        header::{self, HeaderMap},
    },
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    tracing::{debug, info, warn},
};

use crate::{
    Result,
    error::{Context, Error},
};

/// How many bytes of a failed response body end up in the log.
const LOGGED_BODY_LIMIT: usize = 512;

/// Bounds on retrying rate-limited (429) requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total sends of one request, the first one included.
    pub max_attempts: u32,
    /// Give up instead of sleeping past this much total waiting.
    pub max_elapsed: Duration,
    /// Wait used when `Retry-After` is missing or unparsable.
    pub fallback_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&digger_config::RetryConfig::default())
    }
}

impl From<&digger_config::RetryConfig> for RetryPolicy {
    fn from(cfg: &digger_config::RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            max_elapsed: Duration::from_secs(cfg.max_elapsed_secs),
            fallback_delay: Duration::from_millis(cfg.fallback_delay_ms),
        }
    }
}

/// One API call: path relative to the base URL, method, query and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub path: String,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .with_context(|| format!("failed to decode {} response body", self.status))
    }
}

/// Authenticated client for the catalog API.
///
/// The bearer token is fixed at construction; build a new client after a
/// token refresh.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Secret<String>,
    retry: RetryPolicy,
    market: String,
    batch_size: usize,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("retry", &self.retry)
            .field("market", &self.market)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Secret<String>) -> Self {
        let defaults = digger_config::ApiConfig::default();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            retry: RetryPolicy::default(),
            market: defaults.market,
            batch_size: defaults.batch_size,
        }
    }

    pub fn from_config(config: &digger_config::ApiConfig, token: Secret<String>) -> Self {
        Self::new(config.base_url.clone(), token)
            .with_retry_policy(RetryPolicy::from(&config.retry))
            .with_market(config.market.clone())
            .with_batch_size(config.batch_size)
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    /// Ids per library write, clamped to what the API accepts.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, digger_config::schema::MAX_BATCH_SIZE);
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Send `req`, retrying while the API answers 429.
    ///
    /// Non-2xx responses are logged and returned, not turned into errors;
    /// only transport failures produce `Err`. Once the retry budget is spent
    /// the last 429 response is returned.
    pub async fn request(&self, req: &ApiRequest) -> Result<ApiResponse> {
        let started = Instant::now();
        let mut waited = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let resp = self.send_once(req).await?;

            if resp.status == StatusCode::TOO_MANY_REQUESTS {
                let delay = retry_after(&resp.headers).unwrap_or(self.retry.fallback_delay);
                if attempt >= self.retry.max_attempts
                    || started.elapsed() + delay > self.retry.max_elapsed
                {
                    warn!(
                        path = %req.path,
                        attempt,
                        waited_ms = waited.as_millis() as u64,
                        "rate limit retry budget exhausted"
                    );
                    return Ok(resp);
                }
                info!(
                    path = %req.path,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, retrying"
                );
                tokio::time::sleep(delay).await;
                waited += delay;
                continue;
            }

            if !resp.is_success() {
                warn!(
                    method = %req.method,
                    path = %req.path,
                    status = resp.status.as_u16(),
                    reason = resp.status.canonical_reason().unwrap_or("unknown"),
                    body = %truncate(&resp.text(), LOGGED_BODY_LIMIT),
                    "catalog request failed"
                );
            }
            return Ok(resp);
        }
    }

    async fn send_once(&self, req: &ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, req.path);
        debug!(method = %req.method, url = %url, "catalog request");

        let mut builder = self
            .http
            .request(req.method.clone(), &url)
            .bearer_auth(self.token.expose_secret())
            .query(&req.query);
        if let Some(body) = &req.body {
            builder = builder.json(body);
        } else if req.method == Method::PUT || req.method == Method::POST {
            builder = builder.header(header::CONTENT_LENGTH, 0);
        }

        let resp = builder.send().await.map_err(Error::from)?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Parse `Retry-After` as delta-seconds.
///
/// HTTP-date values are not used by the catalog API for 429 and fall back to
/// the policy default.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(header::RETRY_AFTER)?;
    let seconds = value.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
