//! The shared `reqwest` wrapper every catalog adapter and the Download
//! Manager sends requests through: tracks each catalog's rate-limit headers
//! to throttle before a 429 happens, and guards every request behind the
//! target host's circuit breaker (§2a, §4.8).

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::network::circuit_breaker::CircuitBreaker;
use reqwest::{header, Client, Response, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Rate limit state extracted from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    /// Remaining requests allowed.
    pub remaining: Option<u64>,
    /// Total request limit.
    pub limit: Option<u64>,
    /// Unix timestamp when the rate limit resets.
    pub reset: Option<u64>,
}

impl RateLimitState {
    /// Check if we should throttle requests.
    pub fn should_throttle(&self) -> bool {
        match (self.remaining, self.limit) {
            (Some(remaining), Some(limit)) if limit > 0 => {
                // Throttle when below 10% of limit
                let threshold = (limit as f64 * 0.1) as u64;
                remaining < threshold.max(1)
            }
            _ => false,
        }
    }

    /// Get time until rate limit resets.
    pub fn time_until_reset(&self) -> Option<Duration> {
        self.reset.and_then(|reset| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs();
            if reset > now {
                Some(Duration::from_secs(reset - now))
            } else {
                None
            }
        })
    }
}

/// HTTP client with rate limiting awareness.
pub struct HttpClient {
    client: Client,
    /// Rate limit state (shared for thread safety).
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    rate_limit_reset: AtomicU64,
    /// Default timeout for requests.
    default_timeout: Duration,
    /// Throttle delay when rate limited.
    throttle_delay: Duration,
    /// One circuit breaker per host, created lazily on first request.
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::READ_TIMEOUT)
    }

    /// Create a new HTTP client with a custom default timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .timeout(timeout)
            .user_agent(concat!("resolver-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::TransientFailure {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            client,
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            rate_limit_reset: AtomicU64::new(0),
            default_timeout: timeout,
            throttle_delay: Duration::from_millis(500),
            breakers: Mutex::new(HashMap::new()),
        })
    }

    /// Get or create the circuit breaker for `host`.
    fn breaker_for(&self, host: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(host.to_string())))
            .clone()
    }

    /// Get a reference to the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the current rate limit state.
    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        RateLimitState {
            remaining: if remaining >= 0 {
                Some(remaining as u64)
            } else {
                None
            },
            limit: {
                let limit = self.rate_limit_limit.load(Ordering::SeqCst);
                if limit > 0 {
                    Some(limit)
                } else {
                    None
                }
            },
            reset: {
                let reset = self.rate_limit_reset.load(Ordering::SeqCst);
                if reset > 0 {
                    Some(reset)
                } else {
                    None
                }
            },
        }
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.maybe_throttle().await;
        let breaker = self.guard_request(url)?;

        let result = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::TransientFailure {
                message: format!("GET {} failed: {}", url, e),
                source: Some(e),
            });

        self.finish_request(url, &breaker, result).await
    }

    /// Make a GET request with custom headers.
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<Response> {
        self.maybe_throttle().await;
        let breaker = self.guard_request(url)?;

        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let result = request.send().await.map_err(|e| Error::TransientFailure {
            message: format!("GET {} failed: {}", url, e),
            source: Some(e),
        });

        self.finish_request(url, &breaker, result).await
    }

    /// Make a HEAD request.
    pub async fn head(&self, url: &str) -> Result<Response> {
        self.maybe_throttle().await;
        let breaker = self.guard_request(url)?;

        let result = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| Error::TransientFailure {
                message: format!("HEAD {} failed: {}", url, e),
                source: Some(e),
            });

        self.finish_request(url, &breaker, result).await
    }

    /// Make a POST request with JSON body.
    pub async fn post_json<T: serde::Serialize>(&self, url: &str, body: &T) -> Result<Response> {
        self.maybe_throttle().await;
        let breaker = self.guard_request(url)?;

        let result = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::TransientFailure {
                message: format!("POST {} failed: {}", url, e),
                source: Some(e),
            });

        self.finish_request(url, &breaker, result).await
    }

    // Internal methods

    /// Reject the request up front if the host's breaker is open; otherwise
    /// return the breaker so the caller can report the outcome.
    fn guard_request(&self, url: &str) -> Result<Arc<CircuitBreaker>> {
        let host = extract_domain(url);
        let breaker = self.breaker_for(&host);
        if !breaker.allow_request() {
            return Err(Error::CircuitBreakerOpen { host });
        }
        Ok(breaker)
    }

    /// Record the outcome on the breaker and classify the response status.
    async fn finish_request(
        &self,
        url: &str,
        breaker: &CircuitBreaker,
        result: Result<Response>,
    ) -> Result<Response> {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                breaker.record_failure();
                return Err(e);
            }
        };

        self.update_rate_limits(&response);
        match self.check_response_status(response, url).await {
            Ok(response) => {
                breaker.record_success();
                Ok(response)
            }
            Err(e) => {
                if e.is_retryable() {
                    breaker.record_failure();
                }
                Err(e)
            }
        }
    }

    async fn maybe_throttle(&self) {
        let state = self.rate_limit_state();
        if state.should_throttle() {
            warn!(
                "Rate limit approaching (remaining: {:?}/{:?}), throttling for {:?}",
                state.remaining, state.limit, self.throttle_delay
            );
            tokio::time::sleep(self.throttle_delay).await;
        }
    }

    fn update_rate_limits(&self, response: &Response) {
        let headers = response.headers();

        // X-RateLimit-Remaining
        if let Some(remaining) = headers.get("X-RateLimit-Remaining") {
            if let Ok(value) = remaining.to_str() {
                if let Ok(num) = value.parse::<i64>() {
                    self.rate_limit_remaining.store(num, Ordering::SeqCst);
                }
            }
        }

        // X-RateLimit-Limit
        if let Some(limit) = headers.get("X-RateLimit-Limit") {
            if let Ok(value) = limit.to_str() {
                if let Ok(num) = value.parse::<u64>() {
                    self.rate_limit_limit.store(num, Ordering::SeqCst);
                }
            }
        }

        // X-RateLimit-Reset
        if let Some(reset) = headers.get("X-RateLimit-Reset") {
            if let Ok(value) = reset.to_str() {
                if let Ok(num) = value.parse::<u64>() {
                    self.rate_limit_reset.store(num, Ordering::SeqCst);
                }
            }
        }

        // Log rate limit status
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        if remaining >= 0 && limit > 0 {
            debug!("Rate limit: {}/{}", remaining, limit);
        }
    }

    async fn check_response_status(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        // Handle rate limiting specifically
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            return Err(Error::RateLimited {
                host: extract_domain(url),
                retry_after_secs: retry_after,
            });
        }

        Err(Error::classify_http_status(status, &extract_domain(url)))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}

/// Shared HTTP client instance.
pub struct SharedHttpClient(Arc<HttpClient>);

impl SharedHttpClient {
    /// Create a new shared HTTP client.
    pub fn new() -> Result<Self> {
        Ok(Self(Arc::new(HttpClient::new()?)))
    }

    /// Get a clone of the Arc for sharing.
    pub fn clone_inner(&self) -> Arc<HttpClient> {
        self.0.clone()
    }
}

impl std::ops::Deref for SharedHttpClient {
    type Target = HttpClient;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
