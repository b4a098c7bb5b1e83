//! Network utilities for HTTP operations, retries, and resilience.
//!
//! - Retry logic with exponential backoff and jitter
//! - Per-host circuit breaker
//! - Rate-limit-aware HTTP client
//! - Resumable download manager

mod circuit_breaker;
mod client;
mod download;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{HttpClient, RateLimitState, SharedHttpClient};
pub use download::{DownloadManager, DownloadManagerStatus, NewDownloadTask};
pub use retry::TransferBackoff;
