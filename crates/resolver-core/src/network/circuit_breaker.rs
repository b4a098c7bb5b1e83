//! Per-host circuit breaker (§2a, §4.8, §5).
//!
//! `HttpClient` keeps one breaker per host behind `breaker_for`, so a run of
//! failures against catalog_C never throttles traffic to catalog_H. A breaker
//! starts CLOSED; `failure_threshold` consecutive failures trip it OPEN, and
//! `guard_request` rejects further calls to that host with
//! `Error::CircuitBreakerOpen` until `recovery_timeout` has elapsed. The
//! breaker then lets a bounded number of HALF_OPEN probe requests through —
//! success closes it again, failure reopens it.

use crate::config::NetworkConfig;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: NetworkConfig::CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            recovery_timeout: NetworkConfig::CIRCUIT_BREAKER_RECOVERY_TIMEOUT,
            half_open_max_calls: NetworkConfig::CIRCUIT_BREAKER_HALF_OPEN_PROBES,
        }
    }
}

/// Tracks failures against one host and decides whether `HttpClient` should
/// still send it requests.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
    opened_at: RwLock<Option<Instant>>,
    half_open_calls: AtomicU32,
    host: String,
}

impl CircuitBreaker {
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_config(host, CircuitBreakerConfig::default())
    }

    pub fn with_config(host: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
            opened_at: RwLock::new(None),
            half_open_calls: AtomicU32::new(0),
            host: host.into(),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.maybe_transition_to_half_open();
        *self.state.read().unwrap()
    }

    /// Whether `HttpClient::guard_request` should let a request to this host
    /// through right now.
    pub fn allow_request(&self) -> bool {
        self.maybe_transition_to_half_open();

        match *self.state.read().unwrap() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                let calls = self.half_open_calls.fetch_add(1, Ordering::SeqCst);
                calls < self.config.half_open_max_calls
            }
        }
    }

    pub fn record_success(&self) {
        self.total_successes.fetch_add(1, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);

        if *self.state.read().unwrap() == CircuitState::HalfOpen {
            self.transition_to_closed();
        }
    }

    pub fn record_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::SeqCst);
        let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;

        let current_state = *self.state.read().unwrap();
        match current_state {
            CircuitState::Closed => {
                if failures >= self.config.failure_threshold {
                    self.transition_to_open();
                }
            }
            CircuitState::HalfOpen => self.transition_to_open(),
            CircuitState::Open => {}
        }
    }

    fn transition_to_open(&self) {
        let mut state = self.state.write().unwrap();
        if *state != CircuitState::Open {
            *state = CircuitState::Open;
            *self.opened_at.write().unwrap() = Some(Instant::now());
            self.half_open_calls.store(0, Ordering::SeqCst);
            warn!(
                host = %self.host,
                failures = self.failure_count.load(Ordering::SeqCst),
                "circuit breaker opened"
            );
        }
    }

    fn transition_to_half_open(&self) {
        let mut state = self.state.write().unwrap();
        if *state == CircuitState::Open {
            *state = CircuitState::HalfOpen;
            self.half_open_calls.store(0, Ordering::SeqCst);
            debug!(host = %self.host, "circuit breaker entering half-open");
        }
    }

    fn transition_to_closed(&self) {
        let mut state = self.state.write().unwrap();
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::SeqCst);
        *self.opened_at.write().unwrap() = None;
        debug!(host = %self.host, "circuit breaker recovered to closed");
    }

    fn maybe_transition_to_half_open(&self) {
        if *self.state.read().unwrap() != CircuitState::Open {
            return;
        }
        let opened_at = *self.opened_at.read().unwrap();
        if let Some(opened) = opened_at {
            if opened.elapsed() >= self.config.recovery_timeout {
                self.transition_to_half_open();
            }
        }
    }
}
