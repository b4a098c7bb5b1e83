//! Error types for the resolver core.
//!
//! One enum carries the full error taxonomy the pipeline needs to classify
//! failures by: whether to retry, whether to abort the whole run, and what
//! to tell the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the resolver core.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed workflow document or malformed effective configuration.
    /// Never retried; aborts the call that produced it.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A catalog query returned no usable hits for an artifact.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Timeouts, 5xx, connection resets, 408/429. Retried per policy.
    #[error("transient failure: {message}")]
    TransientFailure {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// 4xx other than 408/429, disk-full, unsupported target directory.
    #[error("permanent failure: {message}")]
    PermanentFailure { message: String },

    /// Adapter reports missing or rejected credentials.
    #[error("authentication required for {host}")]
    AuthRequired { host: String },

    /// Cooperative cancellation observed.
    #[error("operation cancelled")]
    Cancelled,

    /// Enqueue attempted while another active task owns the same target path.
    #[error("target busy: {path}")]
    TargetBusy { path: PathBuf },

    /// Transfer completed but declared size does not match the bytes written.
    #[error("integrity failure for {path}: expected {expected} bytes, got {actual}")]
    IntegrityFailure {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Rate limited by a remote host.
    #[error("rate limited by {host}, retry after {retry_after_secs:?}s")]
    RateLimited {
        host: String,
        retry_after_secs: Option<u64>,
    },

    /// A host's circuit breaker is open.
    #[error("circuit breaker open for {host}")]
    CircuitBreakerOpen { host: String },

    #[error("database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("io error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("json error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::TransientFailure {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl Error {
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Error::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Classify an HTTP status code the way every catalog adapter and the
    /// download manager need to: retryable, permanent, or neither.
    pub fn classify_http_status(status: reqwest::StatusCode, host: &str) -> Error {
        match status.as_u16() {
            401 | 403 => Error::AuthRequired { host: host.to_string() },
            404 => Error::NotFound {
                message: format!("{host} returned 404"),
            },
            408 | 429 | 500..=599 => Error::TransientFailure {
                message: format!("{host} returned {status}"),
                source: None,
            },
            400..=499 => Error::PermanentFailure {
                message: format!("{host} returned {status}"),
            },
            _ => Error::PermanentFailure {
                message: format!("{host} returned unexpected status {status}"),
            },
        }
    }

    /// Whether a download worker or adapter call should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::TransientFailure { .. } | Error::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = Error::TargetBusy {
            path: PathBuf::from("/models/loras/x.safetensors"),
        };
        assert_eq!(
            err.to_string(),
            "target busy: /models/loras/x.safetensors"
        );
    }

    #[test]
    fn classifies_status_codes() {
        assert!(matches!(
            Error::classify_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "h"),
            Error::TransientFailure { .. }
        ));
        assert!(matches!(
            Error::classify_http_status(reqwest::StatusCode::NOT_FOUND, "h"),
            Error::NotFound { .. }
        ));
        assert!(matches!(
            Error::classify_http_status(reqwest::StatusCode::UNAUTHORIZED, "h"),
            Error::AuthRequired { .. }
        ));
        assert!(matches!(
            Error::classify_http_status(reqwest::StatusCode::BAD_REQUEST, "h"),
            Error::PermanentFailure { .. }
        ));
    }

    #[test]
    fn retryable_errors() {
        assert!(Error::TransientFailure {
            message: "x".into(),
            source: None
        }
        .is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }
}
