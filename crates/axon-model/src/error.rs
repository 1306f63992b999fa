// Copyright (c) 2025-2026 Axon Contributors
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Normalized provider error taxonomy.
///
/// Every concrete provider maps its transport and API errors onto these
/// variants so the agent loop can make retry and recovery decisions without
/// knowing which provider is behind the trait object.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Invalid or missing credentials (HTTP 401/403).  Never retried; the
    /// agent rewinds the last user turn so the call can be repeated once the
    /// credentials are fixed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Network-level failure: DNS, connect, TLS, or a dropped stream.
    #[error("connection error: {0}")]
    Connection(String),

    /// HTTP 429.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// The request exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// HTTP 4xx other than auth/rate-limit; the request itself is wrong and
    /// retrying it verbatim cannot succeed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// HTTP 5xx or a malformed response body.
    #[error("provider internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Transient errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::RateLimit(_) | Self::Timeout | Self::Internal(_)
        )
    }

    /// Short kind label used in structured events and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Connection(_) => "connection",
            Self::RateLimit(_) => "rate_limit",
            Self::Timeout => "timeout",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }

    /// Map an HTTP status + response body to the error taxonomy.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth(body),
            429 => Self::RateLimit(body),
            400..=499 => Self::BadRequest(body),
            _ => Self::Internal(format!("HTTP {status}: {body}")),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(e.to_string())
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_transient_errors_only() {
        assert!(ProviderError::Connection("reset".into()).is_retryable());
        assert!(ProviderError::RateLimit("429".into()).is_retryable());
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Internal("500".into()).is_retryable());
        assert!(!ProviderError::Auth("401".into()).is_retryable());
        assert!(!ProviderError::BadRequest("400".into()).is_retryable());
    }

    #[test]
    fn status_401_maps_to_auth() {
        assert!(matches!(
            ProviderError::from_status(401, "no key".into()),
            ProviderError::Auth(_)
        ));
    }

    #[test]
    fn status_429_maps_to_rate_limit() {
        assert!(matches!(
            ProviderError::from_status(429, "slow down".into()),
            ProviderError::RateLimit(_)
        ));
    }

    #[test]
    fn status_400_maps_to_bad_request() {
        assert!(matches!(
            ProviderError::from_status(400, "bad schema".into()),
            ProviderError::BadRequest(_)
        ));
    }

    #[test]
    fn status_500_maps_to_internal() {
        assert!(matches!(
            ProviderError::from_status(503, "overloaded".into()),
            ProviderError::Internal(_)
        ));
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ProviderError::Timeout.kind(), "timeout");
        assert_eq!(ProviderError::Auth(String::new()).kind(), "auth");
    }
}
