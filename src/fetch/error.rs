// src/fetch/error.rs
// =============================================================================
// Typed errors for the fetch layer.
//
// Every failure carries the URL it happened on, because by the time an error
// surfaces the traversal engine is juggling many URLs and the user needs to
// know which one broke.
//
// Retryability lives here too: the retry loop in client.rs asks the error
// itself whether another attempt could help, instead of re-inspecting
// status codes in two places.
// =============================================================================

use thiserror::Error;

/// Errors that can occur while fetching a IIIF JSON document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS failure, connection refused, TLS, ...)
    #[error("network error fetching {url}: {source}")]
    Transport {
        /// The URL that failed
        url: String,
        /// The underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded the per-request timeout
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Server answered with a non-2xx status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Body arrived but does not parse as JSON
    #[error("invalid JSON from {url}: {source}")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Builds the right variant for a failed reqwest call.
    ///
    /// reqwest folds timeouts, connect failures and protocol errors into one
    /// opaque error type, so we split them back apart here.
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    /// The URL this error happened on.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::Timeout { url }
            | FetchError::HttpStatus { url, .. }
            | FetchError::InvalidJson { url, .. } => url,
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport errors and timeouts are transient by nature. For HTTP
    /// statuses only 429 (rate limited) and 5xx (server trouble) qualify;
    /// other 4xx responses and unparseable bodies won't improve on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::InvalidJson { .. } => false,
        }
    }

    /// Short machine-friendly label for warning lines and JSON failure lists.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Transport { .. } => "transport",
            FetchError::Timeout { .. } => "timeout",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::InvalidJson { .. } => "invalid_json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16) -> FetchError {
        FetchError::HttpStatus {
            url: "https://example.org/iiif".to_string(),
            status,
        }
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(status_error(500).is_retryable());
        assert!(status_error(502).is_retryable());
        assert!(status_error(503).is_retryable());
        assert!(status_error(429).is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!status_error(400).is_retryable());
        assert!(!status_error(404).is_retryable());
        assert!(!status_error(410).is_retryable());
    }

    #[test]
    fn test_invalid_json_is_not_retryable() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = FetchError::InvalidJson {
            url: "https://example.org/iiif".to_string(),
            source,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "invalid_json");
    }

    #[test]
    fn test_error_reports_its_url() {
        assert_eq!(status_error(404).url(), "https://example.org/iiif");
    }
}
