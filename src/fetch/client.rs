// src/fetch/client.rs
// =============================================================================
// This module fetches IIIF JSON documents over HTTP.
//
// Key functionality:
// - One GET per attempt with a per-request timeout
// - Exponential backoff between attempts: backoff * 2^(attempt-1), capped
// - Retries transport errors, timeouts, 429 and 5xx responses
// - Fails fast on other 4xx responses and on bodies that aren't JSON
//
// The Fetcher knows nothing about caching; the cache module composes
// itself in front of this one.
// =============================================================================

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::FetchError;

// Backoff delays never grow past this, no matter how many attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

// IIIF servers commonly serve JSON-LD; ask for either representation
const ACCEPT_JSON: &str = "application/json, application/ld+json";

/// Retry/timeout configuration for the [`Fetcher`].
///
/// Immutable once the Fetcher is constructed; built in main.rs from the
/// CLI flags rather than from any process-wide default.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per URL (1 = no retries)
    pub retry_total: u32,
    /// Multiplier for the exponential backoff delay, in seconds
    pub backoff_factor: f64,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retry_total: 3,
            backoff_factor: 1.0,
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep before re-attempting, after `attempt` failed tries.
    ///
    /// attempt 1 -> backoff_factor, attempt 2 -> 2x, attempt 3 -> 4x, ...
    /// capped at MAX_BACKOFF. A zero factor means no sleeping, which the
    /// tests rely on to stay fast.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = 2_f64.powi(attempt.saturating_sub(1) as i32);
        let secs = self.backoff_factor * exp;
        Duration::from_secs_f64(secs.max(0.0)).min(MAX_BACKOFF)
    }
}

/// A successfully fetched document: the body exactly as received, plus the
/// parsed JSON value.
///
/// Both are kept because the cache must store the bytes as served (so a
/// cached read is byte-identical to the original response) while everything
/// downstream works on the parsed value.
#[derive(Debug, Clone)]
pub struct FetchedJson {
    pub raw: String,
    pub json: Value,
}

/// HTTP fetcher with retry, backoff and timeout.
///
/// Created once and reused for every URL in a traversal, which lets reqwest
/// pool connections to the same IIIF server.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    /// Creates a fetcher with the given policy.
    pub fn new(policy: RetryPolicy) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(policy.timeout).build()?;
        Ok(Fetcher { client, policy })
    }

    /// Fetches a URL, retrying per the policy, and returns its JSON body.
    ///
    /// The last error wins: when every attempt fails, the caller sees the
    /// failure from the final try.
    pub async fn fetch(&self, url: &str) -> Result<FetchedJson, FetchError> {
        let mut attempt = 1;
        loop {
            debug!(url, attempt, "fetching");
            match self.fetch_once(url).await {
                Ok(doc) => return Ok(doc),
                Err(e) if e.is_retryable() && attempt < self.policy.retry_total => {
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(url, attempt, error = %e, "fetch failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // One attempt: GET, check status, read body, parse JSON
    async fn fetch_once(&self, url: &str) -> Result<FetchedJson, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, ACCEPT_JSON)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let json = serde_json::from_str(&raw).map_err(|e| FetchError::InvalidJson {
            url: url.to_string(),
            source: e,
        })?;

        Ok(FetchedJson { raw, json })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // A policy that never sleeps, so retry tests run instantly
    fn fast_policy(retry_total: u32) -> RetryPolicy {
        RetryPolicy {
            retry_total,
            backoff_factor: 0.0,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            retry_total: 10,
            backoff_factor: 1.0,
            timeout: Duration::from_secs(10),
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(4));
        // 2^19 seconds would be about six days; the cap kicks in instead
        assert_eq!(policy.backoff_delay(20), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_fetch_returns_parsed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collection"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"type": "Collection"}"#),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_policy(3)).unwrap();
        let doc = fetcher
            .fetch(&format!("{}/collection", server.uri()))
            .await
            .unwrap();
        assert_eq!(doc.json["type"], "Collection");
        assert_eq!(doc.raw, r#"{"type": "Collection"}"#);
    }

    #[tokio::test]
    async fn test_retries_on_server_error_then_succeeds() {
        let server = MockServer::start().await;
        // First two attempts fail with 503, the third succeeds
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_policy(3)).unwrap();
        let doc = fetcher.fetch(&format!("{}/flaky", server.uri())).await;
        assert!(doc.is_ok());
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_total_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_policy(3)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/down", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
        // MockServer verifies expect(3) on drop: exactly three attempts
    }

    #[tokio::test]
    async fn test_does_not_retry_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_policy(3)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_does_not_retry_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_policy(3)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/garbage", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidJson { .. }));
    }

    #[tokio::test]
    async fn test_retries_rate_limiting() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(fast_policy(2)).unwrap();
        assert!(fetcher.fetch(&format!("{}/busy", server.uri())).await.is_ok());
    }
}
