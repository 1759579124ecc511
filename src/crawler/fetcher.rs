//! HTTP fetch executor
//!
//! This module performs the actual page fetches, including:
//! - Building the HTTP client with a proper user agent string
//! - Classifying each attempt's outcome (retryable vs permanent)
//! - Internal retry with exponential backoff before abandoning a URL
//! - Content-type and size gates

use crate::config::{CrawlerConfig, SiteConfig, UserAgentConfig};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use url::Url;

/// Why a fetch was given up on without retrying further
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermanentReason {
    /// The server answered with a non-retryable status
    HttpStatus(u16),

    /// The content is out of scope (wrong type, too large)
    ContentRejected(String),

    /// The body could not be decoded
    MalformedContent(String),

    /// Transient failures persisted through every retry
    RetriesExhausted(String),
}

impl PermanentReason {
    /// True when the URL was skipped for its content rather than failed
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ContentRejected(_))
    }
}

impl std::fmt::Display for PermanentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpStatus(code) => write!(f, "HTTP {}", code),
            Self::ContentRejected(reason) => write!(f, "content rejected: {}", reason),
            Self::MalformedContent(reason) => write!(f, "malformed content: {}", reason),
            Self::RetriesExhausted(reason) => write!(f, "retries exhausted: {}", reason),
        }
    }
}

/// Outcome of one fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// Page fetched and its body read
    Success {
        /// HTTP status code
        status: u16,
        /// Page body
        body: String,
        /// Round-trip time for the successful attempt
        elapsed: Duration,
    },

    /// Transient failure worth retrying (timeout, reset, 5xx, 429)
    Retryable { reason: String },

    /// Failure that retrying cannot fix
    Permanent { reason: PermanentReason },
}

/// Final result of a fetch including retry bookkeeping
#[derive(Debug)]
pub struct FetchReport {
    /// The final outcome; never `Retryable` (retries happen internally)
    pub outcome: FetchOutcome,

    /// Number of attempts made
    pub attempts: u32,

    /// Whether any attempt was answered with HTTP 429
    pub rate_limited: bool,

    /// Wall time of the last attempt, for latency statistics
    pub elapsed: Duration,
}

/// Builds the shared HTTP client
///
/// User agent format: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch executor with retry and classification policy
///
/// | Condition | Classification |
/// |-----------|----------------|
/// | Timeout, connection reset | Retryable |
/// | HTTP 5xx | Retryable |
/// | HTTP 429 | Retryable, flags the host for a rate penalty |
/// | Other HTTP 4xx | Permanent |
/// | Non-HTML content type | Permanent (rejected) |
/// | Body over the size limit | Permanent (rejected) |
/// | Body decode failure | Permanent (malformed) |
///
/// Retryable attempts back off exponentially (`base × 2^attempt`, capped)
/// and escalate to `Permanent` once `max_retries` is exhausted. A
/// permanent outcome never aborts the crawl; the caller records it and
/// moves on.
pub struct FetchExecutor {
    client: Client,
    max_retries: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_page_bytes: u64,
}

impl FetchExecutor {
    pub fn new(client: Client, crawler: &CrawlerConfig, site: &SiteConfig) -> Self {
        Self {
            client,
            max_retries: crawler.max_retries,
            backoff_base: Duration::from_millis(crawler.backoff_base_ms),
            backoff_cap: Duration::from_millis(crawler.backoff_cap_ms),
            max_page_bytes: site.max_page_bytes,
        }
    }

    /// Fetches a URL, retrying transient failures internally
    pub async fn fetch(&self, url: &Url) -> FetchReport {
        let mut attempts = 0;
        let mut rate_limited = false;
        let mut last_reason = String::new();
        let mut elapsed = Duration::ZERO;

        while attempts <= self.max_retries {
            if attempts > 0 {
                let backoff = self.backoff_delay(attempts);
                tracing::debug!(
                    "Retrying {} (attempt {}/{}) after {:?}",
                    url,
                    attempts + 1,
                    self.max_retries + 1,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let (outcome, saw_429) = self.attempt(url).await;
            elapsed = start.elapsed();
            rate_limited |= saw_429;
            attempts += 1;

            match outcome {
                FetchOutcome::Retryable { reason } => {
                    tracing::debug!("Transient failure for {}: {}", url, reason);
                    last_reason = reason;
                }
                other => {
                    return FetchReport {
                        outcome: other,
                        attempts,
                        rate_limited,
                        elapsed,
                    };
                }
            }
        }

        FetchReport {
            outcome: FetchOutcome::Permanent {
                reason: PermanentReason::RetriesExhausted(last_reason),
            },
            attempts,
            rate_limited,
            elapsed,
        }
    }

    /// One GET attempt, classified
    async fn attempt(&self, url: &Url) -> (FetchOutcome, bool) {
        let start = Instant::now();

        let response = match self.client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) => return (classify_request_error(&e), false),
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return (
                FetchOutcome::Retryable {
                    reason: "HTTP 429".to_string(),
                },
                true,
            );
        }

        if status.is_server_error() {
            return (
                FetchOutcome::Retryable {
                    reason: format!("HTTP {}", status.as_u16()),
                },
                false,
            );
        }

        if !status.is_success() {
            return (
                FetchOutcome::Permanent {
                    reason: PermanentReason::HttpStatus(status.as_u16()),
                },
                false,
            );
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_page_content_type(&content_type) {
            return (
                FetchOutcome::Permanent {
                    reason: PermanentReason::ContentRejected(format!(
                        "content type '{}'",
                        content_type
                    )),
                },
                false,
            );
        }

        if let Some(length) = response.content_length() {
            if length > self.max_page_bytes {
                return (
                    FetchOutcome::Permanent {
                        reason: PermanentReason::ContentRejected(format!(
                            "declared size {} bytes over limit",
                            length
                        )),
                    },
                    false,
                );
            }
        }

        match response.text().await {
            Ok(body) => {
                if body.len() as u64 > self.max_page_bytes {
                    return (
                        FetchOutcome::Permanent {
                            reason: PermanentReason::ContentRejected(format!(
                                "body size {} bytes over limit",
                                body.len()
                            )),
                        },
                        false,
                    );
                }
                (
                    FetchOutcome::Success {
                        status: status.as_u16(),
                        body,
                        elapsed: start.elapsed(),
                    },
                    false,
                )
            }
            Err(e) => (
                FetchOutcome::Permanent {
                    reason: PermanentReason::MalformedContent(e.to_string()),
                },
                false,
            ),
        }
    }

    /// Exponential backoff for the given attempt number, capped
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.backoff_base.saturating_mul(factor);
        delay.min(self.backoff_cap)
    }
}

/// Classifies a reqwest transport error
fn classify_request_error(error: &reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        FetchOutcome::Retryable {
            reason: "request timeout".to_string(),
        }
    } else if error.is_connect() {
        FetchOutcome::Retryable {
            reason: "connection failed".to_string(),
        }
    } else {
        FetchOutcome::Permanent {
            reason: PermanentReason::MalformedContent(error.to_string()),
        }
    }
}

/// Whether a Content-Type header names fetchable page content
fn is_page_content_type(content_type: &str) -> bool {
    if content_type.is_empty() {
        // Some servers omit the header for HTML; let the parser decide
        return true;
    }
    ["text/html", "application/xhtml", "text/plain"]
        .iter()
        .any(|t| content_type.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn test_executor() -> FetchExecutor {
        let crawler = CrawlerConfig {
            max_pages: 100,
            batch_size: 10,
            max_retries: 2,
            base_delay_ms: 1000,
            min_delay_ms: 250,
            max_delay_ms: 8000,
            error_window: 10,
            error_threshold: 0.3,
            backoff_base_ms: 10,
            backoff_cap_ms: 40,
        };
        let site = SiteConfig {
            base_url: "https://example.com/".to_string(),
            max_page_bytes: 1024,
            disallowed_extensions: vec![],
        };
        FetchExecutor::new(build_http_client(&test_user_agent()).unwrap(), &crawler, &site)
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&test_user_agent());
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let executor = test_executor();
        assert_eq!(executor.backoff_delay(1), Duration::from_millis(10));
        assert_eq!(executor.backoff_delay(2), Duration::from_millis(20));
        assert_eq!(executor.backoff_delay(3), Duration::from_millis(40));
        assert_eq!(executor.backoff_delay(10), Duration::from_millis(40));
    }

    #[test]
    fn test_page_content_types() {
        assert!(is_page_content_type("text/html; charset=utf-8"));
        assert!(is_page_content_type("application/xhtml+xml"));
        assert!(is_page_content_type("text/plain"));
        assert!(is_page_content_type(""));

        assert!(!is_page_content_type("application/pdf"));
        assert!(!is_page_content_type("image/png"));
        assert!(!is_page_content_type("application/octet-stream"));
    }

    #[test]
    fn test_rejection_reasons() {
        assert!(PermanentReason::ContentRejected("pdf".to_string()).is_rejection());
        assert!(!PermanentReason::HttpStatus(404).is_rejection());
        assert!(!PermanentReason::RetriesExhausted("timeout".to_string()).is_rejection());
    }

    // Full fetch behavior (retry counts, 429 flag, size gate) is exercised
    // against wiremock servers in the integration tests.
}
