use crate::feed::parser::{parse_feed, RawEntry};
use crate::registry::FeedSource;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching one feed source.
///
/// None of these abort a run: the orchestrator logs them and the source
/// contributes no entries.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Timeouts, retry schedule and size limit for feed requests.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time (1s, 2s, 4s by default).
    pub retry_base: Duration,
    pub max_bytes: usize,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base: Duration::from_secs(1),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl FetchPolicy {
    fn backoff(&self, retry: u32) -> Duration {
        self.retry_base.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Build the HTTP client shared by feed fetching.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(user_agent).build()
}

/// Fetch and parse one feed source.
///
/// # Behavior
///
/// - HTTP 429 and 5xx responses are retried with exponential backoff, up to
///   `policy.max_retries` times
/// - Bodies shorter than their Content-Length are retried the same way
/// - Other 4xx responses fail immediately
/// - Bodies over `policy.max_bytes` are rejected without buffering the rest
pub async fn fetch_entries(
    client: &reqwest::Client,
    source: &FeedSource,
    policy: &FetchPolicy,
) -> Result<Vec<RawEntry>, FetchError> {
    let mut retry_count = 0;

    let bytes = loop {
        let response = tokio::time::timeout(policy.timeout, client.get(&source.url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if retry_count >= policy.max_retries {
                return Err(if status.is_server_error() {
                    FetchError::HttpStatus(status.as_u16())
                } else {
                    FetchError::RateLimited(policy.max_retries)
                });
            }

            let delay = policy.backoff(retry_count);
            tracing::warn!(
                source = %source.display_name,
                status = %status,
                retry = retry_count,
                delay_ms = delay.as_millis() as u64,
                "Feed request throttled or failed, backing off"
            );
            tokio::time::sleep(delay).await;
            retry_count += 1;
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        match read_limited_bytes(response, policy.max_bytes).await {
            Ok(bytes) => break bytes,
            Err(FetchError::IncompleteResponse { expected, received })
                if retry_count < policy.max_retries =>
            {
                let delay = policy.backoff(retry_count);
                tracing::debug!(
                    source = %source.display_name,
                    expected = expected,
                    received = received,
                    attempt = retry_count + 1,
                    "Retrying incomplete download"
                );
                tokio::time::sleep(delay).await;
                retry_count += 1;
            }
            Err(e) => return Err(e),
        }
    };

    let entries = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    tracing::debug!(
        source = %source.display_name,
        entries = entries.len(),
        "Fetched feed"
    );
    Ok(entries)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
