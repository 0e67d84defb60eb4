//! Source adapters: one per provider, each mapping its raw payloads into
//! tagged `RawRecord`s. Adapters own their retry policy; the orchestrator
//! only imposes the per-source timeout and the run deadline.

use crate::config::FetchOptions;
use crate::types::{DigestError, RawRecord, Result, Source};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

pub mod feed;
pub mod forum;
pub mod hacker_news;

pub use feed::FeedAdapter;
pub use forum::ForumAdapter;
pub use hacker_news::HackerNewsAdapter;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Fetch one batch of raw records. Identifiers are unique within the
    /// returned batch; no cross-source guarantee is made.
    async fn fetch(&self) -> Result<Vec<RawRecord>>;
}

/// Shared HTTP client the way every adapter wants it: compressed, with the
/// configured user agent and timeout.
pub fn build_client(options: &FetchOptions) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&options.user_agent)
        .timeout(Duration::from_secs(options.per_source_timeout_secs))
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// GET with exponential backoff. Server errors and rate limiting are
/// retried; other client errors are not worth repeating.
pub(crate) async fn get_with_retry(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    max_retries: u32,
    retry_delay_secs: u64,
) -> Result<reqwest::Response> {
    let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
        current_interval: Duration::from_secs(retry_delay_secs),
        initial_interval: Duration::from_secs(retry_delay_secs),
        max_interval: Duration::from_secs(retry_delay_secs * 32),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(retry_delay_secs * 60)),
        ..Default::default()
    };

    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            match backoff.next_backoff() {
                Some(delay) => {
                    warn!(url, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
                    tokio::time::sleep(delay).await;
                }
                None => break,
            }
        }

        match client.get(url).query(query).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                last_error = Some(DigestError::General(format!(
                    "HTTP {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown")
                )));
                let retryable = status.is_server_error() || status.as_u16() == 429;
                if !retryable {
                    break;
                }
            }
            Err(e) => last_error = Some(DigestError::Http(e)),
        }
    }

    Err(last_error.unwrap_or_else(|| DigestError::General("request failed".to_string())))
}
