//! HTTP plumbing shared by the network sources.
//!
//! Network errors, HTTP 429 and HTTP 5xx are retried with exponential
//! backoff; any other non-2xx status fails on the spot. Every failure that
//! leaves this module is [`CatalogueError::SourceUnavailable`].

use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

use crate::config::HarvestConfig;
use crate::error::{CatalogueError, Result};

/// Upper bound for any retry delay, computed or server-provided.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Backoff before retry number `attempt` (1-based): 1×, 2×, 4×, ... capped at 32×.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff
            .checked_mul(1u32 << attempt.saturating_sub(1).min(5))
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

/// Client with the configured timeout and user agent.
pub fn build_client(config: &HarvestConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| CatalogueError::source_unavailable(&config.api_url, e))
}

/// Send the request produced by `build` until it succeeds or retries run out.
pub async fn send_with_retry<F>(endpoint: &str, policy: &RetryPolicy, build: F) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;
    let mut retry_after = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = retry_after
                .take()
                .unwrap_or_else(|| policy.delay_for(attempt));
            warn!(
                endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        retry_after = parse_retry_after(&response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    last_err = Some(status_reason(status, &body));
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                return Err(CatalogueError::source_unavailable(
                    endpoint,
                    status_reason(status, &body),
                ));
            }
            Err(e) => {
                last_err = Some(e.to_string());
                continue;
            }
        }
    }

    Err(CatalogueError::source_unavailable(
        endpoint,
        last_err.unwrap_or_else(|| "request failed after retries".to_string()),
    ))
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_DELAY))
}

fn status_reason(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {}", status);
    }
    let snippet: String = body.chars().take(200).collect();
    format!("HTTP {}: {}", status, snippet)
}
