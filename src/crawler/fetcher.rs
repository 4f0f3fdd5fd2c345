//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with a polite user agent and timeouts
//! - A fixed delay before every request
//! - Retry with linear backoff on non-success statuses and transport errors
//! - A terminal `FetchError` once retries are exhausted

use crate::config::{Config, SourceConfig};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Terminal failure to fetch one URL after every retry was spent
#[derive(Debug, Error)]
#[error("failed to fetch {url} after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    /// The URL that could not be fetched
    pub url: String,

    /// Number of requests made, including the first
    pub attempts: u32,

    /// Cause of the last failed attempt
    #[source]
    pub cause: FetchFailure,
}

/// Why a single request attempt failed
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Anything that can turn a URL into page content
///
/// The coordinator and category walker only ever talk to this trait, so a
/// run can be driven by the real HTTP fetcher or by an in-memory site.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    /// Fetches the raw body of `url`
    async fn fetch(&mut self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The source configuration (user agent, timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &SourceConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sequential, politely paced HTTP fetcher
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return body |
/// | Any other status | Retry after backoff |
/// | Timeout / connect / body error | Retry after backoff |
/// | Retries exhausted | `FetchError` with the last cause |
///
/// Attempt `n` (1-based) that fails waits `delay * n` before the next
/// attempt, on top of the fixed delay that precedes every request.
#[derive(Debug, Clone)]
pub struct RateLimitedFetcher {
    client: Client,
    delay: Duration,
    retries: u32,
    requests_sent: u64,
}

impl RateLimitedFetcher {
    pub fn new(client: Client, delay: Duration, retries: u32) -> Self {
        Self {
            client,
            delay,
            retries,
            requests_sent: 0,
        }
    }

    /// Builds a fetcher with a fresh client from the full configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.source)?;
        Ok(Self::new(client, config.run.delay(), config.run.retries))
    }

    /// Total HTTP requests issued, counting retries
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }

    async fn attempt(&mut self, url: &str) -> Result<String, FetchFailure> {
        self.requests_sent += 1;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

impl PageSource for RateLimitedFetcher {
    async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        let max_attempts = self.retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.attempt(url).await {
                Ok(body) => {
                    tracing::trace!("GET {} ok ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(cause) if attempt < max_attempts => {
                    let backoff = self.backoff(attempt);
                    tracing::warn!(
                        "GET failed ({}/{}) {}: {}. Retrying in {:?}",
                        attempt,
                        max_attempts,
                        url,
                        cause,
                        backoff
                    );
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(cause) => {
                    return Err(FetchError {
                        url: url.to_string(),
                        attempts: attempt,
                        cause,
                    });
                }
            }
        }
    }
}
