//! Retrying HTTP executor for the remote whitelist API and render services.
//!
//! Every outbound request goes through [`Fetcher::execute`], which applies a
//! hard per-attempt timeout, classifies failures, and backs off
//! exponentially between attempts. Callers get back either a response
//! (including non-ok ones, so a 401 can be told apart from a dead server)
//! or the last transport error once attempts run out.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

/// Statuses that indicate a transient server-side condition worth retrying.
/// 401 is deliberately absent: bad credentials never get better on retry.
pub const DEFAULT_RETRY_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request body cannot be replayed for a retry")]
    NotReplayable,
}

/// Timeout, retry and backoff settings for one request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Wall-clock limit per attempt; exceeding it aborts the in-flight request.
    pub timeout: Duration,
    /// Retries after the first attempt, so total attempts = retries + 1.
    pub retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per further retry. No jitter.
    pub backoff_factor: f64,
    /// Response statuses treated like transport failures.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 2,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.request_timeout,
            retries: config.retries,
            base_delay: config.retry_base_delay,
            backoff_factor: config.backoff_factor,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
        }
    }

    /// Delay before the k-th retry (0-indexed): `base × factor^k`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay.mul_f64(self.backoff_factor.powi(retry as i32))
    }

    pub fn is_retry_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }
}

/// HTTP client wrapper applying a [`RetryPolicy`] to every request.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, FetchError> {
        // Per-attempt deadlines are enforced via tokio::time::timeout in
        // execute_with, not the client-global timeout, so a policy override
        // per call keeps working.
        let client = Client::builder().build()?;
        Ok(Self { client, policy })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// GET `url` under the fetcher's own policy.
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        self.execute(self.client.get(url)).await
    }

    /// Execute `request` under the fetcher's own policy.
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let policy = self.policy.clone();
        self.execute_with(request, &policy).await
    }

    /// Execute `request` under an explicit policy.
    ///
    /// Non-ok responses outside the retry-status set are returned as-is;
    /// only the caller knows whether a 401 or 404 is fatal for its purpose.
    /// When attempts run out on a retry status, the last response is
    /// returned rather than an error.
    pub async fn execute_with(
        &self,
        request: RequestBuilder,
        policy: &RetryPolicy,
    ) -> Result<Response, FetchError> {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let delay = policy.backoff_delay(attempt - 1);
                debug!(attempt, ?delay, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            let req = request.try_clone().ok_or(FetchError::NotReplayable)?;
            let exhausted = attempt >= policy.retries;

            match tokio::time::timeout(policy.timeout, req.send()).await {
                // Dropping the send future aborts the in-flight request.
                Err(_elapsed) => {
                    if exhausted {
                        return Err(FetchError::Timeout(policy.timeout));
                    }
                    warn!(attempt, timeout = ?policy.timeout, "attempt timed out, retrying");
                }
                Ok(Err(err)) if is_retryable_transport(&err) => {
                    if exhausted {
                        return Err(FetchError::Transport(err));
                    }
                    warn!(attempt, %err, "transport failure, retrying");
                }
                // Programming errors (bad URL, builder misuse) propagate
                // immediately without consuming attempts.
                Ok(Err(err)) => return Err(FetchError::Transport(err)),
                Ok(Ok(response)) => {
                    let status = response.status();
                    if policy.is_retry_status(status) && !exhausted {
                        warn!(attempt, %status, "retryable status, retrying");
                    } else {
                        return Ok(response);
                    }
                }
            }
            attempt += 1;
        }
    }
}

/// Transient transport conditions: timeouts, refused/reset connections,
/// DNS hiccups and mid-request disconnects. Builder and decode errors are
/// caller bugs and never retried.
fn is_retryable_transport(err: &reqwest::Error) -> bool {
    if err.is_builder() || err.is_redirect() || err.is_decode() {
        return false;
    }
    err.is_timeout() || err.is_connect() || err.is_request()
}
