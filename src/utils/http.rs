//! HTTP access with bounded retries.
//!
//! Every network call goes through [`HttpClient`]. Transient failures
//! (connection errors, timeouts, HTTP 429 and 5xx) are retried with
//! exponential backoff up to [`RetryPolicy::attempts`] times in total; all
//! other failures are returned immediately.

use crate::constants::{
    API_REQUEST_TIMEOUT, DOWNLOAD_TIMEOUT, MAX_ATTEMPTS, MAX_BACKOFF_DELAY_MS,
    STARTING_BACKOFF_DELAY_MS, USER_AGENT,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, IF_MODIFIED_SINCE};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

/// Why an HTTP call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("{message}")]
    Transport {
        message: String,
        transient: bool,
    },

    #[error("HTTP {status}")]
    Status {
        status: u16,
    },

    #[error("invalid response body: {0}")]
    Body(String),

    #[error("failed to write {path}: {reason}")]
    Write {
        path: String,
        reason: String,
    },
}

impl HttpError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport {
                transient,
                ..
            } => *transient,
            Self::Status {
                status,
            } => *status == 429 || *status >= 500,
            Self::Body(_)
            | Self::Write {
                ..
            } => false,
        }
    }

    fn from_reqwest(err: &reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status {
                status: status.as_u16(),
            };
        }
        Self::Transport {
            message: err.to_string(),
            transient: err.is_connect() || err.is_timeout() || err.is_request() || err.is_body(),
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: MAX_ATTEMPTS,
            base_delay_ms: STARTING_BACKOFF_DELAY_MS,
            max_delay_ms: MAX_BACKOFF_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// A policy with millisecond delays, for tests against local servers.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            attempts: MAX_ATTEMPTS,
            base_delay_ms: 2,
            max_delay_ms: 10,
        }
    }

    /// Delays between attempts: base, 2×base, 4×base, … capped at max.
    fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialBackoff::from_millis(2)
            .factor((self.base_delay_ms / 2).max(1))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .take(self.attempts.saturating_sub(1))
    }
}

/// Outcome of a conditional JSON request.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonResponse {
    Fresh(serde_json::Value),
    NotModified,
}

/// Shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    github_token: Option<String>,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(github_token: Option<String>, retry: RetryPolicy) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(API_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            github_token,
            retry,
        })
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// With `if_modified_since`, a `304 Not Modified` answer yields
    /// [`JsonResponse::NotModified`]. With `authenticate`, the configured
    /// GitHub token is sent.
    pub async fn get_json(
        &self,
        url: &str,
        if_modified_since: Option<DateTime<Utc>>,
        authenticate: bool,
    ) -> Result<JsonResponse, HttpError> {
        let mut headers = HeaderMap::new();
        if let Some(since) = if_modified_since {
            let value = since.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
            if let Ok(value) = HeaderValue::from_str(&value) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }
        if authenticate
            && let Some(token) = &self.github_token
            && let Ok(value) = HeaderValue::from_str(&format!("token {token}"))
        {
            headers.insert(AUTHORIZATION, value);
        }

        self.with_retry(url, || {
            let request = self.client.get(url).headers(headers.clone()).timeout(API_REQUEST_TIMEOUT);
            async move {
                let response = request.send().await.map_err(|e| HttpError::from_reqwest(&e))?;
                let status = response.status();
                if status == StatusCode::NOT_MODIFIED {
                    return Ok(JsonResponse::NotModified);
                }
                if !status.is_success() {
                    return Err(HttpError::Status {
                        status: status.as_u16(),
                    });
                }
                let body = response.bytes().await.map_err(|e| HttpError::from_reqwest(&e))?;
                serde_json::from_slice(&body)
                    .map(JsonResponse::Fresh)
                    .map_err(|e| HttpError::Body(e.to_string()))
            }
        })
        .await
    }

    /// Stream `url` into `path`, truncating it on every attempt.
    ///
    /// Returns the number of bytes written and the number of attempts used.
    pub async fn download_to(&self, url: &str, path: &Path) -> Result<(u64, usize), HttpError> {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let result = self
            .with_retry(url, || {
                counter.fetch_add(1, Ordering::SeqCst);
                let request = self.client.get(url).timeout(DOWNLOAD_TIMEOUT);
                async move {
                    let response =
                        request.send().await.map_err(|e| HttpError::from_reqwest(&e))?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(HttpError::Status {
                            status: status.as_u16(),
                        });
                    }

                    let write_error = |e: std::io::Error| HttpError::Write {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    };
                    let mut file = tokio::fs::File::create(path).await.map_err(write_error)?;
                    let mut written = 0u64;
                    let mut stream = response.bytes_stream();
                    while let Some(chunk) = stream.next().await {
                        let chunk = chunk.map_err(|e| HttpError::from_reqwest(&e))?;
                        file.write_all(&chunk).await.map_err(write_error)?;
                        written += chunk.len() as u64;
                    }
                    file.flush().await.map_err(write_error)?;
                    file.sync_all().await.map_err(write_error)?;
                    Ok(written)
                }
            })
            .await?;
        Ok((result, attempts.load(Ordering::SeqCst)))
    }

    async fn with_retry<T, F, Fut>(&self, url: &str, mut action: F) -> Result<T, HttpError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, HttpError>>,
    {
        RetryIf::spawn(
            self.retry.delays(),
            || {
                let fut = action();
                async move {
                    let result = fut.await;
                    if let Err(e) = &result {
                        if e.is_transient() {
                            warn!("Request to {} failed ({}), may retry", url, e);
                        } else {
                            debug!("Request to {} failed ({})", url, e);
                        }
                    }
                    result
                }
            },
            HttpError::is_transient,
        )
        .await
    }
}
