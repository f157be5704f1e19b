//! TMDB catalog client.
//!
//! Fetches one movie record at a time from a TMDB-compatible API. Handles
//! status classification, retries with exponential backoff, response parsing,
//! and the fixed inter-request delay that keeps us inside the rate limit.

use super::provider::{CatalogProvider, FetchError, RawRecord, TransientKind};
use super::retry::{run_with_retry, Attempt, RetryFailure, RetryPolicy};
use std::time::{Duration, Instant};

/// Client configuration: endpoint, credential, timeouts, retry shape.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Pause after every request, regardless of outcome.
    pub request_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            request_delay: Duration::from_millis(250),
        }
    }
}

/// Blocking HTTP client for the movie catalog.
pub struct TmdbClient {
    client: reqwest::blocking::Client,
    config: ClientConfig,
}

impl TmdbClient {
    /// Build a client. Fails fast with an authentication error when the
    /// credential is empty — no request is ever issued without one.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        if config.api_key.trim().is_empty() {
            return Err(FetchError::Authentication(
                "API credential is empty".to_string(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");

        Ok(Self { client, config })
    }

    /// Build the record URL for an identifier.
    fn record_url(&self, id: u64) -> String {
        format!(
            "{}/movie/{id}?api_key={}&language=en-US&append_to_response=credits",
            self.config.base_url, self.config.api_key
        )
    }

    /// Issue one request and classify the response.
    fn attempt_fetch(&self, id: u64) -> Attempt<RawRecord, FetchError> {
        match self.client.get(self.record_url(id)).send() {
            Ok(resp) => {
                let status = resp.status();

                if status == reqwest::StatusCode::UNAUTHORIZED {
                    return Attempt::Fatal(FetchError::Authentication(format!(
                        "HTTP 401 for record {id}"
                    )));
                }
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Attempt::Fatal(FetchError::NotFound { id });
                }
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());
                    tracing::debug!(id, retry_after, "rate limited by catalog API");
                    return Attempt::Transient(TransientKind::RateLimited);
                }
                if status.is_server_error() {
                    return Attempt::Transient(TransientKind::ServerError);
                }
                if !status.is_success() {
                    return Attempt::Fatal(FetchError::Malformed {
                        id,
                        reason: format!("unexpected HTTP {status}"),
                    });
                }

                match resp.json::<RawRecord>() {
                    Ok(record) => Attempt::Success(record),
                    Err(e) => Attempt::Fatal(FetchError::Malformed {
                        id,
                        reason: e.to_string(),
                    }),
                }
            }
            Err(e) if e.is_timeout() => Attempt::Transient(TransientKind::Timeout),
            Err(e) if e.is_connect() => Attempt::Transient(TransientKind::Connect),
            Err(e) => Attempt::Fatal(FetchError::Malformed {
                id,
                reason: e.to_string(),
            }),
        }
    }
}

impl CatalogProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    fn fetch(&self, id: u64) -> Result<RawRecord, FetchError> {
        let started = Instant::now();
        let outcome = run_with_retry(
            &self.config.retry,
            |delay| std::thread::sleep(delay),
            || self.attempt_fetch(id),
        );

        // Inter-request pacing, honored regardless of outcome.
        std::thread::sleep(self.config.request_delay);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome.result {
            Ok(record) => {
                tracing::info!(id, elapsed_ms, attempts = outcome.attempts, "fetched record");
                Ok(record)
            }
            Err(RetryFailure::Fatal(e)) => {
                tracing::warn!(
                    id,
                    elapsed_ms,
                    attempts = outcome.attempts,
                    error = %e,
                    "fetch failed"
                );
                Err(e)
            }
            Err(RetryFailure::Exhausted { kind }) => {
                tracing::warn!(
                    id,
                    elapsed_ms,
                    attempts = outcome.attempts,
                    kind = %kind,
                    "retry budget exhausted"
                );
                Err(FetchError::Exhausted {
                    id,
                    kind,
                    attempts: outcome.attempts,
                })
            }
        }
    }
}
