//! Observation acquisition with failure classification and jittered retry.
//!
//! The [`Acquirer`] issues one GET per attempt through an
//! [`ObservationSource`], classifies any failure with
//! [`FetchError::class`], and waits a uniformly random backoff between
//! attempts. Backoff is uniformly jittered, not exponential.

use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, EXPIRES};
use tokio::sync::watch;

use crate::error::{FailureClass, FetchError};
use crate::observation::Observation;

pub type Result<T> = std::result::Result<T, FetchError>;

// ── Source seam ─────────────────────────────────────────────────────

/// Raw response from the observation endpoint.
#[derive(Debug, Clone)]
pub struct SourceResponse {
    pub status: u16,
    pub body: String,
    /// `Expires` header, the API's hint for when the next reading is due.
    pub expires: Option<String>,
}

/// Abstraction over the HTTP transport.
///
/// Implementations return transport failures as [`FetchError::Connection`]
/// (retryable) or [`FetchError::Request`] (not retryable). Non-2xx statuses
/// are returned as responses and classified by the [`Acquirer`].
pub trait ObservationSource: Send + Sync {
    fn get(&self) -> impl Future<Output = Result<SourceResponse>> + Send;
}

/// reqwest-backed source with fixed `Accept` and `User-Agent` headers.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(
        url: impl Into<String>,
        accept: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let accept = HeaderValue::from_str(accept)
            .map_err(|e| FetchError::Request(format!("invalid Accept header: {e}")))?;
        headers.insert(ACCEPT, accept);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ObservationSource for HttpSource {
    async fn get(&self) -> Result<SourceResponse> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let expires = response
            .headers()
            .get(EXPIRES)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(transport_error)?;

        Ok(SourceResponse {
            status,
            body,
            expires,
        })
    }
}

/// Defects in the request itself (bad URL or header, redirect loop,
/// undecodable body) are not retryable. Everything else reqwest reports
/// happened on the wire (refused, reset, hung up, timed out) and is transient.
fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_builder() || err.is_redirect() || err.is_status() || err.is_decode() {
        FetchError::Request(err.to_string())
    } else {
        FetchError::Connection(err.to_string())
    }
}

// ── Retry policy ────────────────────────────────────────────────────

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(5),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Draw a backoff uniformly from `[min_wait, max_wait]`.
    pub fn backoff<R: Rng>(&self, rng: &mut R) -> Duration {
        let min = u64::try_from(self.min_wait.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_wait.as_millis())
            .unwrap_or(u64::MAX)
            .max(min);
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

// ── Acquirer ────────────────────────────────────────────────────────

/// Fetches observations, retrying transient and invalid results.
pub struct Acquirer<S, R = StdRng> {
    source: S,
    policy: RetryPolicy,
    rng: R,
    shutdown: Option<watch::Receiver<()>>,
    last_reading: Option<Observation>,
    next_reading: Option<String>,
}

impl<S: ObservationSource> Acquirer<S, StdRng> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self::with_rng(source, policy, StdRng::from_entropy())
    }
}

impl<S: ObservationSource, R: Rng + Send> Acquirer<S, R> {
    /// Create an acquirer with an explicit random source for backoff jitter.
    pub fn with_rng(source: S, policy: RetryPolicy, rng: R) -> Self {
        Self {
            source,
            policy,
            rng,
            shutdown: None,
            last_reading: None,
            next_reading: None,
        }
    }

    /// Abort backoff waits with [`FetchError::Cancelled`] when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The most recent successful observation.
    pub fn last_reading(&self) -> Option<&Observation> {
        self.last_reading.as_ref()
    }

    /// The `Expires` header of the most recent 2xx response.
    pub fn next_reading(&self) -> Option<&str> {
        self.next_reading.as_deref()
    }

    /// Fetch a valid observation, retrying under the policy.
    ///
    /// Fatal failures surface on the attempt that produced them. Transient
    /// and invalid results are retried; once the attempt budget is spent
    /// the last one is wrapped in [`FetchError::RetriesExhausted`].
    pub async fn fetch(&mut self) -> Result<Observation> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            log::info!("Attempting observation {}/{}", attempt, max_attempts);

            let err = match self.attempt().await {
                Ok(observation) => {
                    self.last_reading = Some(observation.clone());
                    return Ok(observation);
                }
                Err(err) => err,
            };

            match err.class() {
                FailureClass::Fatal => {
                    match &err {
                        FetchError::Status { status } if *status > 400 && *status < 500 => {
                            log::error!("Bad request, please check the request: {}", err)
                        }
                        FetchError::Parse(_) => {
                            log::error!("Observation payload changed shape: {}", err)
                        }
                        _ => log::error!("Error contacting observation endpoint: {}", err),
                    }
                    return Err(err);
                }
                FailureClass::Transient => log::warn!("Server error, will try again: {}", err),
                FailureClass::Invalid => log::warn!("Weather observation failed: {}", err),
            }

            if attempt >= max_attempts {
                log::error!("Giving up after {} attempts: {}", attempt, err);
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let wait = self.policy.backoff(&mut self.rng);
            log::info!("On retry {} waiting another {:?}", attempt, wait);
            self.wait(wait).await?;
        }
    }

    async fn attempt(&mut self) -> Result<Observation> {
        let response = self.source.get().await?;
        if !(200..300).contains(&response.status) {
            return Err(FetchError::Status {
                status: response.status,
            });
        }
        self.next_reading = response.expires;

        let observation = Observation::from_json(&response.body)?;
        if !observation.is_reporting() {
            return Err(FetchError::Invalid {
                time: observation.time,
            });
        }
        Ok(observation)
    }

    async fn wait(&mut self, duration: Duration) -> Result<()> {
        match self.shutdown.as_mut() {
            Some(shutdown) => tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = shutdown.changed() => {
                    log::info!("Shutdown requested during backoff");
                    Err(FetchError::Cancelled)
                }
            },
            None => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

// ── Scripted source for testing ─────────────────────────────────────
