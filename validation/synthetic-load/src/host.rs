//! Primitives available to a user script: HTTP GET and pause.
//!
//! Scripts only see the [`HttpGet`] and [`Pause`] traits, so the same
//! iteration code runs against the pooled reqwest client in production and
//! against recording fakes in tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::LoadResult;
use crate::metrics::MetricsCollector;

/// Outcome of a single GET.
///
/// Transport failures are captured in `error` rather than returned as `Err`,
/// so a failed request never aborts the caller.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub url: String,
    pub status: u16,
    pub latency_us: u64,
    pub bytes: usize,
    pub error: Option<String>,
}

impl RequestOutcome {
    pub fn failed(url: &str, latency_us: u64, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status: 0,
            latency_us,
            bytes: 0,
            error: Some(error.into()),
        }
    }

    /// A response arrived with a non-error status.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status > 0 && self.status < 400
    }

    /// Path component of the URL, used to group metrics by endpoint.
    pub fn endpoint(&self) -> String {
        match reqwest::Url::parse(&self.url) {
            Ok(url) => url.path().to_string(),
            Err(_) => self.url.clone(),
        }
    }
}

/// HTTP GET primitive.
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(&self, url: &str) -> RequestOutcome;
}

/// Sleep primitive used between iterations.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

#[async_trait]
impl<T: HttpGet + ?Sized> HttpGet for Arc<T> {
    async fn get(&self, url: &str) -> RequestOutcome {
        (**self).get(url).await
    }
}

#[async_trait]
impl<T: Pause + ?Sized> Pause for Arc<T> {
    async fn pause(&self, duration: Duration) {
        (**self).pause(duration).await
    }
}

/// GET over a shared, pooled reqwest client.
#[derive(Clone)]
pub struct ReqwestGet {
    client: reqwest::Client,
}

impl ReqwestGet {
    /// Create a client with the given per-request timeout and idle pool size.
    pub fn new(timeout: Duration, pool_size: usize) -> LoadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool_size)
            .build()?;

        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpGet for ReqwestGet {
    async fn get(&self, url: &str) -> RequestOutcome {
        let start = Instant::now();

        match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();

                // Drain the body so the connection returns to the pool
                match response.bytes().await {
                    Ok(b) => RequestOutcome {
                        url: url.to_string(),
                        status,
                        latency_us: start.elapsed().as_micros() as u64,
                        bytes: b.len(),
                        error: None,
                    },
                    // Truncated or reset body: a transport failure, status kept for logging
                    Err(e) => RequestOutcome {
                        status,
                        ..RequestOutcome::failed(url, start.elapsed().as_micros() as u64, e.to_string())
                    },
                }
            }
            Err(e) => RequestOutcome::failed(url, start.elapsed().as_micros() as u64, e.to_string()),
        }
    }
}

/// Pause backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Wraps a GET primitive and records every outcome into shared metrics.
///
/// This is the only place request outcomes are looked at; scripts stay
/// oblivious to them.
pub struct Instrumented<G> {
    inner: G,
    metrics: Arc<Mutex<MetricsCollector>>,
}

impl<G: HttpGet> Instrumented<G> {
    pub fn new(inner: G, metrics: Arc<Mutex<MetricsCollector>>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl<G: HttpGet> HttpGet for Instrumented<G> {
    async fn get(&self, url: &str) -> RequestOutcome {
        let outcome = self.inner.get(url).await;

        if let Some(ref err) = outcome.error {
            debug!(url = %outcome.url, error = %err, "Request failed");
        } else if !outcome.is_success() {
            debug!(url = %outcome.url, status = outcome.status, "Request returned error status");
        }

        self.metrics.lock().await.record(&outcome);
        outcome
    }
}
