//! Draw service client.
//!
//! - One outbound GET per call, bounded by a per-request timeout
//! - Non-2xx status, timeout, connection and body errors all map to
//!   `TransportError`; nothing here panics or retries

use crate::models::{ProbeError, Result, SampleRequestSpec, ServiceConfig, TransportError};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Longest error body excerpt kept in a `TransportError::Status`.
const ERROR_BODY_LIMIT: usize = 200;

/// Issues one draw call per invocation.
///
/// Retry policy belongs to the caller.
#[async_trait]
pub trait SampleRequester: Send + Sync {
    /// Request one batch; returns the raw response body.
    async fn request(&self, spec: &SampleRequestSpec) -> std::result::Result<String, TransportError>;
}

/// HTTP implementation of [`SampleRequester`].
#[derive(Debug)]
pub struct HttpRequester {
    client: reqwest::Client,
    base_url: Url,
    action: String,
    count_param: String,
    timeout: Duration,
    total_requests: AtomicU64,
    total_failures: AtomicU64,
}

impl HttpRequester {
    /// Create a new requester.
    pub fn new(
        base_url: &str,
        action: impl Into<String>,
        count_param: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(30));

        let base_url = Url::parse(base_url).map_err(|e| {
            ProbeError::Config(crate::models::ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: e.to_string(),
            })
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProbeError::ClientSetup)?;

        Ok(Self {
            client,
            base_url,
            action: action.into(),
            count_param: count_param.into(),
            timeout,
            total_requests: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        })
    }

    /// Create a requester from the `[service]` config section.
    pub fn from_config(service: &ServiceConfig) -> Result<Self> {
        Self::new(
            &service.base_url,
            service.action.clone(),
            service.count_param.clone(),
            Some(service.timeout_secs),
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full request URL for a batch.
    pub fn request_url(&self, spec: &SampleRequestSpec) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("action", &self.action)
            .append_pair("user", &spec.user)
            .append_pair("type", &spec.pool)
            .append_pair(&self.count_param, &spec.batch_size.to_string());
        url
    }

    /// Get (requests, failures) issued so far.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.total_requests.load(Ordering::Relaxed),
            self.total_failures.load(Ordering::Relaxed),
        )
    }

    fn classify(&self, e: reqwest::Error, on_body: bool) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if on_body {
            TransportError::Body(e)
        } else {
            TransportError::Network(e)
        }
    }

    async fn send(&self, spec: &SampleRequestSpec) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .get(self.request_url(spec))
            .send()
            .await
            .map_err(|e| self.classify(e, false))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let cut = (0..=ERROR_BODY_LIMIT)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.text().await.map_err(|e| self.classify(e, true))
    }
}

#[async_trait]
impl SampleRequester for HttpRequester {
    async fn request(&self, spec: &SampleRequestSpec) -> std::result::Result<String, TransportError> {
        let start = Instant::now();
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let result = self.send(spec).await;
        if result.is_err() {
            self.total_failures.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            pool = %spec.pool,
            batch_size = spec.batch_size,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Draw request finished"
        );
        result
    }
}
