use anyhow::{Context, Result};
use reqwest::redirect::Policy;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::models::Status;

/// How a single GET against a target ended.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// A full response (status line and body) arrived within the timeout.
    Response { status_code: u16, latency: Duration },
    /// The request did not complete within the timeout.
    Timeout { elapsed: Duration },
    /// Any other transport failure: DNS, refused or reset connection, TLS.
    Failed { error: reqwest::Error, elapsed: Duration },
}

impl ProbeOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            ProbeOutcome::Response { latency, .. } => *latency,
            ProbeOutcome::Timeout { elapsed } | ProbeOutcome::Failed { elapsed, .. } => *elapsed,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Response { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Maps the outcome to `(status, latency_ms)`. A timeout is down with
    /// infinite latency; any other transport failure is handed back.
    pub fn classify(self) -> Result<(Status, f64), reqwest::Error> {
        match self {
            ProbeOutcome::Response { status_code, latency } => {
                Ok((Status::from_status_code(status_code), as_millis(latency)))
            }
            ProbeOutcome::Timeout { .. } => Ok((Status::Down, f64::INFINITY)),
            ProbeOutcome::Failed { error, .. } => Err(error),
        }
    }
}

pub fn as_millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

pub struct Prober {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    pub fn new(timeout: Duration) -> Result<Self> {
        // 3xx must be observed as-is; it counts as down.
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http_client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issues one GET and reads the body, timing the whole exchange.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();
        let result = match self.http_client.get(url).send().await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                response.bytes().await.map(|_| status_code)
            }
            Err(e) => Err(e),
        };
        let elapsed = start.elapsed();

        match result {
            Ok(status_code) => {
                debug!(url, status_code, latency_ms = as_millis(elapsed), "Probe completed");
                ProbeOutcome::Response { status_code, latency: elapsed }
            }
            Err(error) if error.is_timeout() => {
                warn!(url, timeout_ms = self.timeout.as_millis() as u64, "Probe timed out: {}", error);
                ProbeOutcome::Timeout { elapsed }
            }
            Err(error) => ProbeOutcome::Failed { error, elapsed },
        }
    }

    /// The `(status, latency_ms)` contract; see [`ProbeOutcome::classify`].
    pub async fn check(&self, url: &str) -> Result<(Status, f64)> {
        self.probe(url)
            .await
            .classify()
            .with_context(|| format!("Probe of {} failed", url))
    }
}
