use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::{ProbeConfig, TransportErrorPolicy, TARGETS};
use crate::metrics::ProbeMetrics;
use crate::models::{CheckResult, MonitorState, Status};
use crate::probe::{ProbeOutcome, Prober};
use crate::shutdown::Shutdown;

pub struct Monitor {
    pub config: ProbeConfig,
    targets: Vec<String>,
    delay: Duration,
    prober: Prober,
    pub metrics: Arc<ProbeMetrics>,
    pub state: Arc<Mutex<MonitorState>>,
}

impl Monitor {
    pub fn new(config: ProbeConfig, delay_secs: u64, metrics: Arc<ProbeMetrics>) -> Result<Self> {
        let prober = Prober::new(Duration::from_millis(config.timeout_ms))?;
        Ok(Self {
            config,
            targets: TARGETS.iter().map(|t| t.to_string()).collect(),
            delay: Duration::from_secs(delay_secs),
            prober,
            metrics,
            state: Arc::new(Mutex::new(MonitorState::default())),
        })
    }

    /// Replaces the compiled-in targets. Used to point the loop at local servers.
    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs cycles back to back until `shutdown` fires or a probe fails hard.
    pub async fn run(&self, shutdown: &Shutdown) -> Result<()> {
        info!(
            targets = self.targets.len(),
            delay_secs = self.delay.as_secs(),
            timeout_ms = self.config.timeout_ms,
            "Probe loop active"
        );

        while !shutdown.is_requested() {
            let start = Instant::now();
            let results = self.run_cycle(shutdown).await?;
            if shutdown.is_requested() {
                break;
            }
            info!(
                "Cycle completed {} checks in {:.2}s.",
                results.len(),
                start.elapsed().as_secs_f64()
            );
        }

        info!("Probe loop stopped");
        Ok(())
    }

    /// Probes every target once, in order, waiting `delay` between
    /// consecutive checks. Returns early with the results gathered so far if
    /// shutdown is requested during a wait.
    pub async fn run_cycle(&self, shutdown: &Shutdown) -> Result<Vec<CheckResult>> {
        let mut results = Vec::with_capacity(self.targets.len());

        for (i, url) in self.targets.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = shutdown.wait() => break,
                }
            }
            let result = self.check_target(url).await?;
            self.process_result(&result).await;
            results.push(result);
        }

        Ok(results)
    }

    async fn check_target(&self, url: &str) -> Result<CheckResult> {
        let timestamp = Utc::now();
        let outcome = self.prober.probe(url).await;
        let status_code = outcome.status_code();
        let mut message = match &outcome {
            ProbeOutcome::Response { status_code, .. } => format!("HTTP {}", status_code),
            ProbeOutcome::Timeout { .. } => {
                format!("Request Timeout ({}ms)", self.prober.timeout().as_millis())
            }
            ProbeOutcome::Failed { .. } => String::new(),
        };

        let (status, latency_ms) = match outcome.classify() {
            Ok(classified) => classified,
            Err(error) => match self.config.on_transport_error {
                TransportErrorPolicy::Crash => {
                    return Err(anyhow::Error::new(error).context(format!("Probe of {} failed", url)));
                }
                TransportErrorPolicy::MarkDown => {
                    warn!(url, "Transport error recorded as down: {}", error);
                    message = format!("Transport Error: {}", error);
                    (Status::Down, f64::INFINITY)
                }
            },
        };

        Ok(CheckResult {
            url: url.to_string(),
            timestamp,
            status,
            status_code,
            latency_ms,
            message,
        })
    }

    async fn process_result(&self, result: &CheckResult) {
        self.metrics.record(result);

        let mut state = self.state.lock().await;
        let old_status = state.replace(result.clone());
        drop(state);

        match old_status {
            Some(old) if old != result.status => {}
            None if result.status == Status::Down => {}
            _ => return,
        }

        let msg = format!("[CHANGE] {} ({}) -> {:?}", result.url, result.message, result.status);
        if result.status == Status::Down { error!("{}", msg); } else { warn!("{}", msg); }
    }
}
