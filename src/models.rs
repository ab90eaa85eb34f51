use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Up,
    Down,
}

impl Status {
    pub fn from_status_code(code: u16) -> Self {
        if code == 200 { Status::Up } else { Status::Down }
    }

    /// Value written to the `service_up` gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            Status::Up => 1.0,
            Status::Down => 0.0,
        }
    }
}

/// Latest outcome of probing one URL. `latency_ms` is `+inf` when no latency
/// could be measured; it serializes to `null`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct MonitorState {
    pub last_results: HashMap<String, CheckResult>,
}

impl MonitorState {
    /// Replaces the current result for the URL, returning the previous status.
    pub fn replace(&mut self, result: CheckResult) -> Option<Status> {
        self.last_results
            .insert(result.url.clone(), result)
            .map(|old| old.status)
    }
}
