use clap::Parser;

pub const DEFAULT_DELAY_SECS: u64 = 1;

/// Probe a fixed set of URLs and export their availability and latency as
/// Prometheus gauges.
#[derive(Parser, Debug)]
#[command(name = "uptime-probe")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    RUST_LOG    Log filter (default: info)

FILES:
    config.json    Optional; metrics_port, timeout_ms, on_transport_error"#)]
pub struct Cli {
    /// Seconds to wait between consecutive checks (0 means the default)
    pub delay: Option<u64>,
}

impl Cli {
    pub fn delay_secs(&self) -> u64 {
        effective_delay(self.delay)
    }
}

/// A missing or zero delay falls back to the default.
pub fn effective_delay(delay: Option<u64>) -> u64 {
    match delay {
        Some(0) | None => DEFAULT_DELAY_SECS,
        Some(secs) => secs,
    }
}
