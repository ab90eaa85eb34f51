use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use uptime_probe::api::{self, AppState};
use uptime_probe::cli::Cli;
use uptime_probe::config;
use uptime_probe::engine::Monitor;
use uptime_probe::metrics::ProbeMetrics;
use uptime_probe::shutdown::Shutdown;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config = config::load("config.json")?;
    let metrics = Arc::new(ProbeMetrics::new()?);
    let monitor = Monitor::new(config.clone(), cli.delay_secs(), Arc::clone(&metrics))?;

    let listener = api::bind(config.metrics_port).await?;
    let state = AppState {
        metrics,
        monitor_state: monitor.state.clone(),
    };
    let mut server = tokio::spawn(api::serve(listener, state));

    let shutdown = Shutdown::new();
    let _ctrl_c = shutdown.trigger_on(signal::ctrl_c());

    tokio::select! {
        res = monitor.run(&shutdown) => res?,
        res = &mut server => res??,
    }

    server.abort();
    Ok(())
}
