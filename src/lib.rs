//! Minimal uptime probe.
//!
//! A single loop GETs a fixed list of URLs one after another, classifies each
//! as up (HTTP 200) or down, and publishes `service_up{url}` and
//! `service_latency_ms{url}` gauges on a Prometheus scrape endpoint.

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod models;
pub mod probe;
pub mod shutdown;
