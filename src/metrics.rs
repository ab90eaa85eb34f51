//! Probe gauges backed by an owned Prometheus registry.
//!
//! The registry starts empty: no process or default collectors are
//! registered, so a scrape only carries the two probe families. Samples are
//! written from the gathered families so non-finite values come out as
//! `+Inf`, `-Inf` and `NaN`.

use anyhow::{bail, Context, Result};
use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::fmt::Write;

use crate::models::CheckResult;

pub const SERVICE_UP: &str = "service_up";
pub const SERVICE_LATENCY: &str = "service_latency_ms";

pub struct ProbeMetrics {
    registry: Registry,
    service_up: GaugeVec,
    service_latency: GaugeVec,
}

impl ProbeMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let service_up = GaugeVec::new(Opts::new(SERVICE_UP, "URL Up"), &["url"])
            .context("Failed to create service_up gauge")?;
        registry
            .register(Box::new(service_up.clone()))
            .context("Failed to register service_up gauge")?;

        let service_latency = GaugeVec::new(Opts::new(SERVICE_LATENCY, "Response Time"), &["url"])
            .context("Failed to create service_latency_ms gauge")?;
        registry
            .register(Box::new(service_latency.clone()))
            .context("Failed to register service_latency_ms gauge")?;

        Ok(Self {
            registry,
            service_up,
            service_latency,
        })
    }

    /// Overwrites both gauges for the result's URL.
    pub fn record(&self, result: &CheckResult) {
        let labels = [result.url.as_str()];
        self.service_up
            .with_label_values(&labels)
            .set(result.status.as_gauge());
        self.service_latency
            .with_label_values(&labels)
            .set(result.latency_ms);
    }

    /// Current `service_up` value for the URL, if it has been recorded.
    pub fn up(&self, url: &str) -> Option<f64> {
        self.sample(SERVICE_UP, url)
    }

    /// Current `service_latency_ms` value for the URL, if it has been recorded.
    pub fn latency_ms(&self, url: &str) -> Option<f64> {
        self.sample(SERVICE_LATENCY, url)
    }

    // Reads through `gather` so an unknown URL never creates a series.
    fn sample(&self, name: &str, url: &str) -> Option<f64> {
        let families = self.registry.gather();
        families
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|label| label.get_name() == "url" && label.get_value() == url)
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    /// Renders every registered family in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        for family in self.registry.gather() {
            write_family(&family, &mut out)?;
        }
        Ok(out)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

fn write_family(family: &MetricFamily, out: &mut String) -> Result<()> {
    if family.get_metric().is_empty() {
        return Ok(());
    }
    let name = family.get_name();
    let kind = match family.get_field_type() {
        MetricType::GAUGE => "gauge",
        MetricType::COUNTER => "counter",
        other => bail!("Unsupported metric type {:?} for {}", other, name),
    };

    writeln!(out, "# HELP {} {}", name, escape_help(family.get_help()))?;
    writeln!(out, "# TYPE {} {}", name, kind)?;
    for metric in family.get_metric() {
        let value = match family.get_field_type() {
            MetricType::COUNTER => metric.get_counter().get_value(),
            _ => metric.get_gauge().get_value(),
        };
        let label_str = metric
            .get_label()
            .iter()
            .map(|l| format!("{}=\"{}\"", l.get_name(), escape_label(l.get_value())))
            .collect::<Vec<_>>()
            .join(",");
        if label_str.is_empty() {
            writeln!(out, "{} {}", name, format_value(value))?;
        } else {
            writeln!(out, "{}{{{}}} {}", name, label_str, format_value(value))?;
        }
    }
    Ok(())
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use chrono::Utc;

    fn result(url: &str, status: Status, latency_ms: f64) -> CheckResult {
        CheckResult {
            url: url.into(),
            timestamp: Utc::now(),
            status,
            status_code: None,
            latency_ms,
            message: String::new(),
        }
    }

    #[test]
    fn empty_registry_renders_nothing() {
        let metrics = ProbeMetrics::new().unwrap();
        assert_eq!(metrics.render().unwrap(), "");
    }

    #[test]
    fn record_overwrites_previous_values() {
        let metrics = ProbeMetrics::new().unwrap();
        metrics.record(&result("http://a", Status::Up, 12.5));
        metrics.record(&result("http://a", Status::Down, f64::INFINITY));

        assert_eq!(metrics.up("http://a"), Some(0.0));
        assert_eq!(metrics.latency_ms("http://a"), Some(f64::INFINITY));
    }

    #[test]
    fn reading_unknown_url_creates_no_series() {
        let metrics = ProbeMetrics::new().unwrap();
        metrics.record(&result("http://a", Status::Up, 3.0));

        assert_eq!(metrics.up("http://never-checked"), None);
        assert_eq!(metrics.latency_ms("http://never-checked"), None);

        let text = metrics.render().unwrap();
        assert!(!text.contains("never-checked"), "{text}");
        assert_eq!(text.matches("service_up{").count(), 1);
    }

    #[test]
    fn render_uses_exposition_format() {
        let metrics = ProbeMetrics::new().unwrap();
        metrics.record(&result("http://a", Status::Up, 12.5));
        metrics.record(&result("http://b", Status::Down, f64::INFINITY));

        let text = metrics.render().unwrap();
        assert!(text.contains("# HELP service_up URL Up"));
        assert!(text.contains("# TYPE service_up gauge"));
        assert!(text.contains("# TYPE service_latency_ms gauge"));
        assert!(text.contains(r#"service_up{url="http://a"} 1"#));
        assert!(text.contains(r#"service_up{url="http://b"} 0"#));
        assert!(text.contains(r#"service_latency_ms{url="http://a"} 12.5"#));
        assert!(text
            .lines()
            .any(|line| line == r#"service_latency_ms{url="http://b"} +Inf"#));
        assert!(!text.contains(" inf"));
        assert!(!text.contains("process_"));
    }

    #[test]
    fn non_finite_and_escaped_values() {
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(0.25), "0.25");
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
