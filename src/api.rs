use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics::ProbeMetrics;
use crate::models::{CheckResult, MonitorState};

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<ProbeMetrics>,
    pub monitor_state: Arc<Mutex<MonitorState>>,
}

pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Metrics scrape failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<Vec<CheckResult>> {
    let monitor_state = state.monitor_state.lock().await;
    let mut results: Vec<CheckResult> = monitor_state.last_results.values().cloned().collect();
    results.sort_by(|a, b| a.url.cmp(&b.url));
    Json(results)
}

pub async fn health() -> &'static str {
    "OK"
}

/// Every unknown path answers with the metrics payload as well.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/api/status", get(get_status))
        .route("/health", get(health))
        .fallback(get_metrics)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the exporter port. Failure here is fatal to the process.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics port {}", port))
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("Metrics: http://localhost:{}/metrics", addr.port());
    axum::serve(listener, create_router(state))
        .await
        .context("Metrics server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use tower::ServiceExt;

    fn state_with(url: &str, status: Status, latency_ms: f64) -> AppState {
        let metrics = Arc::new(ProbeMetrics::new().unwrap());
        let result = CheckResult {
            url: url.into(),
            timestamp: Utc::now(),
            status,
            status_code: Some(503),
            latency_ms,
            message: "HTTP 503".into(),
        };
        metrics.record(&result);
        let mut monitor_state = MonitorState::default();
        monitor_state.replace(result);
        AppState {
            metrics,
            monitor_state: Arc::new(Mutex::new(monitor_state)),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_exposition_text() {
        let app = create_router(state_with("http://a", Status::Down, 42.0));

        let (status, content_type, body) = get(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert!(body.contains(r#"service_up{url="http://a"} 0"#));
        assert!(body.contains(r#"service_latency_ms{url="http://a"} 42"#));
    }

    #[tokio::test]
    async fn unknown_path_falls_back_to_metrics() {
        let app = create_router(state_with("http://a", Status::Up, 1.0));

        let (status, _, body) = get(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE service_up gauge"));
    }

    #[tokio::test]
    async fn status_endpoint_returns_current_results() {
        let app = create_router(state_with("http://a", Status::Down, f64::INFINITY));

        let (status, _, body) = get(app, "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json[0]["url"], "http://a");
        assert_eq!(json[0]["status"], "Down");
        assert!(json[0]["latency_ms"].is_null());
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = create_router(state_with("http://a", Status::Up, 1.0));
        let (status, _, body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn bind_reports_port_in_use() {
        let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let err = bind(port).await.unwrap_err();
        assert!(err.to_string().contains(&port.to_string()));
    }
}
