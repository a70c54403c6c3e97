//! HTTP surface of the monitor: the dashboard page, the JSON API, and the
//! Prometheus endpoint.
//!
//! Handlers only delegate to the controller and the chart renderer. Nothing
//! here returns an error status for missing data: an empty series is empty
//! arrays, zero currents and a null chart.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::chart::ChartRenderer;
use crate::config::ServerConfig;
use crate::controller::{MonitorController, MonitorStatus};
use crate::error::{ChartError, MonitorError, Result};
use crate::series::SeriesStore;

const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<MonitorController>,
    pub renderer: Arc<ChartRenderer>,
}

impl AppState {
    pub fn new(controller: Arc<MonitorController>, renderer: ChartRenderer) -> Self {
        Self {
            controller,
            renderer: Arc::new(renderer),
        }
    }
}

/// Body of `GET /api/data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse {
    pub heart_rate: Vec<f64>,
    pub spo2: Vec<f64>,
    pub timestamps: Vec<String>,
    pub current_hr: f64,
    pub current_spo2: f64,
}

impl DataResponse {
    pub fn from_series(series: &SeriesStore) -> Self {
        let latest = series.latest();
        Self {
            heart_rate: series.iter().map(|s| s.heart_rate).collect(),
            spo2: series.iter().map(|s| s.spo2).collect(),
            timestamps: series.iter().map(|s| s.time_label()).collect(),
            current_hr: latest.map_or(0.0, |s| s.heart_rate),
            current_spo2: latest.map_or(0.0, |s| s.spo2),
        }
    }
}

/// Body of `GET /api/chart`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartResponse {
    pub chart: Option<String>,
}

/// Body of the pause and resume endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub status: String,
}

/// HTTP server for the dashboard
pub struct ApiServer {
    state: AppState,
    config: ServerConfig,
}

impl ApiServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr: SocketAddr = listener.local_addr()?;
        info!("Serving vitals dashboard on http://{}", local_addr);

        let app = create_router(self.state, &self.config);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with tracing, timeout and CORS layers
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = if config.enable_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(dashboard))
        .route("/api/data", get(get_data))
        .route("/api/chart", get(get_chart))
        .route("/api/pause", post(pause_monitoring))
        .route("/api/resume", post(resume_monitoring))
        .route("/api/status", get(get_status))
        .route("/api/health", get(health_check))
        .route("/metrics", get(export_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.request_timeout()))
                .layer(cors),
        )
        .with_state(state)
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn get_data(State(state): State<AppState>) -> Json<DataResponse> {
    Json(state.controller.with_series(DataResponse::from_series).await)
}

/// Chart endpoint: rendering is best-effort and any failure becomes `null`
async fn get_chart(State(state): State<AppState>) -> Json<ChartResponse> {
    let series = state.controller.snapshot().await;
    if series.is_empty() {
        return Json(ChartResponse { chart: None });
    }

    let renderer = state.renderer.clone();
    let started = Instant::now();
    let rendered = tokio::task::spawn_blocking(move || renderer.render_base64(&series))
        .await
        .unwrap_or_else(|e| Err(ChartError::TaskFailed { reason: e.to_string() }));

    let metrics = state.controller.metrics();
    let chart = match rendered {
        Ok(chart) => {
            metrics.record_chart_render(started.elapsed());
            chart
        }
        Err(e) => {
            let e = MonitorError::from(e);
            error!(category = e.category(), "Error generating chart: {}", e);
            metrics.record_chart_failure();
            None
        }
    };

    Json(ChartResponse { chart })
}

async fn pause_monitoring(State(state): State<AppState>) -> Json<ControlResponse> {
    state.controller.pause().await;
    Json(ControlResponse {
        success: true,
        status: "paused".to_string(),
    })
}

async fn resume_monitoring(State(state): State<AppState>) -> Json<ControlResponse> {
    state.controller.resume().await;
    Json(ControlResponse {
        success: true,
        status: "resumed".to_string(),
    })
}

async fn get_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    Json(state.controller.status().await)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.controller.stats().await;
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": timestamp,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "vitals-monitor",
        "ticks": stats.ticks,
        "samples": stats.samples_appended,
    }))
}

async fn export_metrics(State(state): State<AppState>) -> Response {
    let metrics = state.controller.metrics();
    if !metrics.is_enabled() {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics.export() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Sample;
    use chrono::{Local, TimeZone};

    #[test]
    fn test_data_response_empty_series() {
        let response = DataResponse::from_series(&SeriesStore::new(10));
        assert!(response.heart_rate.is_empty());
        assert!(response.spo2.is_empty());
        assert!(response.timestamps.is_empty());
        assert_eq!(response.current_hr, 0.0);
        assert_eq!(response.current_spo2, 0.0);
    }

    #[test]
    fn test_data_response_columns_line_up() {
        let mut store = SeriesStore::new(10);
        let base = Local.with_ymd_and_hms(2024, 3, 1, 9, 15, 0).unwrap();
        store.append(Sample::new(base, 72.0, 97.0));
        store.append(Sample::new(base + chrono::Duration::seconds(1), 75.5, 98.5));

        let response = DataResponse::from_series(&store);
        assert_eq!(response.heart_rate, vec![72.0, 75.5]);
        assert_eq!(response.spo2, vec![97.0, 98.5]);
        assert_eq!(response.timestamps, vec!["09:15:00", "09:15:01"]);
        assert_eq!(response.current_hr, 75.5);
        assert_eq!(response.current_spo2, 98.5);
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(DataResponse::from_series(&SeriesStore::new(1))).unwrap();
        for field in ["heart_rate", "spo2", "timestamps", "current_hr", "current_spo2"] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }

        let chart = serde_json::to_value(ChartResponse { chart: None }).unwrap();
        assert_eq!(chart, serde_json::json!({ "chart": null }));
    }
}
