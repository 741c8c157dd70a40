//! Engagement Monitoring Server
//!
//! Hosts the signaling relay, the alert output stream, and read-only views
//! of persisted samples and alerts.

use alerting::{AlertChannel, ChannelOutput, MqttPushChannel, ToneChannel, VibrationChannel, VisualChannel};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    routing::post,
    Json, Router,
};
use engagement::FeatureExtractor;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pipeline::{MonitoringSession, PipelineError};
use serde::Serialize;
use signaling::SignalingRelay;
use std::net::SocketAddr;
use std::sync::Arc;
use storage::Repository;
use tokio::sync::{broadcast, RwLock};
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use video_source::FrameSource;

pub mod config;
pub mod rate_limit;
mod routes;

use crate::config::AppConfig;
use crate::rate_limit::{create_governor_config, RateLimitConfig};

/// Application state shared across handlers
pub struct AppState {
    pub config: AppConfig,
    /// Sample, alert, and settings store
    pub repository: Arc<Repository>,
    /// The one relay instance owning every signaling room
    pub relay: Arc<SignalingRelay>,
    /// Tone, vibration, and visual outputs fanned out to `/ws/alerts`
    pub alert_outputs: broadcast::Sender<ChannelOutput>,
    /// Process-wide push client, cloned into every session
    pub push: Option<MqttPushChannel>,
    /// Prometheus renderer, if a recorder was installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

pub type SharedState = Arc<RwLock<AppState>>;

impl AppState {
    pub fn new(config: AppConfig, metrics: Option<PrometheusHandle>) -> Self {
        let (alert_outputs, _) = broadcast::channel(config.server.alert_stream_capacity.max(1));
        Self {
            repository: Arc::new(Repository::with_retention(
                config.storage.max_sample_records,
                config.storage.max_alert_records,
            )),
            relay: Arc::new(SignalingRelay::new(config.relay.clone())),
            alert_outputs,
            push: config.push.as_ref().map(MqttPushChannel::connect),
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            config,
        }
    }

    /// Delivery channels for a new session, all feeding this server's outputs
    pub fn alert_channels(&self) -> Vec<Box<dyn AlertChannel>> {
        let mut channels: Vec<Box<dyn AlertChannel>> = vec![
            Box::new(ToneChannel::new(self.alert_outputs.clone())),
            Box::new(VibrationChannel::new(self.alert_outputs.clone())),
            Box::new(VisualChannel::new(self.alert_outputs.clone())),
        ];
        if let Some(push) = &self.push {
            channels.push(Box::new(push.clone()));
        }
        channels
    }

    /// Start a monitoring session persisting into this server's repository
    pub fn start_session<S, E>(
        &self,
        session_id: impl Into<String>,
        source: S,
        extractor: E,
    ) -> Result<MonitoringSession, PipelineError>
    where
        S: FrameSource + 'static,
        E: FeatureExtractor + 'static,
    {
        MonitoringSession::start(
            session_id,
            self.config.session.clone(),
            source,
            extractor,
            self.alert_channels(),
            self.repository.clone(),
        )
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub open_rooms: usize,
    pub sample_count: usize,
    pub alert_count: usize,
}

/// Create the application router.
///
/// With `rate_limit`, REST routes are limited per peer IP and the service
/// must be served with connect info.
pub fn create_router(state: SharedState, rate_limit: Option<&RateLimitConfig>) -> Router {
    let mut rest = Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/rooms", post(routes::rooms::create_room))
        .route("/api/v1/rooms/:room_id", get(routes::rooms::get_room))
        .route(
            "/api/v1/sessions/:session_id/samples",
            get(routes::sessions::get_samples),
        )
        .route(
            "/api/v1/sessions/:session_id/alerts",
            get(routes::alerts::get_alerts),
        )
        .route(
            "/api/v1/sessions/:session_id/alert-settings",
            get(routes::alerts::get_alert_settings).put(routes::alerts::put_alert_settings),
        );

    if let Some(limits) = rate_limit {
        match create_governor_config(limits) {
            Some(config) => rest = rest.layer(GovernorLayer { config }),
            None => warn!("Rate limiting disabled: invalid limits {:?}", limits),
        }
    }

    Router::new()
        .merge(rest)
        .route("/ws/signal", get(routes::signal::signal_socket))
        .route("/ws/alerts", get(routes::stream::alert_socket))
        .route("/metrics", get(metrics_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        open_rooms: state.relay.room_count(),
        sample_count: state.repository.sample_count(),
        alert_count: state.repository.alert_count(),
    })
}

/// Prometheus text exposition
async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging. `LOG_FORMAT=json` selects JSON lines.
pub fn init_logging() {
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true);

    // A subscriber may already be installed, e.g. by an embedding host
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Run the server until it fails
pub async fn run_server(config: AppConfig, metrics: Option<PrometheusHandle>) -> anyhow::Result<()> {
    let addr = config.server.bind_addr();
    let rate_limit = config.rate_limit.clone();
    let state = Arc::new(RwLock::new(AppState::new(config, metrics)));
    let app = create_router(state, Some(&rate_limit));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
