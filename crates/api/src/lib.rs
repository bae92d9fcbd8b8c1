//! Motion Stats API Server
//!
//! REST API over users, devices and their motion samples, with pooled
//! summary statistics per device, per user and across all devices.

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod observability;
mod routes;

pub use config::AppConfig;
pub use error::ApiError;
pub use observability::{init_logging, install_metrics_recorder};

use storage::{seed_if_empty, Repository, SeedOutcome, StoreCounts};

/// Application state shared across handlers
pub struct AppState {
    /// Storage repository
    pub repository: Repository,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus handle, when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state
    pub fn new(repository: Repository, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            repository,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics,
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: ComponentHealth,
    pub counts: Option<StoreCounts>,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub error: Option<String>,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    use routes::{devices, samples, stats, users};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/metrics", get(metrics_handler))
        .route("/api/v1/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/v1/users/:user_id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/v1/usernames/:username", get(users::get_user_by_username))
        .route("/api/v1/users/:user_id/devices", get(users::list_user_devices))
        .route("/api/v1/users/:user_id/stats", get(stats::user_stats))
        .route(
            "/api/v1/users/:user_id/devices/:device_id/stats",
            get(stats::user_device_stats),
        )
        .route(
            "/api/v1/devices",
            get(devices::list_devices).post(devices::create_device),
        )
        .route(
            "/api/v1/devices/:device_id",
            get(devices::get_device)
                .put(devices::update_device)
                .delete(devices::delete_device),
        )
        .route(
            "/api/v1/devices/:device_id/stats",
            get(samples::list_samples)
                .post(samples::create_sample)
                .delete(samples::delete_samples),
        )
        .route(
            "/api/v1/devices/:device_id/stats/summary",
            get(stats::device_summary),
        )
        .route("/api/v1/stats/devices", get(stats::all_devices_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let store_check = match state.repository.ping().await {
        Ok(()) => state.repository.counts().await,
        Err(e) => Err(e),
    };

    let (database, counts) = match store_check {
        Ok(counts) => (
            ComponentHealth {
                status: "ok".to_string(),
                error: None,
            },
            Some(counts),
        ),
        Err(e) => {
            warn!("Health check database check failed: {}", e);
            (
                ComponentHealth {
                    status: "error".to_string(),
                    error: Some(e.to_string()),
                },
                None,
            )
        }
    };

    let (status_code, status) = if counts.is_some() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let response = HealthResponse {
        status: status.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database,
        counts,
    };

    (status_code, Json(response))
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Open the store and seed it if it is empty
pub async fn prepare_repository(config: &AppConfig) -> anyhow::Result<Repository> {
    let repository =
        Repository::with_sqlite(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("failed to open database {}", config.database.url))?;

    if config.seed.enabled {
        let outcome = seed_if_empty(&repository, &config.seed.path)
            .await
            .with_context(|| {
                format!("failed to seed from {}", config.seed.path.display())
            })?;
        if let SeedOutcome::Seeded(report) = outcome {
            info!(
                users = report.users,
                devices = report.devices,
                stats = report.stats,
                "Loaded seed data"
            );
        }
    }

    Ok(repository)
}

/// Serve the router on an already bound listener until Ctrl-C
pub async fn serve(listener: TcpListener, state: SharedState) -> std::io::Result<()> {
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the server
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let repository = prepare_repository(&config).await?;

    let metrics = if config.metrics.enabled {
        Some(install_metrics_recorder().context("failed to install metrics recorder")?)
    } else {
        None
    };

    let state = Arc::new(AppState::new(repository.clone(), metrics));
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Starting API server on {}", addr);
    serve(listener, state).await?;

    repository.close().await;
    Ok(())
}
