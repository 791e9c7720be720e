//! Application startup and lifecycle management.

use crate::config::{FieldTable, ReconciliationConfig};
use crate::handlers;
use crate::jobs::JobManager;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ReconciliationConfig>,
    pub field_table: Arc<FieldTable>,
    pub manager: JobManager,
}

/// Build the HTTP router over the given state.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.ingest.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/upload", post(handlers::upload_file))
        .route("/reconcile", post(handlers::reconcile_files))
        .route("/jobs/:id", get(handlers::get_job_status))
        .route("/jobs/:id/results", get(handlers::get_job_results))
        .route("/ws", get(handlers::progress_socket))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Load the field table, start the job sweeper and bind the listener.
    pub async fn build(config: ReconciliationConfig) -> Result<Self, AppError> {
        let field_table = config.load_field_table().map_err(|e| {
            tracing::error!(error = %e, "Failed to load provider field table");
            e
        })?;
        tracing::info!(
            profiles = ?field_table.profiles().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "Provider field table loaded"
        );

        let manager = JobManager::new(&config.jobs);
        manager.spawn_sweeper(config.jobs.sweep_interval);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();
        tracing::info!(port, "Reconciliation service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState {
                config: Arc::new(config),
                field_table: Arc::new(field_table),
                manager,
            },
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a handle to the job manager.
    pub fn manager(&self) -> &JobManager {
        &self.state.manager
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = %self.state.config.service_name,
            version = %self.state.config.service_version,
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router(self.state)).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
