//! HTTP API for the sidecar.
//!
//! Exposes process liveness, ring membership, ACL listing and scheduler
//! control over REST.

mod errors;
mod handlers;
mod responses;

pub use errors::ApiError;
pub use handlers::ApiState;
pub use responses::*;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;

/// Build the API router with all endpoints.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health))
        // Node state
        .route("/api/process", get(handlers::process_status))
        .route("/api/ring", get(handlers::ring_status))
        .route("/api/acl", get(handlers::list_acl))
        // Scheduler control
        .route("/api/scheduler/state", get(handlers::get_scheduler_state))
        .route("/api/scheduler/pause", post(handlers::pause_scheduler))
        .route("/api/scheduler/resume", post(handlers::resume_scheduler))
        // Tasks
        .route("/api/tasks", get(handlers::list_tasks))
        .route("/api/tasks/{name}/trigger", post(handlers::trigger_task))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start the API server.
///
/// Spawns the server and returns a handle to its task. The server runs
/// until the task is aborted or the process exits.
pub async fn start_server(
    config: &ApiConfig,
    state: ApiState,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let router = build_router(state);

    let listener = TcpListener::bind(config.bind_address()).await?;
    tracing::info!("API server listening on http://{}", listener.local_addr()?);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(handle)
}
