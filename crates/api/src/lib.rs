//! `api` crate — HTTP REST API layer.
//!
//! Exposes:
//!   GET    /api/v1/workflows
//!   POST   /api/v1/workflows
//!   POST   /api/v1/workflows/import
//!   GET    /api/v1/workflows/:id
//!   PUT    /api/v1/workflows/:id
//!   DELETE /api/v1/workflows/:id
//!   POST   /api/v1/workflows/:id/{activate,pause,archive}
//!   GET    /api/v1/workflows/:id/export
//!   GET    /api/v1/workflows/:id/runs
//!   GET    /api/v1/templates[?category=HR]
//!   GET    /api/v1/templates/categories
//!   POST   /api/v1/templates/:id/instantiate
//!   POST   /api/v1/events
//!   GET    /api/v1/runs/:id
//!   POST   /api/v1/runs/:id/cancel

pub mod error;
pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use engine::{TemplateRegistry, WorkflowEngine, WorkflowManager};
use queue::EventSender;

pub use error::ApiError;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub manager: WorkflowManager,
    pub templates: Arc<TemplateRegistry>,
    pub engine: WorkflowEngine,
    pub events: EventSender,
}

pub fn router(state: AppState) -> Router {
    use handlers::{events, runs, templates, workflows};

    Router::new()
        .route("/api/v1/workflows", get(workflows::list).post(workflows::create))
        .route("/api/v1/workflows/import", post(workflows::import))
        .route(
            "/api/v1/workflows/:id",
            get(workflows::get).put(workflows::save).delete(workflows::delete),
        )
        .route("/api/v1/workflows/:id/activate", post(workflows::activate))
        .route("/api/v1/workflows/:id/pause", post(workflows::pause))
        .route("/api/v1/workflows/:id/archive", post(workflows::archive))
        .route("/api/v1/workflows/:id/export", get(workflows::export))
        .route("/api/v1/workflows/:id/runs", get(runs::list))
        .route("/api/v1/templates", get(templates::list))
        .route("/api/v1/templates/categories", get(templates::categories))
        .route("/api/v1/templates/:id/instantiate", post(templates::instantiate))
        .route("/api/v1/events", post(events::publish))
        .route("/api/v1/runs/:id", get(runs::get))
        .route("/api/v1/runs/:id/cancel", post(runs::cancel))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `bind` until `shutdown` resolves.
pub async fn serve(
    bind: &str,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "api listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
