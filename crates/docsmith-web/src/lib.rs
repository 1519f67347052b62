//! HTTP surface for the documentation pipeline.
//!
//! Handlers enqueue background work and return immediately; nothing here
//! blocks on a generation run. The SSE endpoint is the primary progress
//! channel, with the polled status endpoint as the fallback for clients
//! that cannot hold a stream open.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use docsmith_core::Config;
use docsmith_engine::{Orchestrator, StatusReconciler};
use docsmith_github::SourceProvider;
use docsmith_store::Database;

mod auth;
mod error;
mod routes;
mod sse;
mod webhook;

pub use auth::AuthUser;
pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub provider: Arc<dyn SourceProvider>,
    pub orchestrator: Arc<Orchestrator>,
    pub reconciler: Arc<StatusReconciler>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        provider: Arc<dyn SourceProvider>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        let reconciler = Arc::new(StatusReconciler::new(db.clone()));
        Self {
            config,
            db,
            provider,
            orchestrator,
            reconciler,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/user/repos", get(routes::user_repos))
        .route("/repos", get(routes::list_repos))
        .route("/repos/select", post(routes::select_repo))
        .route("/repos/{repo_id}/status", get(routes::repo_status))
        .route("/sse", get(sse::stream))
        .route("/webhook", post(webhook::receive))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
