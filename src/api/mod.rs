//! Superficie HTTP (axum) del ciclo de vida de runs.
//!
//! - `POST /workflow/runs`: arma la selección (uploads + vault) y crea el run.
//! - `POST /workflow/execute`: ejecuta un run en `initializing`.
//! - `GET /workflow/runs/:id`: run con sus documentos.
use std::sync::Arc;

use advisor_core::RunLifecycleManager;
use advisor_domain::{Notifier, VaultDirectory};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

mod runs;

pub use runs::{CreateRunBody, UploadBody};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RunLifecycleManager>,
    pub vault: Arc<dyn VaultDirectory>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(manager: Arc<RunLifecycleManager>, vault: Arc<dyn VaultDirectory>, notifier: Arc<dyn Notifier>) -> Self {
        Self { manager,
               vault,
               notifier }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/health", get(health))
                 .route("/workflow/runs", post(runs::create_run))
                 .route("/workflow/runs/:id", get(runs::get_run))
                 .route("/workflow/execute", post(runs::execute_run))
                 .layer(TraceLayer::new_for_http())
                 .with_state(state)
}
