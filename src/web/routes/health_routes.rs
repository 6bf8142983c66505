use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

use crate::version::VERSION;
use crate::web::AppState;

async fn health_check_handler(State(app_state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match app_state.channel_service.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "version": VERSION })),
        ),
        Err(e) => {
            warn!(error = %e, "Health check failed.");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "version": VERSION })),
            )
        }
    }
}

pub fn create_health_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check_handler))
}
