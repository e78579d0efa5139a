use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app_state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn webhook_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "github-webhook",
        "configured": {
            "app_id": state.auth.app_id() != 0,
            "webhook_secret": !state.webhook_secret.is_empty(),
        }
    }))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "GitHub Webhook API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /webhook": "GitHub webhook endpoint",
            "POST /github/webhook": "GitHub webhook endpoint",
            "GET /health": "Health check",
            "GET /github/webhook/health": "Webhook configuration check"
        }
    }))
}
