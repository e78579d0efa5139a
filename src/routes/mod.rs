pub mod health;
pub mod webhook_handler;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::app_state::AppState;
use health::{health, root, webhook_health};
use webhook_handler::webhook_handler;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/github/webhook", post(webhook_handler))
        .route("/github/webhook/health", get(webhook_health))
        .route("/health", get(health))
        .route("/", get(root))
        .with_state(state)
}
