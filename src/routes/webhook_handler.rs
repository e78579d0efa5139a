//! `POST /webhook` (and `/github/webhook`).
//!
//! Order matters: the signature is checked on the raw body before anything
//! is parsed, and nothing is enqueued or approved for a delivery that failed
//! verification.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::config::DispatchMode;
use crate::events::classifier::{find_mention, mention_text, parse_payload, Action, Classification};
use crate::github::auth::TokenScope;
use crate::github::error::{AuthError, GitHubApiError};
use crate::github::models::PullRequestEvent;
use crate::github::reviews::approve_pull_request;
use crate::jobs::queue::{Job, JobPayload};
use crate::utils::verify_signature;

const HEADER_SIGNATURE: &str = "x-hub-signature-256";
const HEADER_EVENT: &str = "x-github-event";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Action(#[from] GitHubApiError),

    #[error("inline action timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            WebhookError::InvalidSignature => (StatusCode::UNAUTHORIZED, self.to_string()),
            WebhookError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            WebhookError::Auth(_) | WebhookError::Action(_) | WebhookError::Timeout(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let signature = header_str(&headers, HEADER_SIGNATURE).unwrap_or_default();
    if !verify_signature(&body, signature, state.webhook_secret.as_bytes()) {
        warn!(has_signature = !signature.is_empty(), "Rejected webhook with invalid signature");
        return Err(WebhookError::InvalidSignature);
    }

    // A missing event header is not an error; the delivery is just ignored.
    let event_type = header_str(&headers, HEADER_EVENT);
    debug!(event = event_type.unwrap_or("<none>"), bytes = body.len(), "Verified webhook");

    let payload = parse_payload(event_type, &body).map_err(|e| {
        warn!(event = event_type.unwrap_or("<none>"), error = %e, "Malformed webhook payload");
        WebhookError::MalformedPayload(e.to_string())
    })?;

    match state.classifier.classify(payload) {
        Classification::Ignore { reason } => {
            info!(event = event_type.unwrap_or("<none>"), %reason, "Ignoring webhook");
        }
        Classification::Act(action) => {
            if let Err(e) = dispatch(&state, action).await {
                error!(error = %e, "Failed to handle webhook");
                return Err(e);
            }
        }
    }

    Ok(Json(json!({ "status": "success", "event": event_type })))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn dispatch(state: &AppState, action: Action) -> Result<(), WebhookError> {
    match (state.dispatch_mode, action) {
        (DispatchMode::Inline, Action::PullRequest { event, .. }) => {
            // The request is held open for the whole round trip, so bound it as one unit.
            tokio::time::timeout(state.inline_timeout, approve_if_mentioned(state, &event))
                .await
                .map_err(|_| WebhookError::Timeout(state.inline_timeout))?
        }
        // Pushes always go through the queue; there is nothing to do inline.
        (_, action) => {
            state.jobs.enqueue(job_for(action));
            Ok(())
        }
    }
}

fn job_for(action: Action) -> Job {
    let payload = match action {
        Action::PullRequest { action, event } => JobPayload::PrDiff {
            repository_id: event.repository.id,
            repo_full_name: event.repository.full_name,
            pull_request_id: event.pull_request.id,
            pr_number: event.number,
            action: action.as_str().to_string(),
        },
        Action::PushToDefault(event) => JobPayload::Push {
            repository_id: event.repository.id,
            repo_full_name: event.repository.full_name,
            git_ref: event.git_ref,
            head_sha: event.after,
            commits_count: event.commits.len(),
        },
    };
    Job::new(payload)
}

/// Auto-approve personality: approve the PR right away when the bot is mentioned.
async fn approve_if_mentioned(
    state: &AppState,
    event: &PullRequestEvent,
) -> Result<(), WebhookError> {
    let pr_number = event.number;
    let repo_full_name = &event.repository.full_name;

    let Some(pattern) = find_mention(&mention_text(event), &state.target_username) else {
        info!(repo = %repo_full_name, pr_number, "No mention found, not approving");
        return Ok(());
    };

    let (owner, repo) = event.repository.owner_and_name().ok_or_else(|| {
        WebhookError::MalformedPayload(format!("repository name '{repo_full_name}' has no owner"))
    })?;

    info!(repo = %repo_full_name, pr_number, %pattern, "Mention found, approving");
    let credential = state
        .auth
        .installation_token(&TokenScope::repository(owner, repo))
        .await?;
    approve_pull_request(&state.client, &state.api_base, &credential, owner, repo, pr_number)
        .await?;
    Ok(())
}
