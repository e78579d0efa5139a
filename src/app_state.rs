use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, DispatchMode};
use crate::events::classifier::EventClassifier;
use crate::github::auth::AppAuthenticator;
use crate::github::jwt::AppIdentity;
use crate::jobs::handlers::{PrDiffHandler, PushHandler};
use crate::jobs::queue::{JobKind, JobQueue, JobWorker};

pub struct AppState {
    pub client: Client,
    pub auth: Arc<AppAuthenticator>,
    pub api_base: String,
    pub webhook_secret: String,
    pub target_username: String,
    pub dispatch_mode: DispatchMode,
    /// Upper bound on the whole inline approval (lookup, exchange, approve).
    pub inline_timeout: Duration,
    pub classifier: EventClassifier,
    pub jobs: JobQueue,
}

/// Builds the shared state and the worker that drains its job queue.
/// The caller owns the worker and decides where it runs.
pub fn build_app_state(
    config: &Config,
) -> Result<(AppState, JobWorker), Box<dyn std::error::Error + Send + Sync>> {
    let client = Client::builder().timeout(config.http_timeout).build()?;

    let identity = AppIdentity::from_key_material(config.app_id, &config.private_key)?;
    let auth = Arc::new(AppAuthenticator::new(
        client.clone(),
        config.api_base.clone(),
        identity,
        config.jwt_backdate_secs,
        config.token_cache,
    ));

    let (jobs, worker) = JobQueue::new();
    let worker = worker
        .with_handler(
            JobKind::PrDiff,
            Arc::new(PrDiffHandler::new(
                client.clone(),
                config.api_base.clone(),
                auth.clone(),
            )),
        )
        .with_handler(JobKind::Push, Arc::new(PushHandler));

    let state = AppState {
        client,
        auth,
        api_base: config.api_base.clone(),
        webhook_secret: config.webhook_secret.clone(),
        target_username: config.target_username.clone(),
        dispatch_mode: config.dispatch_mode,
        inline_timeout: config.http_timeout,
        // Only the queued personality tracks PR lifecycle, so only it cares about `closed`.
        classifier: EventClassifier::new(config.dispatch_mode == DispatchMode::Queued),
        jobs,
    };
    Ok((state, worker))
}
