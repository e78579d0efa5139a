use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

use crate::github::auth::{AppAuthenticator, TokenScope};
use crate::github::reviews::fetch_pull_request_diff;
use crate::jobs::queue::{Job, JobError, JobHandler, JobPayload};

/// Fetches the diff of a pull request for downstream analysis.
pub struct PrDiffHandler {
    client: Client,
    api_base: String,
    auth: Arc<AppAuthenticator>,
}

impl PrDiffHandler {
    pub fn new(client: Client, api_base: impl Into<String>, auth: Arc<AppAuthenticator>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            auth,
        }
    }
}

#[async_trait]
impl JobHandler for PrDiffHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let JobPayload::PrDiff {
            repo_full_name,
            pr_number,
            action,
            ..
        } = &job.payload
        else {
            return Err(JobError::Invalid("PR diff handler got a non-PR job".into()));
        };
        let (owner, repo) = repo_full_name
            .split_once('/')
            .ok_or_else(|| JobError::Invalid(format!("bad repository name '{repo_full_name}'")))?;

        let credential = self
            .auth
            .installation_token(&TokenScope::repository(owner, repo))
            .await?;
        let diff = fetch_pull_request_diff(
            &self.client,
            &self.api_base,
            &credential,
            owner,
            repo,
            *pr_number,
        )
        .await?;

        let files = diff.lines().filter(|l| l.starts_with("diff --git ")).count();
        info!(%action, files, bytes = diff.len(), "Fetched pull request diff");
        Ok(())
    }
}

/// Records pushes to the default branch for repository ingestion.
pub struct PushHandler;

#[async_trait]
impl JobHandler for PushHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let JobPayload::Push {
            head_sha,
            commits_count,
            ..
        } = &job.payload
        else {
            return Err(JobError::Invalid("push handler got a non-push job".into()));
        };

        info!(
            head_sha = head_sha.as_deref().unwrap_or("unknown"),
            commits_count, "Push to default branch ready for ingestion"
        );
        Ok(())
    }
}
