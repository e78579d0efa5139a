use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Repository {
    pub id: u64,
    pub full_name: String,
}

impl Repository {
    /// Splits `owner/name`. Returns `None` when the full name has no slash.
    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.full_name.split_once('/')
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Installation {
    pub id: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PullRequest {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// `pull_request` delivery.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: u64,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub installation: Option<Installation>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PushCommit {
    pub id: String,
}

/// `push` delivery.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    pub repository: Repository,
    #[serde(default)]
    pub installation: Option<Installation>,
}

/// A decoded delivery, one variant per event kind we understand.
#[derive(Debug, Clone)]
pub enum WebhookPayload {
    PullRequest(PullRequestEvent),
    Push(PushEvent),
    /// Any other event type, or a delivery without an event header.
    Other { event: Option<String> },
}

#[derive(Serialize, Debug)]
pub struct Claims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Body of `POST /app/installations/{id}/access_tokens`.
#[derive(Deserialize, Debug)]
pub struct InstallationTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Body of `GET /repos/{owner}/{repo}/installation`.
#[derive(Deserialize, Debug)]
pub struct RepoInstallationResponse {
    pub id: u64,
}
