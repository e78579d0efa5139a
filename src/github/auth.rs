//! GitHub App authentication.
//!
//! The app proves who it is with a short-lived RS256 assertion, then trades
//! that assertion for an installation token scoped to one installation or
//! one repository. Installation tokens are optionally cached per scope and
//! refreshed lazily once they get close to expiry.

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::github::error::AuthError;
use crate::github::jwt::{self, AppIdentity, IdentityAssertion};
use crate::github::models::{InstallationTokenResponse, RepoInstallationResponse};

pub const USER_AGENT: &str = "fuse-review-bot";
pub const API_VERSION: &str = "2022-11-28";

/// Cached tokens this close to expiry are treated as stale.
const REFRESH_MARGIN_SECS: i64 = 60;

/// What an installation token is minted for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Installation(u64),
    Repository { owner: String, repo: String },
}

impl TokenScope {
    pub fn repository(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        TokenScope::Repository {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenScope::Installation(id) => write!(f, "installation {id}"),
            TokenScope::Repository { owner, repo } => write!(f, "{owner}/{repo}"),
        }
    }
}

#[derive(Clone)]
pub struct InstallationCredential {
    pub scope: TokenScope,
    pub expires_at: DateTime<Utc>,
    token: String,
}

impl InstallationCredential {
    pub fn new(scope: TokenScope, token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            scope,
            expires_at,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `Authorization` header value for scoped API calls.
    pub fn authorization(&self) -> String {
        format!("token {}", self.token)
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

impl fmt::Debug for InstallationCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationCredential")
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

pub struct AppAuthenticator {
    client: Client,
    api_base: String,
    identity: AppIdentity,
    backdate: Duration,
    cache: Option<Mutex<HashMap<TokenScope, InstallationCredential>>>,
}

impl AppAuthenticator {
    /// `backdate_secs` is clamped to `0..=60`. With `cache_tokens` off every
    /// call to [`installation_token`](Self::installation_token) mints a new token.
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        identity: AppIdentity,
        backdate_secs: i64,
        cache_tokens: bool,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            identity,
            backdate: Duration::seconds(backdate_secs.clamp(0, jwt::MAX_BACKDATE_SECS)),
            cache: cache_tokens.then(|| Mutex::new(HashMap::new())),
        }
    }

    pub fn app_id(&self) -> u64 {
        self.identity.app_id
    }

    /// Signs a fresh assertion, backdated by the configured skew allowance.
    pub fn build_assertion(&self) -> Result<IdentityAssertion, AuthError> {
        jwt::build_assertion(&self.identity, Utc::now() - self.backdate)
    }

    /// Returns a usable token for `scope`, from the cache when one is still
    /// fresh, otherwise by minting a new one.
    pub async fn installation_token(
        &self,
        scope: &TokenScope,
    ) -> Result<InstallationCredential, AuthError> {
        if let Some(cached) = self.cached(scope) {
            debug!(%scope, "Using cached installation token");
            return Ok(cached);
        }

        let assertion = self.build_assertion()?;
        let credential = self
            .exchange_for_installation_credential(&assertion, scope)
            .await?;

        if let Some(cache) = &self.cache {
            let mut guard = cache.lock().unwrap_or_else(|e| e.into_inner());
            guard.insert(scope.clone(), credential.clone());
        }
        Ok(credential)
    }

    /// Trades `assertion` for an installation token scoped to `scope`.
    ///
    /// A repository scope is first resolved to its installation, and the
    /// minted token is restricted to that single repository.
    pub async fn exchange_for_installation_credential(
        &self,
        assertion: &IdentityAssertion,
        scope: &TokenScope,
    ) -> Result<InstallationCredential, AuthError> {
        let (installation_id, body) = match scope {
            TokenScope::Installation(id) => (*id, json!({})),
            TokenScope::Repository { owner, repo } => {
                let id = self
                    .resolve_target_installation(assertion, owner, repo)
                    .await?;
                (id, json!({ "repositories": [repo] }))
            }
        };

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, installation_id
        );
        let res = self
            .app_request(self.client.post(&url), assertion)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let err = exchange_error(res).await;
            warn!(%scope, installation_id, error = %err, "Installation token exchange rejected");
            return Err(err);
        }

        let minted: InstallationTokenResponse = res.json().await?;
        info!(%scope, installation_id, expires_at = %minted.expires_at, "Minted installation token");

        Ok(InstallationCredential {
            scope: scope.clone(),
            expires_at: minted.expires_at,
            token: minted.token,
        })
    }

    /// Finds the installation of this app that covers `owner/repo`.
    pub async fn resolve_target_installation(
        &self,
        assertion: &IdentityAssertion,
        owner: &str,
        repo: &str,
    ) -> Result<u64, AuthError> {
        let url = format!("{}/repos/{}/{}/installation", self.api_base, owner, repo);
        let res = self
            .app_request(self.client.get(&url), assertion)
            .send()
            .await?;

        match res.status() {
            s if s.is_success() => {
                let installation: RepoInstallationResponse = res.json().await?;
                debug!(owner, repo, installation_id = installation.id, "Resolved installation");
                Ok(installation.id)
            }
            StatusCode::NOT_FOUND => Err(AuthError::InstallationNotFound {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(exchange_error(res).await),
        }
    }

    fn cached(&self, scope: &TokenScope) -> Option<InstallationCredential> {
        let cache = self.cache.as_ref()?;
        let mut guard = cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(credential) = guard.get(scope) {
            if credential.is_fresh(Utc::now()) {
                return Some(credential.clone());
            }
        }
        guard.remove(scope);
        None
    }

    fn app_request(&self, builder: RequestBuilder, assertion: &IdentityAssertion) -> RequestBuilder {
        builder
            .bearer_auth(assertion.token())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }
}

async fn exchange_error(res: Response) -> AuthError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    AuthError::Exchange { status, body }
}
