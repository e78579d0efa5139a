use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::{info, warn};

use crate::github::auth::{InstallationCredential, API_VERSION, USER_AGENT};
use crate::github::error::GitHubApiError;

fn scoped(builder: RequestBuilder, credential: &InstallationCredential) -> RequestBuilder {
    builder
        .header("Authorization", credential.authorization())
        .header("X-GitHub-Api-Version", API_VERSION)
        .header("User-Agent", USER_AGENT)
}

async fn status_error(res: Response) -> GitHubApiError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    GitHubApiError::Status { status, body }
}

/// Submits an `APPROVE` review. GitHub answers 200 or 201; both count.
pub async fn approve_pull_request(
    client: &Client,
    api_base: &str,
    credential: &InstallationCredential,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> Result<(), GitHubApiError> {
    let url = format!("{}/repos/{}/{}/pulls/{}/reviews", api_base, owner, repo, pr_number);

    let res = scoped(client.post(&url), credential)
        .header("Accept", "application/vnd.github.v3+json")
        .json(&json!({ "event": "APPROVE" }))
        .send()
        .await?;

    match res.status() {
        StatusCode::OK | StatusCode::CREATED => {
            info!(owner, repo, pr_number, "Pull request approved");
            Ok(())
        }
        _ => {
            let err = status_error(res).await;
            warn!(owner, repo, pr_number, error = %err, "Approval rejected");
            Err(err)
        }
    }
}

/// Fetches the unified diff of a pull request.
pub async fn fetch_pull_request_diff(
    client: &Client,
    api_base: &str,
    credential: &InstallationCredential,
    owner: &str,
    repo: &str,
    pr_number: u64,
) -> Result<String, GitHubApiError> {
    let url = format!("{}/repos/{}/{}/pulls/{}", api_base, owner, repo, pr_number);

    let res = scoped(client.get(&url), credential)
        .header("Accept", "application/vnd.github.v3.diff")
        .send()
        .await?;

    if !res.status().is_success() {
        return Err(status_error(res).await);
    }
    Ok(res.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::auth::TokenScope;
    use chrono::{Duration, Utc};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> InstallationCredential {
        InstallationCredential::new(
            TokenScope::repository("octo", "hello"),
            "ghs_test",
            Utc::now() + Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn approval_accepts_200_and_201() {
        for status in [200, 201] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/repos/octo/hello/pulls/7/reviews"))
                .and(header("authorization", "token ghs_test"))
                .and(body_json(json!({ "event": "APPROVE" })))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "id": 1 })))
                .expect(1)
                .mount(&server)
                .await;

            approve_pull_request(&Client::new(), &server.uri(), &credential(), "octo", "hello", 7)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn approval_failure_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octo/hello/pulls/7/reviews"))
            .respond_with(ResponseTemplate::new(422).set_body_string("Can not approve your own pull request"))
            .mount(&server)
            .await;

        let err = approve_pull_request(&Client::new(), &server.uri(), &credential(), "octo", "hello", 7)
            .await
            .unwrap_err();
        assert!(matches!(err, GitHubApiError::Status { status: 422, .. }));
    }

    #[tokio::test]
    async fn diff_is_requested_in_diff_media_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/hello/pulls/7"))
            .and(header("accept", "application/vnd.github.v3.diff"))
            .respond_with(ResponseTemplate::new(200).set_body_string("diff --git a/x b/x\n"))
            .mount(&server)
            .await;

        let diff = fetch_pull_request_diff(&Client::new(), &server.uri(), &credential(), "octo", "hello", 7)
            .await
            .unwrap();
        assert!(diff.starts_with("diff --git"));
    }
}
