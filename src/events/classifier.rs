//! Decides which webhook deliveries deserve work.
//!
//! Only two event kinds are understood: `pull_request` and `push`. Everything
//! else is ignored (and logged by the caller), never rejected.

use serde::de::DeserializeOwned;

use crate::github::models::{PullRequestEvent, PushEvent, WebhookPayload};

pub const PULL_REQUEST_EVENT: &str = "pull_request";
pub const PUSH_EVENT: &str = "push";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Synchronize,
    Closed,
}

impl PullRequestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestAction::Opened => "opened",
            PullRequestAction::Synchronize => "synchronize",
            PullRequestAction::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    PullRequest {
        action: PullRequestAction,
        event: PullRequestEvent,
    },
    /// A push to `main` or `master`.
    PushToDefault(PushEvent),
}

#[derive(Debug, Clone)]
pub enum Classification {
    Act(Action),
    Ignore { reason: String },
}

impl Classification {
    fn ignore(reason: impl Into<String>) -> Self {
        Classification::Ignore {
            reason: reason.into(),
        }
    }

    pub fn is_act(&self) -> bool {
        matches!(self, Classification::Act(_))
    }
}

/// Decodes a verified body into the payload variant named by `event_type`.
///
/// Unknown or missing event types decode to [`WebhookPayload::Other`] after
/// checking the body is JSON at all. Recognised kinds with missing fields
/// are an error.
pub fn parse_payload(
    event_type: Option<&str>,
    body: &[u8],
) -> Result<WebhookPayload, serde_json::Error> {
    fn typed<T: DeserializeOwned>(body: &[u8]) -> Result<T, serde_json::Error> {
        serde_json::from_slice(body)
    }

    match event_type {
        Some(PULL_REQUEST_EVENT) => typed(body).map(WebhookPayload::PullRequest),
        Some(PUSH_EVENT) => typed(body).map(WebhookPayload::Push),
        other => {
            typed::<serde_json::Value>(body)?;
            Ok(WebhookPayload::Other {
                event: other.map(str::to_string),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventClassifier {
    /// Act on `closed` pull requests as well (used when PR state is tracked).
    pub act_on_closed: bool,
}

impl EventClassifier {
    pub fn new(act_on_closed: bool) -> Self {
        Self { act_on_closed }
    }

    pub fn classify(&self, payload: WebhookPayload) -> Classification {
        match payload {
            WebhookPayload::PullRequest(event) => {
                let action = match event.action.as_str() {
                    "opened" => PullRequestAction::Opened,
                    "synchronize" => PullRequestAction::Synchronize,
                    "closed" if self.act_on_closed => PullRequestAction::Closed,
                    other => {
                        return Classification::ignore(format!(
                            "pull_request action '{other}' is not handled"
                        ))
                    }
                };
                Classification::Act(Action::PullRequest { action, event })
            }
            WebhookPayload::Push(event) => {
                if is_default_branch_ref(&event.git_ref) {
                    Classification::Act(Action::PushToDefault(event))
                } else {
                    Classification::ignore(format!("push to '{}' is not handled", event.git_ref))
                }
            }
            WebhookPayload::Other { event: Some(event) } => {
                Classification::ignore(format!("event '{event}' is not handled"))
            }
            WebhookPayload::Other { event: None } => {
                Classification::ignore("delivery has no event type")
            }
        }
    }
}

fn is_default_branch_ref(git_ref: &str) -> bool {
    git_ref.ends_with("/main") || git_ref.ends_with("/master")
}

/// Looks for a mention of `username` (or the generic bot handle) in `text`.
///
/// Plain case-insensitive substring search, so `robot` also matches `bot`.
/// Returns the first pattern that hit.
pub fn find_mention(text: &str, username: &str) -> Option<String> {
    let haystack = text.to_lowercase();
    let lower = username.to_lowercase();
    let patterns = [
        format!("@{username}"),
        format!("@{lower}"),
        lower,
        "bot".to_string(),
        "@bot".to_string(),
    ];

    patterns
        .into_iter()
        .find(|pattern| !pattern.is_empty() && haystack.contains(&pattern.to_lowercase()))
}

/// Title and body of a pull request joined for mention search.
pub fn mention_text(event: &PullRequestEvent) -> String {
    let title = event.pull_request.title.as_deref().unwrap_or("");
    let body = event.pull_request.body.as_deref().unwrap_or("");
    format!("{title} {body}").to_lowercase()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    pub(crate) fn pull_request_body(action: &str, title: &str, body: Option<&str>) -> Value {
        json!({
            "action": action,
            "number": 7,
            "pull_request": { "id": 1001, "number": 7, "title": title, "body": body },
            "repository": { "id": 55, "full_name": "octo/hello" },
            "installation": { "id": 42 }
        })
    }

    pub(crate) fn push_body(git_ref: &str) -> Value {
        json!({
            "ref": git_ref,
            "after": "2344c05c8136207b55090d1d2e37b094db37c112",
            "commits": [{ "id": "2344c05c8136207b55090d1d2e37b094db37c112" }],
            "repository": { "id": 55, "full_name": "octo/hello" },
            "installation": { "id": 42 }
        })
    }

    fn classify(event_type: &str, body: Value) -> Classification {
        let payload = parse_payload(Some(event_type), body.to_string().as_bytes()).unwrap();
        EventClassifier::default().classify(payload)
    }

    #[test]
    fn pull_request_actions() {
        assert!(classify("pull_request", pull_request_body("opened", "t", None)).is_act());
        assert!(classify("pull_request", pull_request_body("synchronize", "t", None)).is_act());
        assert!(!classify("pull_request", pull_request_body("edited", "t", None)).is_act());
        assert!(!classify("pull_request", pull_request_body("labeled", "t", None)).is_act());
    }

    #[test]
    fn closed_depends_on_state_tracking() {
        let payload = || {
            parse_payload(
                Some("pull_request"),
                pull_request_body("closed", "t", None).to_string().as_bytes(),
            )
            .unwrap()
        };
        assert!(!EventClassifier::new(false).classify(payload()).is_act());
        match EventClassifier::new(true).classify(payload()) {
            Classification::Act(Action::PullRequest { action, .. }) => {
                assert_eq!(action, PullRequestAction::Closed)
            }
            other => panic!("expected closed PR to be acted on, got {other:?}"),
        }
    }

    #[test]
    fn push_only_to_main_or_master() {
        assert!(classify("push", push_body("refs/heads/main")).is_act());
        assert!(classify("push", push_body("refs/heads/master")).is_act());
        assert!(!classify("push", push_body("refs/heads/feature-x")).is_act());
        assert!(!classify("push", push_body("refs/heads/main-backup")).is_act());
        assert!(!classify("push", push_body("refs/tags/v1.0")).is_act());
    }

    #[test]
    fn unknown_and_missing_event_types_are_ignored() {
        assert!(!classify("issues", json!({ "action": "opened" })).is_act());
        let payload = parse_payload(None, b"{}").unwrap();
        assert!(!EventClassifier::default().classify(payload).is_act());
    }

    #[test]
    fn malformed_bodies_fail_to_parse() {
        assert!(parse_payload(Some("push"), b"not json").is_err());
        assert!(parse_payload(Some("issues"), b"not json").is_err());
        assert!(parse_payload(Some("pull_request"), br#"{"action":"opened"}"#).is_err());
        assert!(parse_payload(Some("push"), br#"{"repository":{"id":1,"full_name":"a/b"}}"#).is_err());
    }

    #[test]
    fn classification_is_deterministic() {
        let body = pull_request_body("opened", "hello", Some("world"));
        let a = classify("pull_request", body.clone()).is_act();
        let b = classify("pull_request", body).is_act();
        assert_eq!(a, b);
    }

    #[test]
    fn mention_detection() {
        assert_eq!(find_mention("please review @codeok", "codeok").as_deref(), Some("@codeok"));
        assert_eq!(find_mention("no mention here", "codeok"), None);
        assert_eq!(find_mention("CODEOK thanks", "codeok").as_deref(), Some("codeok"));
        assert_eq!(find_mention("ping @CodeOK", "CodeOK").as_deref(), Some("@CodeOK"));
    }

    #[test]
    fn generic_bot_token_over_matches() {
        assert_eq!(find_mention("fix robot arm", "codeok").as_deref(), Some("bot"));
        assert_eq!(find_mention("hey @bot", "codeok").as_deref(), Some("bot"));
    }

    #[test]
    fn mention_text_joins_title_and_body() {
        let body = pull_request_body("opened", "Add Feature", None);
        let event: PullRequestEvent = serde_json::from_value(body).unwrap();
        assert_eq!(mention_text(&event), "add feature ");
    }
}
