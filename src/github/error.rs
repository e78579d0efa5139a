use thiserror::Error;

/// Failures while proving the app identity or minting an installation token.
///
/// None of these are retried here; a caller may retry with a fresh assertion.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Key material could not be parsed as an RSA PEM key.
    #[error("invalid app private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    /// Signing the assertion failed.
    #[error("failed to sign app assertion: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// GitHub rejected the assertion or the token request.
    #[error("installation token exchange failed (HTTP {status}): {body}")]
    Exchange { status: u16, body: String },

    /// The app is not installed on the repository.
    #[error("app is not installed on {owner}/{repo}")]
    InstallationNotFound { owner: String, repo: String },

    /// Transport-level failure (connect, timeout, undecodable body).
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of a scoped action performed with an installation token.
#[derive(Debug, Error)]
pub enum GitHubApiError {
    #[error("GitHub API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),
}
