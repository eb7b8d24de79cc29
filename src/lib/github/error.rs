use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    /// 401: the token is missing, invalid or expired.
    #[error("{operation}: GitHub rejected the credentials, refresh the token")]
    Unauthorized { operation: &'static str },

    /// 422: GitHub reports this when edits arrive faster than it settles them.
    #[error("{operation}: operating too quickly, please slow down")]
    TooFast { operation: &'static str },

    #[error("{operation} failed: {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("{operation}: unexpected response: {detail}")]
    Malformed {
        operation: &'static str,
        detail: String,
    },

    #[error("invalid API url {0}")]
    InvalidUrl(String),

    #[error("cannot sign the GitHub App token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("invalid header value")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
