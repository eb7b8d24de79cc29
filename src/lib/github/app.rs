//! Signing in as a GitHub App instead of with a personal token.
//!
//! The app signs a short-lived RS256 JWT with its private key, looks up its
//! installation on the content repository, and trades the JWT for an
//! installation token. That token then drives a regular [`GitHubClient`].
//!
//! [`GitHubClient`]: super::GitHubClient

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    config::{AppCredentials, GitHubSettings},
    github::{
        GitHubError,
        client::{api_url, authorized_http, check, parse_api_base},
    },
};

/// GitHub rejects app JWTs that live longer than ten minutes.
const JWT_LIFETIME_SECS: i64 = 8 * 60;
/// Issued in the past to tolerate clock drift between us and GitHub.
const JWT_BACKDATE_SECS: i64 = 60;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    /// The app id.
    pub iss: String,
}

impl AppClaims {
    pub fn new(app_id: &str, now: OffsetDateTime) -> Self {
        let now = now.unix_timestamp();
        Self {
            iat: now - JWT_BACKDATE_SECS,
            exp: now + JWT_LIFETIME_SECS,
            iss: app_id.to_string(),
        }
    }
}

pub fn sign_app_jwt(
    app_id: &str,
    private_key_pem: &str,
    now: OffsetDateTime,
) -> Result<String, GitHubError> {
    let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())?;
    let claims = AppClaims::new(app_id, now);
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &key,
    )?)
}

#[derive(Deserialize)]
struct Installation {
    id: u64,
}

#[derive(Deserialize)]
struct AccessToken {
    token: String,
}

/// Calls made with the app JWT rather than an installation token.
pub struct AppAuth {
    http: reqwest::Client,
    api_base: Url,
}

impl AppAuth {
    pub fn new(settings: &GitHubSettings, jwt: &str) -> Result<Self, GitHubError> {
        Ok(Self {
            http: authorized_http(jwt)?,
            api_base: parse_api_base(&settings.api_base)?,
        })
    }

    pub async fn installation_id(&self, owner: &str, repo: &str) -> Result<u64, GitHubError> {
        const OP: &str = "installation lookup";
        let url = api_url(&self.api_base, ["repos", owner, repo, "installation"])?;
        debug!(%url, "GET installation");
        let response = self.http.get(url).send().await?;
        let Installation { id } = check(response, OP)?.json().await?;
        Ok(id)
    }

    pub async fn create_installation_token(
        &self,
        installation_id: u64,
    ) -> Result<String, GitHubError> {
        const OP: &str = "create installation token";
        let id = installation_id.to_string();
        let url = api_url(
            &self.api_base,
            ["app", "installations", id.as_str(), "access_tokens"],
        )?;
        debug!(%url, "POST access token");
        let response = self.http.post(url).send().await?;
        let AccessToken { token } = check(response, OP)?.json().await?;
        Ok(token)
    }
}

/// Sign as the app and come back with an installation token for the
/// configured repository.
pub async fn installation_token(
    settings: &GitHubSettings,
    app: &AppCredentials,
) -> Result<String, GitHubError> {
    let jwt = sign_app_jwt(&app.app_id, &app.private_key_pem, OffsetDateTime::now_utc())?;
    let auth = AppAuth::new(settings, &jwt)?;
    let id = auth
        .installation_id(&settings.owner, &settings.repo)
        .await?;
    info!(installation = id, app = %app.app_id, "authenticating as GitHub App");
    auth.create_installation_token(id).await
}
