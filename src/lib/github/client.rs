use async_trait::async_trait;
use reqwest::{
    Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{
    config::{API_VERSION, GitHubSettings, USER_AGENT},
    github::{GitDataApi, GitHubError, TreeItem, decode_content},
};

/// GitHub REST client bound to one repository.
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
    owner: String,
    repo: String,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ShaResponse,
}

/// A Contents API entry. Directories come back as an array of these.
#[derive(Deserialize)]
struct ContentEntry {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Dir(Vec<ContentEntry>),
    File(ContentEntry),
}

#[derive(Serialize)]
struct PutFileRequest<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHubClient {
    pub fn new(settings: &GitHubSettings, token: &str) -> Result<Self, GitHubError> {
        Ok(Self {
            http: authorized_http(token)?,
            api_base: parse_api_base(&settings.api_base)?,
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
        })
    }

    /// `{api}/repos/{owner}/{repo}/{segments...}` with every segment
    /// percent-encoded.
    fn repo_url<'s>(
        &self,
        segments: impl IntoIterator<Item = &'s str>,
    ) -> Result<Url, GitHubError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| GitHubError::InvalidUrl(self.api_base.to_string()))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn contents_url(&self, path: &str, git_ref: Option<&str>) -> Result<Url, GitHubError> {
        let mut url = self.repo_url(
            std::iter::once("contents").chain(path.split('/').filter(|s| !s.is_empty())),
        )?;
        if let Some(git_ref) = git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }
        Ok(url)
    }

    /// Sha of a file on `branch`, `None` when it does not exist.
    pub async fn get_file_sha(
        &self,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubError> {
        const OP: &str = "get file sha";
        let url = self.contents_url(path, Some(branch))?;
        debug!(%url, "GET contents");
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        match check(response, OP)?.json::<ContentsResponse>().await? {
            ContentsResponse::File(entry) => Ok(entry.sha),
            ContentsResponse::Dir(_) => Ok(None),
        }
    }

    /// Create or overwrite one file through the Contents API, which commits
    /// it straight onto `branch`.
    pub async fn put_file(
        &self,
        path: &str,
        content_base64: &str,
        message: &str,
        branch: &str,
    ) -> Result<(), GitHubError> {
        const OP: &str = "put file";
        let sha = self.get_file_sha(path, branch).await?;
        let url = self.contents_url(path, None)?;
        debug!(%url, "PUT contents");
        let body = PutFileRequest {
            message,
            content: content_base64,
            branch,
            sha: sha.as_deref(),
        };
        let response = self.http.put(url).json(&body).send().await?;
        check(response, OP)?;
        Ok(())
    }

    async fn post_for_sha(
        &self,
        url: Url,
        body: serde_json::Value,
        op: &'static str,
    ) -> Result<String, GitHubError> {
        debug!(%url, "POST {op}");
        let response = self.http.post(url).json(&body).send().await?;
        let ShaResponse { sha } = check(response, op)?.json().await?;
        Ok(sha)
    }
}

/// HTTP client sending `token` as a bearer credential plus the headers GitHub
/// expects on every REST call.
pub(super) fn authorized_http(token: &str) -> Result<reqwest::Client, GitHubError> {
    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "x-github-api-version",
        HeaderValue::from_static(API_VERSION),
    );

    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(USER_AGENT)
        .build()?)
}

pub(super) fn parse_api_base(api_base: &str) -> Result<Url, GitHubError> {
    Url::parse(api_base).map_err(|e| GitHubError::InvalidUrl(format!("{api_base}: {e}")))
}

/// `{api}/{segments...}`, each segment percent-encoded.
pub(super) fn api_url<'s>(
    api_base: &Url,
    segments: impl IntoIterator<Item = &'s str>,
) -> Result<Url, GitHubError> {
    let mut url = api_base.clone();
    url.path_segments_mut()
        .map_err(|()| GitHubError::InvalidUrl(api_base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Map the status codes GitHub uses for auth failures and throttling onto
/// their own errors; pass successful responses through.
pub(super) fn check(response: Response, operation: &'static str) -> Result<Response, GitHubError> {
    status_error(response.status(), operation).map_or(Ok(response), Err)
}

pub(super) fn status_error(status: StatusCode, operation: &'static str) -> Option<GitHubError> {
    match status {
        s if s.is_success() => None,
        StatusCode::UNAUTHORIZED => Some(GitHubError::Unauthorized { operation }),
        StatusCode::UNPROCESSABLE_ENTITY => Some(GitHubError::TooFast { operation }),
        status => Some(GitHubError::Status { operation, status }),
    }
}

#[async_trait]
impl GitDataApi for GitHubClient {
    async fn get_ref(&self, branch: &str) -> Result<String, GitHubError> {
        const OP: &str = "get ref";
        let url = self.repo_url(["git", "ref", "heads", branch])?;
        debug!(%url, "GET ref");
        let response = self.http.get(url).send().await?;
        let RefResponse { object } = check(response, OP)?.json().await?;
        Ok(object.sha)
    }

    async fn create_blob(&self, content_base64: &str) -> Result<String, GitHubError> {
        let url = self.repo_url(["git", "blobs"])?;
        self.post_for_sha(
            url,
            json!({ "content": content_base64, "encoding": "base64" }),
            "create blob",
        )
        .await
    }

    async fn create_tree(
        &self,
        items: &[TreeItem],
        base_tree: &str,
    ) -> Result<String, GitHubError> {
        let url = self.repo_url(["git", "trees"])?;
        self.post_for_sha(
            url,
            json!({ "tree": items, "base_tree": base_tree }),
            "create tree",
        )
        .await
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<String, GitHubError> {
        let url = self.repo_url(["git", "commits"])?;
        self.post_for_sha(
            url,
            json!({ "message": message, "tree": tree, "parents": parents }),
            "create commit",
        )
        .await
    }

    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<(), GitHubError> {
        const OP: &str = "update ref";
        let url = self.repo_url(["git", "refs", "heads", branch])?;
        debug!(%url, "PATCH ref");
        let response = self
            .http
            .patch(url)
            .json(&json!({ "sha": sha, "force": force }))
            .send()
            .await?;
        check(response, OP)?;
        Ok(())
    }

    async fn read_text_file(
        &self,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<String>, GitHubError> {
        const OP: &str = "read file";
        let url = self.contents_url(path, Some(git_ref))?;
        debug!(%url, "GET contents");
        let response = self.http.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let entry = match check(response, OP)?.json::<ContentsResponse>().await? {
            ContentsResponse::File(entry) => entry,
            ContentsResponse::Dir(_) => return Ok(None),
        };
        let Some(content) = entry.content.filter(|c| !c.is_empty()) else {
            return Ok(None);
        };
        decode_content(&content)
            .map(Some)
            .map_err(|e| GitHubError::Malformed {
                operation: OP,
                detail: e.to_string(),
            })
    }

    async fn list_files_recursive(
        &self,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<String>, GitHubError> {
        const OP: &str = "read directory";
        let mut files = Vec::new();
        let mut pending = vec![path.to_string()];

        while let Some(dir) = pending.pop() {
            let url = self.contents_url(&dir, Some(git_ref))?;
            debug!(%url, "GET contents");
            let response = self.http.get(url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }
            match check(response, OP)?.json::<ContentsResponse>().await? {
                ContentsResponse::File(entry) if entry.kind == "file" => files.push(entry.path),
                ContentsResponse::File(entry) if entry.kind == "dir" => pending.push(entry.path),
                ContentsResponse::File(_) => {}
                ContentsResponse::Dir(entries) => {
                    for entry in entries {
                        match entry.kind.as_str() {
                            "file" => files.push(entry.path),
                            "dir" => pending.push(entry.path),
                            _ => {}
                        }
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
