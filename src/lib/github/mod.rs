//! Access to the content repository through GitHub's Git Data and Contents
//! APIs.
//!
//! [`GitDataApi`] lists the calls the publishing flows need; [`GitHubClient`]
//! implements it over HTTP. A personal token or a GitHub App installation
//! token ([`installation_token`]) authenticates it.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::types::{FileMode, ObjectKind};

mod app;
mod client;
mod error;
#[cfg(test)]
pub mod fake;

pub use app::{AppAuth, AppClaims, installation_token, sign_app_jwt};
pub use client::GitHubClient;
pub use error::GitHubError;

/// One entry of a tree created on top of a base tree.
///
/// `sha: None` is sent as an explicit `null`, which removes `path` from the
/// resulting tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeItem {
    pub path: String,
    pub mode: FileMode,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub sha: Option<String>,
}

impl TreeItem {
    /// Point `path` at an existing blob.
    pub fn blob(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::Blob,
            kind: ObjectKind::Blob,
            sha: Some(sha.into()),
        }
    }

    /// Remove `path` from the tree.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mode: FileMode::Blob,
            kind: ObjectKind::Blob,
            sha: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.sha.is_none()
    }
}

/// The Git Data API calls used to build and land a commit, plus the reads
/// needed to know what is already there.
#[async_trait]
pub trait GitDataApi: Send + Sync {
    /// Commit sha the branch points at.
    async fn get_ref(&self, branch: &str) -> Result<String, GitHubError>;

    /// Store base64 content as a blob, returning its sha.
    async fn create_blob(&self, content_base64: &str) -> Result<String, GitHubError>;

    /// Create a tree from `base_tree` with `items` applied.
    async fn create_tree(&self, items: &[TreeItem], base_tree: &str)
    -> Result<String, GitHubError>;

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<String, GitHubError>;

    /// Move the branch to `sha`.
    async fn update_ref(&self, branch: &str, sha: &str, force: bool) -> Result<(), GitHubError>;

    /// Text of a file, `None` when it does not exist.
    async fn read_text_file(&self, path: &str, git_ref: &str)
    -> Result<Option<String>, GitHubError>;

    /// Paths of all files below `path`; empty when it does not exist.
    async fn list_files_recursive(
        &self,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<String>, GitHubError>;
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 file content as returned by the Contents API (wrapped at 60
/// columns). Invalid UTF-8 is replaced rather than rejected.
pub fn decode_content(encoded: &str) -> Result<String, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
