//! In-memory stand-in for a GitHub repository, used by the publishing tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{
    github::{GitDataApi, GitHubError, TreeItem},
    types::ContentHash,
};

type Tree = BTreeMap<String, String>;

#[derive(Default)]
struct State {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, Tree>,
    /// commit sha -> (tree sha, parents, message)
    commits: HashMap<String, (String, Vec<String>, String)>,
    heads: HashMap<String, String>,
    calls: Vec<String>,
    fail_on: Option<&'static str>,
    next_id: usize,
}

impl State {
    fn fresh_sha(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:04}", self.next_id)
    }

    fn record(&mut self, call: &'static str) -> Result<(), GitHubError> {
        self.calls.push(call.to_string());
        if self.fail_on == Some(call) {
            return Err(GitHubError::TooFast { operation: call });
        }
        Ok(())
    }

    fn tree_of(&self, tree_ish: &str) -> Tree {
        if let Some((tree, _, _)) = self.commits.get(tree_ish) {
            return self.trees.get(tree).cloned().unwrap_or_default();
        }
        self.trees.get(tree_ish).cloned().unwrap_or_default()
    }

    /// Tree at a branch name, commit sha or tree sha.
    fn head_tree(&self, git_ref: &str) -> Tree {
        match self.heads.get(git_ref) {
            Some(commit) => self.tree_of(commit),
            None => self.tree_of(git_ref),
        }
    }
}

pub struct FakeRepo {
    state: Mutex<State>,
}

impl FakeRepo {
    /// A repository whose `branch` holds `files` in a single commit.
    pub fn with_files(branch: &str, files: &[(&str, &str)]) -> Self {
        let mut state = State::default();
        let mut tree = Tree::new();
        for (path, content) in files {
            let sha = ContentHash::of(content.as_bytes()).to_string();
            state.blobs.insert(sha.clone(), content.as_bytes().to_vec());
            tree.insert(path.to_string(), sha);
        }
        let tree_sha = state.fresh_sha("tree");
        state.trees.insert(tree_sha.clone(), tree);
        let commit = state.fresh_sha("commit");
        state
            .commits
            .insert(commit.clone(), (tree_sha, vec![], "initial".to_string()));
        state.heads.insert(branch.to_string(), commit);
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn fail_on(&self, call: &'static str) {
        self.state.lock().unwrap().fail_on = Some(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn blob_count(&self) -> usize {
        self.state.lock().unwrap().blobs.len()
    }

    pub fn head(&self, branch: &str) -> String {
        self.state.lock().unwrap().heads[branch].clone()
    }

    /// Message and parents of the commit `branch` points at.
    pub fn head_commit(&self, branch: &str) -> (String, Vec<String>) {
        let state = self.state.lock().unwrap();
        let (_, parents, message) = &state.commits[&state.heads[branch]];
        (message.clone(), parents.clone())
    }

    /// Paths on `branch`.
    pub fn paths(&self, branch: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .head_tree(branch)
            .into_keys()
            .collect()
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let sha = state.head_tree(branch).get(path)?.clone();
        state.blobs.get(&sha).cloned()
    }

    pub fn text(&self, branch: &str, path: &str) -> Option<String> {
        self.file(branch, path)
            .map(|bytes| String::from_utf8(bytes).unwrap())
    }
}

#[async_trait]
impl GitDataApi for FakeRepo {
    async fn get_ref(&self, branch: &str) -> Result<String, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.record("get ref")?;
        state.heads.get(branch).cloned().ok_or(GitHubError::Status {
            operation: "get ref",
            status: reqwest::StatusCode::NOT_FOUND,
        })
    }

    async fn create_blob(&self, content_base64: &str) -> Result<String, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.record("create blob")?;
        let bytes = STANDARD
            .decode(content_base64)
            .map_err(|e| GitHubError::Malformed {
                operation: "create blob",
                detail: e.to_string(),
            })?;
        let sha = ContentHash::of(&bytes).to_string();
        state.blobs.insert(sha.clone(), bytes);
        Ok(sha)
    }

    async fn create_tree(
        &self,
        items: &[TreeItem],
        base_tree: &str,
    ) -> Result<String, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.record("create tree")?;
        let mut tree = state.tree_of(base_tree);
        for item in items {
            match &item.sha {
                Some(sha) => {
                    tree.insert(item.path.clone(), sha.clone());
                }
                None => {
                    tree.remove(&item.path);
                }
            }
        }
        let sha = state.fresh_sha("tree");
        state.trees.insert(sha.clone(), tree);
        Ok(sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<String, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.record("create commit")?;
        let sha = state.fresh_sha("commit");
        state.commits.insert(
            sha.clone(),
            (tree.to_string(), parents.to_vec(), message.to_string()),
        );
        Ok(sha)
    }

    async fn update_ref(&self, branch: &str, sha: &str, _force: bool) -> Result<(), GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.record("update ref")?;
        state.heads.insert(branch.to_string(), sha.to_string());
        Ok(())
    }

    async fn read_text_file(
        &self,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<String>, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.record("read file")?;
        let tree = state.head_tree(git_ref);
        Ok(tree
            .get(path)
            .and_then(|sha| state.blobs.get(sha))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
    }

    async fn list_files_recursive(
        &self,
        path: &str,
        git_ref: &str,
    ) -> Result<Vec<String>, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.record("list files")?;
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(state
            .head_tree(git_ref)
            .into_keys()
            .filter(|p| p.starts_with(&prefix))
            .collect())
    }
}
