use std::{env, fs};

use color_eyre::eyre::{Result, WrapErr, eyre};

// GitHub REST API.
pub const API_BASE: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";
pub const USER_AGENT: &str = concat!("blogcms/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_BRANCH: &str = "main";

// Layout of the content repository.
pub const PUBLIC_DIR: &str = "public";
pub const BLOGS_DIR: &str = "public/blogs";
pub const INDEX_PATH: &str = "public/blogs/index.json";
pub const CATEGORIES_PATH: &str = "public/blogs/categories.json";
pub const POST_MARKDOWN: &str = "index.md";
pub const POST_CONFIG: &str = "config.json";

// Local reader-view build.
pub const OUTPUT_DIR: &str = "site";
pub const POSTS_DIR: &str = "blog";
pub const SITE_TITLE: &str = "Blog";
pub const HIGHLIGHT_CSS: &str = "highlight.css";
pub const KATEX_CSS: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.22/dist/katex.min.css";

// Environment variables read by `GitHubSettings::from_env`.
pub const ENV_OWNER: &str = "BLOG_GITHUB_OWNER";
pub const ENV_REPO: &str = "BLOG_GITHUB_REPO";
pub const ENV_BRANCH: &str = "BLOG_GITHUB_BRANCH";
pub const ENV_TOKEN: &str = "BLOG_GITHUB_TOKEN";
pub const ENV_TOKEN_FALLBACK: &str = "GITHUB_TOKEN";
pub const ENV_API_BASE: &str = "BLOG_GITHUB_API";
pub const ENV_APP_ID: &str = "BLOG_GITHUB_APP_ID";
pub const ENV_APP_KEY: &str = "BLOG_GITHUB_APP_PRIVATE_KEY";
pub const ENV_APP_KEY_PATH: &str = "BLOG_GITHUB_APP_PRIVATE_KEY_PATH";

/// A GitHub App installed on the content repository.
#[derive(Clone)]
pub struct AppCredentials {
    pub app_id: String,
    /// RSA private key, PEM encoded.
    pub private_key_pem: String,
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

/// How requests are authenticated.
#[derive(Clone, Copy, Debug)]
pub enum Credentials<'a> {
    Token(&'a str),
    App(&'a AppCredentials),
}

/// Where the content repository lives and how to reach it.
#[derive(Clone, Debug)]
pub struct GitHubSettings {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub api_base: String,
    pub token: Option<String>,
    pub app: Option<AppCredentials>,
}

impl GitHubSettings {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: DEFAULT_BRANCH.to_string(),
            api_base: API_BASE.to_string(),
            token: None,
            app: None,
        }
    }

    /// Read settings from the environment. Owner and repository are required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let owner = get(ENV_OWNER).ok_or_else(|| eyre!("{ENV_OWNER} is not set"))?;
        let repo = get(ENV_REPO).ok_or_else(|| eyre!("{ENV_REPO} is not set"))?;

        let app = match get(ENV_APP_ID) {
            Some(app_id) => {
                let key = match get(ENV_APP_KEY) {
                    Some(pem) => pem,
                    None => {
                        let path = get(ENV_APP_KEY_PATH).ok_or_else(|| {
                            eyre!("{ENV_APP_ID} is set but neither {ENV_APP_KEY} nor {ENV_APP_KEY_PATH} is")
                        })?;
                        fs::read_to_string(&path)
                            .wrap_err_with(|| format!("While reading the app key at {path}"))?
                    }
                };
                Some(AppCredentials {
                    app_id,
                    // Keys pasted into a single-line variable keep `\n` escapes.
                    private_key_pem: key.replace("\\n", "\n"),
                })
            }
            None => None,
        };

        Ok(Self {
            owner,
            repo,
            branch: get(ENV_BRANCH).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            api_base: get(ENV_API_BASE).unwrap_or_else(|| API_BASE.to_string()),
            token: get(ENV_TOKEN).or_else(|| get(ENV_TOKEN_FALLBACK)),
            app,
        })
    }

    /// A token when one is configured, else the GitHub App.
    pub fn credentials(&self) -> Result<Credentials<'_>> {
        match (&self.token, &self.app) {
            (Some(token), _) => Ok(Credentials::Token(token)),
            (None, Some(app)) => Ok(Credentials::App(app)),
            (None, None) => Err(eyre!(
                "no GitHub credentials; set {ENV_TOKEN} (or {ENV_TOKEN_FALLBACK}), or {ENV_APP_ID} with {ENV_APP_KEY}"
            )),
        }
    }
}

/// Repository directory holding one post.
pub fn post_dir(slug: &str) -> String {
    format!("{BLOGS_DIR}/{slug}")
}

/// URL path a file of a post is served under once deployed.
pub fn public_url(slug: &str, file: &str) -> String {
    let dir = post_dir(slug);
    let served = dir.strip_prefix(PUBLIC_DIR).unwrap_or(&dir);
    format!("{served}/{file}")
}
