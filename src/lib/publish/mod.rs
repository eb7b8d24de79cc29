//! Publishing flows against the content repository.
//!
//! Every flow lands exactly one commit: read the branch head, create the
//! blobs, build a tree on top of the head, commit it and move the branch.
//! Nothing is retried; the first failing call aborts the flow and the branch
//! stays where it was.

use std::collections::HashSet;

use color_eyre::{
    Section,
    eyre::{Result, bail, eyre},
};
use tracing::info;

use crate::{
    blog_index::{BlogConfig, BlogIndex, BlogIndexItem, Categories, removed_since},
    config::{CATEGORIES_PATH, GitHubSettings, INDEX_PATH, POST_CONFIG, POST_MARKDOWN, post_dir, public_url},
    github::{GitDataApi, TreeItem, to_base64},
    types::{ContentHash, Slug},
    utils::{file_ext, format_date_time_local, now_local},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PublishMode {
    #[default]
    Create,
    Edit,
}

/// What the author filled in for a post.
#[derive(Clone, Debug, Default)]
pub struct PublishForm {
    pub slug: String,
    pub title: String,
    pub md: String,
    pub tags: Vec<String>,
    /// Defaults to now when absent.
    pub date: Option<String>,
    pub summary: Option<String>,
    pub hidden: Option<bool>,
    pub category: Option<String>,
}

/// An image attached to a post. Local files are referenced from the Markdown
/// as `(local-image:<id>)` until they are uploaded.
#[derive(Clone, Debug)]
pub enum ImageItem {
    Url {
        id: String,
        url: String,
    },
    File {
        id: String,
        filename: String,
        bytes: Vec<u8>,
    },
}

impl ImageItem {
    pub fn id(&self) -> &str {
        match self {
            ImageItem::Url { id, .. } | ImageItem::File { id, .. } => id,
        }
    }
}

pub fn placeholder(id: &str) -> String {
    format!("local-image:{id}")
}

#[derive(Clone, Debug, Default)]
pub struct PublishRequest {
    pub form: PublishForm,
    pub cover: Option<ImageItem>,
    pub images: Vec<ImageItem>,
    pub mode: PublishMode,
    /// Slug the post had when editing started.
    pub original_slug: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    pub commit: String,
    pub cover: Option<String>,
    /// Distinct image files written; same bytes under the same extension are
    /// stored once.
    pub uploaded_images: usize,
}

/// Tree entries collected for one commit.
#[derive(Debug, Default)]
pub struct Changeset {
    items: Vec<TreeItem>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[TreeItem] {
        &self.items
    }

    pub fn delete(&mut self, path: impl Into<String>) {
        self.items.push(TreeItem::delete(path));
    }

    /// Upload `bytes` as a blob and stage it at `path`.
    pub async fn write<A: GitDataApi + ?Sized>(
        &mut self,
        api: &A,
        path: impl Into<String>,
        bytes: &[u8],
    ) -> Result<()> {
        let path = path.into();
        let sha = api
            .create_blob(&to_base64(bytes))
            .await
            .with_note(|| format!("While uploading {path}"))?;
        self.items.push(TreeItem::blob(path, sha));
        Ok(())
    }

    /// Build the tree on top of `base`, commit it with `base` as parent and
    /// move `branch` to the new commit.
    pub async fn commit<A: GitDataApi + ?Sized>(
        self,
        api: &A,
        branch: &str,
        base: &str,
        message: &str,
    ) -> Result<String> {
        info!(entries = self.items.len(), "creating tree");
        let tree = api
            .create_tree(&self.items, base)
            .await
            .with_note(|| "While creating the tree")?;

        info!(%message, "creating commit");
        let commit = api
            .create_commit(message, &tree, &[base.to_string()])
            .await
            .with_note(|| "While creating the commit")?;

        info!(%branch, %commit, "updating branch");
        api.update_ref(branch, &commit, false)
            .await
            .with_note(|| format!("While moving {branch} to {commit}"))?;

        Ok(commit)
    }
}

async fn branch_head<A: GitDataApi + ?Sized>(api: &A, branch: &str) -> Result<String> {
    info!(%branch, "fetching branch head");
    api.get_ref(branch)
        .await
        .with_note(|| format!("While reading the head of {branch}"))
}

/// Current index at `git_ref`. A missing or unparsable file counts as empty;
/// a failed request does not.
async fn load_index<A: GitDataApi + ?Sized>(api: &A, git_ref: &str) -> Result<BlogIndex> {
    let text = api
        .read_text_file(INDEX_PATH, git_ref)
        .await
        .with_note(|| format!("While reading {INDEX_PATH}"))?;
    Ok(text
        .map(|t| BlogIndex::parse_lenient(&t))
        .unwrap_or_default())
}

fn require_slug(raw: &str) -> Result<Slug> {
    if raw.trim().is_empty() {
        bail!("a slug is required");
    }
    Slug::parse(raw).ok_or_else(|| eyre!("invalid slug {raw:?}: it becomes a directory name"))
}

/// Publish a new post or update an existing one in a single commit.
pub async fn push_blog<A: GitDataApi + ?Sized>(
    api: &A,
    settings: &GitHubSettings,
    request: PublishRequest,
) -> Result<PublishOutcome> {
    let PublishRequest {
        form,
        cover,
        images,
        mode,
        original_slug,
    } = request;

    let slug = require_slug(&form.slug)?;
    if mode == PublishMode::Edit
        && original_slug
            .as_deref()
            .is_some_and(|orig| !orig.is_empty() && orig != slug.as_str())
    {
        bail!("the slug cannot change while editing; keep {original_slug:?}");
    }

    let base = branch_head(api, &settings.branch).await?;
    let base_path = post_dir(slug.as_str());
    let message = match mode {
        PublishMode::Create => format!("Add post: {slug}"),
        PublishMode::Edit => format!("Update post: {slug}"),
    };

    let mut changes = Changeset::new();
    let mut markdown = form.md;
    let mut cover_path: Option<String> = None;
    let mut uploaded: HashSet<String> = HashSet::new();

    let cover_file = cover
        .as_ref()
        .filter(|c| matches!(c, ImageItem::File { .. }));
    let local_images = images
        .iter()
        .filter(|img| matches!(img, ImageItem::File { .. }))
        .chain(cover_file);

    for image in local_images {
        let ImageItem::File {
            id,
            filename,
            bytes,
        } = image
        else {
            continue;
        };

        let hash = ContentHash::of(bytes);
        let stored = format!("{hash}{}", file_ext(filename));
        let public = public_url(slug.as_str(), &stored);

        if !uploaded.contains(&stored) {
            info!(%filename, %stored, "uploading image");
            changes
                .write(api, format!("{base_path}/{stored}"), bytes)
                .await?;
            uploaded.insert(stored);
        }

        markdown = markdown.replace(&format!("({})", placeholder(id)), &format!("({public})"));

        if cover_file.is_some_and(|c| c.id() == id) {
            cover_path = Some(public);
        }
    }

    if let Some(ImageItem::Url { url, .. }) = &cover {
        cover_path = Some(url.clone());
    }

    info!(%slug, "writing post files");
    changes
        .write(api, format!("{base_path}/{POST_MARKDOWN}"), markdown.as_bytes())
        .await?;

    let date = form
        .date
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format_date_time_local(now_local()));
    let config = BlogConfig {
        title: Some(form.title),
        tags: Some(form.tags),
        date: Some(date),
        summary: form.summary,
        cover: cover_path.clone(),
        hidden: form.hidden,
        category: form.category,
    };
    changes
        .write(
            api,
            format!("{base_path}/{POST_CONFIG}"),
            config.to_json_pretty()?.as_bytes(),
        )
        .await?;

    info!("updating the index");
    let mut index = load_index(api, &base).await?;
    index.upsert(BlogIndexItem::from_config(slug.as_str(), &config));
    changes
        .write(api, INDEX_PATH, index.to_json_pretty()?.as_bytes())
        .await?;

    let commit = changes
        .commit(api, &settings.branch, &base, &message)
        .await?;
    info!(%slug, %commit, "published");

    Ok(PublishOutcome {
        commit,
        cover: cover_path,
        uploaded_images: uploaded.len(),
    })
}

/// Remove a post's directory and its index entry in a single commit.
pub async fn delete_blog<A: GitDataApi + ?Sized>(
    api: &A,
    settings: &GitHubSettings,
    slug: &str,
) -> Result<String> {
    let slug = require_slug(slug)?;
    let base = branch_head(api, &settings.branch).await?;

    info!(%slug, "collecting post files");
    let files = api
        .list_files_recursive(&post_dir(slug.as_str()), &base)
        .await
        .with_note(|| format!("While listing the files of {slug}"))?;

    let mut index = load_index(api, &base).await?;
    if files.is_empty() && index.get(slug.as_str()).is_none() {
        bail!("no post named {slug}");
    }

    let mut changes = Changeset::new();
    for path in files {
        changes.delete(path);
    }
    index.remove(&[slug.as_str()]);
    changes
        .write(api, INDEX_PATH, index.to_json_pretty()?.as_bytes())
        .await?;

    let commit = changes
        .commit(api, &settings.branch, &base, &format!("Delete post: {slug}"))
        .await?;
    info!(%slug, %commit, "deleted");
    Ok(commit)
}

/// Land edits made to the post listing: posts missing from `next` are
/// deleted along with their files, the index is replaced by `next` and the
/// category list is rewritten.
pub async fn save_blog_edits<A: GitDataApi + ?Sized>(
    api: &A,
    settings: &GitHubSettings,
    original: &[BlogIndexItem],
    next: Vec<BlogIndexItem>,
    categories: &[String],
) -> Result<String> {
    let removed = removed_since(original, &next);
    let base = branch_head(api, &settings.branch).await?;

    let mut changes = Changeset::new();
    for slug in &removed {
        info!(%slug, "collecting post files");
        let files = api
            .list_files_recursive(&post_dir(slug), &base)
            .await
            .with_note(|| format!("While listing the files of {slug}"))?;
        for path in files {
            changes.delete(path);
        }
    }

    info!("updating the index");
    let index = BlogIndex::replace_sorted(next);
    changes
        .write(api, INDEX_PATH, index.to_json_pretty()?.as_bytes())
        .await?;

    info!("updating categories");
    let categories = Categories::normalize(categories);
    changes
        .write(api, CATEGORIES_PATH, categories.to_json_pretty()?.as_bytes())
        .await?;

    let message = edits_message(&removed, !categories.is_empty());
    changes.commit(api, &settings.branch, &base, &message).await
}

/// `Delete: a,b | Update index | Update categories`, listing only what
/// applies.
pub fn edits_message(removed: &[String], has_categories: bool) -> String {
    let mut parts = Vec::with_capacity(3);
    if !removed.is_empty() {
        parts.push(format!("Delete: {}", removed.join(",")));
    }
    parts.push("Update index".to_string());
    if has_categories {
        parts.push("Update categories".to_string());
    }
    parts.join(" | ")
}
