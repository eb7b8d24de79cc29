//! A post as written on disk: Markdown with optional YAML front matter and
//! images referenced by relative path.

use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{
    Section,
    eyre::{Result, eyre},
};
use gray_matter::{Matter, engine::YAML};
use pulldown_cmark::{Event, Parser, Tag};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    markdown::parser_options,
    publish::{ImageItem, PublishForm, PublishMode, PublishRequest, placeholder},
    utils::slugify,
};

#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub tags: Vec<String>,
    pub date: Option<String>,
    pub summary: Option<String>,
    pub cover: Option<String>,
    pub hidden: Option<bool>,
    pub category: Option<String>,
}

/// A post read from disk, with its local images loaded and replaced by
/// placeholders in `body`.
#[derive(Debug, Clone)]
pub struct PostFile {
    pub front: FrontMatter,
    pub body: String,
    pub images: Vec<ImageItem>,
    pub cover: Option<ImageItem>,
    /// File name without extension, the last resort for title and slug.
    pub stem: String,
}

fn is_remote(dest: &str) -> bool {
    dest.contains("://") || dest.starts_with("data:") || dest.starts_with("//")
}

fn is_local(dest: &str) -> bool {
    !dest.is_empty()
        && !is_remote(dest)
        && !dest.starts_with(['/', '#'])
        && !dest.starts_with("mailto:")
        && !dest.starts_with("local-image:")
}

/// Distinct relative image destinations, in order of first appearance.
pub fn local_image_refs(markdown: &str) -> Vec<String> {
    let mut refs: Vec<String> = Vec::new();
    for event in Parser::new_ext(markdown, parser_options()) {
        if let Event::Start(Tag::Image { dest_url, .. }) = event
            && is_local(&dest_url)
            && !refs.iter().any(|r| *r == *dest_url)
        {
            refs.push(dest_url.into_string());
        }
    }
    refs
}

fn read_image(base_dir: &Path, rel: &str, id: String) -> Result<ImageItem> {
    let path = base_dir.join(rel);
    let bytes = fs::read(&path).with_note(|| format!("While reading image {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| rel.to_string());
    debug!(path = %path.display(), size = bytes.len(), "loaded image");
    Ok(ImageItem::File {
        id,
        filename,
        bytes,
    })
}

/// Parse a post's text. Relative paths are resolved against `base_dir`.
pub fn parse_post(text: &str, base_dir: &Path, stem: &str) -> Result<PostFile> {
    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(text)
        .with_note(|| "While parsing front matter")?;
    let front = parsed.data.unwrap_or_default();
    let mut body = parsed.content;

    let mut images = Vec::new();
    for (n, dest) in local_image_refs(&body).into_iter().enumerate() {
        let target = format!("({dest})");
        if !body.contains(&target) {
            warn!(%dest, "image reference has a title or unusual syntax; leaving it as is");
            continue;
        }
        let id = (n + 1).to_string();
        body = body.replace(&target, &format!("({})", placeholder(&id)));
        images.push(read_image(base_dir, &dest, id)?);
    }

    let cover = match front.cover.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(url) if is_remote(url) || url.starts_with('/') => Some(ImageItem::Url {
            id: "cover".to_string(),
            url: url.to_string(),
        }),
        Some(rel) => Some(read_image(base_dir, rel, "cover".to_string())?),
    };

    Ok(PostFile {
        front,
        body,
        images,
        cover,
        stem: stem.to_string(),
    })
}

pub fn load_post(path: &Path) -> Result<PostFile> {
    let text =
        fs::read_to_string(path).with_note(|| format!("While reading {}", path.display()))?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| eyre!("{} has no file name", path.display()))?;
    parse_post(&text, &base_dir, &stem)
}

impl PostFile {
    pub fn title(&self) -> String {
        self.front
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.stem.clone())
    }

    /// `explicit`, then the front matter slug, then the slugified title, then
    /// the slugified file name.
    pub fn slug(&self, explicit: Option<&str>) -> String {
        explicit
            .map(ToOwned::to_owned)
            .or_else(|| self.front.slug.clone())
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(slugify(&self.title())).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| slugify(&self.stem))
    }

    /// Editing keeps the slug; the request carries it as the original.
    pub fn into_request(self, explicit_slug: Option<&str>, mode: PublishMode) -> PublishRequest {
        let slug = self.slug(explicit_slug);
        let title = self.title();
        let FrontMatter {
            tags,
            date,
            summary,
            hidden,
            category,
            ..
        } = self.front;
        PublishRequest {
            original_slug: (mode == PublishMode::Edit).then(|| slug.clone()),
            form: PublishForm {
                slug,
                title,
                md: self.body,
                tags,
                date,
                summary,
                hidden,
                category,
            },
            cover: self.cover,
            images: self.images,
            mode,
        }
    }
}
