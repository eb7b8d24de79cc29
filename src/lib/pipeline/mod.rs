//! Local reader view: render a checkout of the content repository into a
//! static site.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{
    Section,
    eyre::{Result, eyre},
};
use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{
    article::{Article, render_listing_page, render_post_page},
    blog_index::{BlogConfig, BlogIndex, BlogIndexItem},
    config::{BLOGS_DIR, HIGHLIGHT_CSS, INDEX_PATH, POST_CONFIG, POST_MARKDOWN, SITE_TITLE},
    markdown::render_markdown,
    transformer::code_block::highlight_css,
    types::Slug,
    utils::prefix_to_root,
};

type LoadedPost = (Article, String);
type RenderedPage = (PathBuf, String);

#[derive(Clone, Debug)]
pub struct BuildOptions {
    /// Root of the content repository checkout.
    pub root: PathBuf,
    pub out: PathBuf,
    /// Render hidden posts too, as the author sees them.
    pub include_hidden: bool,
}

pub fn build_at(opts: &BuildOptions) -> Result<usize> {
    fs::create_dir_all(&opts.out)
        .with_note(|| format!("While creating {}", opts.out.display()))?;

    Pipeline::new(opts)
        .discover()?
        .load()?
        .render()?
        .emit()
}

fn blogs_dir(root: &Path) -> PathBuf {
    root.join(BLOGS_DIR)
}

fn read_index(root: &Path) -> Result<BlogIndex> {
    let path = root.join(INDEX_PATH);
    let text = fs::read_to_string(&path)
        .with_note(|| format!("While reading {}", path.display()))
        .suggestion("Point --root at a checkout of the content repository")?;
    Ok(BlogIndex::parse_lenient(&text))
}

/// Post directories present on disk.
fn post_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let dir = blogs_dir(root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    let mut walk_errors: Vec<walkdir::Error> = Vec::new();
    for item in WalkDir::new(&dir).min_depth(1).max_depth(1) {
        match item {
            Ok(entry) if entry.file_type().is_dir() => dirs.push((
                entry.file_name().to_string_lossy().into_owned(),
                entry.path().to_path_buf(),
            )),
            Ok(_) => {}
            Err(e) => walk_errors.push(e),
        }
    }

    if !walk_errors.is_empty() {
        return Err(eyre!(
            "Failed to open some directory entries: {walk_errors:?}"
        ));
    }

    dirs.sort();
    Ok(dirs)
}

fn discover_posts(opts: &BuildOptions) -> Result<Vec<Article>> {
    let index = read_index(&opts.root)?;

    let indexed: HashSet<&str> = index.items().iter().map(|i| i.slug.as_str()).collect();
    for (name, _) in post_dirs(&opts.root)? {
        if !indexed.contains(name.as_str()) {
            warn!(slug = %name, "post directory is not listed in the index");
        }
    }

    // Slugs become output paths; anything that could leave `out` is dropped.
    let articles: Vec<Article> = index
        .visible(opts.include_hidden)
        .filter(|item| {
            let usable = Slug::parse(&item.slug).is_some();
            if !usable {
                warn!(slug = %item.slug, "skipping index entry with an unusable slug");
            }
            usable
        })
        .map(Article::from)
        .collect();
    info!(posts = articles.len(), "discovered posts");
    Ok(articles)
}

fn load_posts(opts: &BuildOptions, articles: Vec<Article>) -> Result<Vec<LoadedPost>> {
    let dir = blogs_dir(&opts.root);
    let mut loaded = Vec::with_capacity(articles.len());
    let mut missing: Vec<String> = Vec::new();

    for article in articles {
        let path = dir.join(&article.slug).join(POST_MARKDOWN);
        match fs::read_to_string(&path) {
            Ok(markdown) => loaded.push((article, markdown)),
            Err(e) => {
                warn!(slug = %article.slug, error = %e, "cannot read post");
                missing.push(article.slug);
            }
        }
    }

    if !missing.is_empty() {
        return Err(eyre!(
            "Indexed posts without a readable {POST_MARKDOWN}: {}",
            missing.join(", ")
        ));
    }

    Ok(loaded)
}

fn render_posts(posts: Vec<LoadedPost>) -> Vec<(Article, RenderedPage)> {
    posts
        .into_par_iter()
        .map(|(article, markdown)| {
            let rel_out = PathBuf::from(article.href());
            let prefix = prefix_to_root(&rel_out);
            let rendered = render_markdown(&markdown);
            let html = render_post_page(&article, &rendered, &prefix);
            (article, (rel_out, html))
        })
        .collect()
}

fn emit_site(opts: &BuildOptions, pages: Vec<RenderedPage>, articles: &[Article]) -> Result<usize> {
    let count = pages.len();
    for (rel_out, html) in pages {
        let out_path = opts.out.join(rel_out);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, html).with_note(|| format!("While writing {}", out_path.display()))?;
    }

    let index_prefix = prefix_to_root(Path::new("index.html"));
    fs::write(
        opts.out.join("index.html"),
        render_listing_page(SITE_TITLE, articles, &index_prefix),
    )?;
    fs::write(opts.out.join(HIGHLIGHT_CSS), highlight_css())?;

    info!(pages = count, out = %opts.out.display(), "site written");
    Ok(count)
}

/// Rebuild the index from every post's `config.json`. Directories without
/// one are skipped.
pub fn collect_index(root: &Path) -> Result<BlogIndex> {
    let mut items: Vec<BlogIndexItem> = Vec::new();
    for (slug, dir) in post_dirs(root)? {
        let path = dir.join(POST_CONFIG);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(%slug, error = %e, "skipping post without {POST_CONFIG}");
                continue;
            }
        };
        let config: BlogConfig = serde_json::from_str(&text)
            .with_note(|| format!("While parsing {}", path.display()))?;
        items.push(BlogIndexItem::from_config(&slug, &config));
    }
    Ok(BlogIndex::replace_sorted(items))
}

trait PipelineStage {}
/// Pipeline typestate driver
struct Pipeline<'o, S: PipelineStage> {
    opts: &'o BuildOptions,
    state: S,
}

impl PipelineStage for () {}
struct Discovered(Vec<Article>);
impl PipelineStage for Discovered {}
struct Loaded(Vec<LoadedPost>);
impl PipelineStage for Loaded {}
struct Rendered {
    pages: Vec<RenderedPage>,
    articles: Vec<Article>,
}
impl PipelineStage for Rendered {}

// initial state
impl<'o> Pipeline<'o, ()> {
    fn new(opts: &'o BuildOptions) -> Self {
        Self { opts, state: () }
    }

    fn discover(self) -> Result<Pipeline<'o, Discovered>> {
        let articles = discover_posts(self.opts)?;
        Ok(Pipeline {
            opts: self.opts,
            state: Discovered(articles),
        })
    }
}

impl<'o> Pipeline<'o, Discovered> {
    fn load(self) -> Result<Pipeline<'o, Loaded>> {
        let posts = load_posts(self.opts, self.state.0)?;
        Ok(Pipeline {
            opts: self.opts,
            state: Loaded(posts),
        })
    }
}

impl<'o> Pipeline<'o, Loaded> {
    fn render(self) -> Result<Pipeline<'o, Rendered>> {
        let (articles, pages) = render_posts(self.state.0).into_iter().unzip();
        Ok(Pipeline {
            opts: self.opts,
            state: Rendered { pages, articles },
        })
    }
}

impl Pipeline<'_, Rendered> {
    fn emit(self) -> Result<usize> {
        emit_site(self.opts, self.state.pages, &self.state.articles)
    }
}

#[cfg(test)]
mod tests;
