use crate::{
    blog_index::BlogIndexItem,
    config::POSTS_DIR,
    markdown::MarkdownRender,
    templates::{listing_page, page_shell},
    transformer::toc::TocItem,
    utils::{escape_attr, escape_text},
};

/// A post as shown in the reader view.
#[derive(Clone, Debug)]
pub struct Article {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub summary: Option<String>,
    pub cover: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub hidden: bool,
}

impl From<&BlogIndexItem> for Article {
    fn from(item: &BlogIndexItem) -> Self {
        Self {
            slug: item.slug.clone(),
            title: if item.title.trim().is_empty() {
                item.slug.clone()
            } else {
                item.title.clone()
            },
            date: item.date.clone(),
            summary: item.summary.clone(),
            cover: item.cover.clone(),
            tags: item.tags.clone(),
            category: item.category.clone(),
            hidden: item.is_hidden(),
        }
    }
}

impl Article {
    /// Output path relative to the site root.
    pub fn href(&self) -> String {
        format!("{POSTS_DIR}/{}.html", self.slug)
    }

    /// Leading four-digit year of the date, if there is one.
    pub fn year(&self) -> Option<&str> {
        self.date
            .get(..4)
            .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
    }
}

/// Render the index. `articles` is expected newest first; a year heading is
/// emitted whenever the year changes.
pub fn render_listing_page(site_title: &str, articles: &[Article], href_prefix: &str) -> String {
    let mut body = String::new();
    let mut current_year: Option<&str> = None;

    for a in articles {
        let year = a.year();
        if year != current_year {
            if let Some(y) = year {
                body.push_str("<h2>");
                body.push_str(&escape_text(y));
                body.push_str("</h2>\n");
            }
            current_year = year;
        }

        body.push_str(r#"<p class="meta">"#);
        if !a.date.is_empty() {
            body.push_str(r#"<time datetime=""#);
            body.push_str(&escape_attr(&a.date));
            body.push_str(r#"">"#);
            body.push_str(&escape_text(&a.date));
            body.push_str("</time>");
            body.push_str(r#"<span class="meta-sep">·</span>"#);
        }

        let full_href = format!("{href_prefix}{}", a.href());
        body.push_str(r#"<a href=""#);
        body.push_str(&escape_attr(&full_href));
        body.push_str(r#"">"#);
        body.push_str(&escape_text(&a.title));
        body.push_str("</a>");
        if a.hidden {
            body.push_str(r#" <span class="hidden-post">(hidden)</span>"#);
        }
        body.push_str("</p>\n");

        if let Some(summary) = a.summary.as_deref().filter(|s| !s.is_empty()) {
            body.push_str(r#"<p class="summary">"#);
            body.push_str(&escape_text(summary));
            body.push_str("</p>\n");
        }
    }

    listing_page(site_title, site_title, &body, href_prefix)
}

pub fn render_toc(toc: &[TocItem]) -> String {
    if toc.is_empty() {
        return String::new();
    }
    let mut out = String::from("<nav class=\"toc\">\n<ul>\n");
    for item in toc {
        out.push_str(&format!(
            "<li class=\"toc-level-{}\"><a href=\"#{}\">{}</a></li>\n",
            item.level,
            escape_attr(&item.id),
            escape_text(&item.text)
        ));
    }
    out.push_str("</ul>\n</nav>\n");
    out
}

/// Full page of one post: header with metadata, optional cover and outline,
/// then the rendered body.
pub fn render_post_page(article: &Article, rendered: &MarkdownRender, href_prefix: &str) -> String {
    let mut body = String::new();
    body.push_str("<header>\n<h1>");
    body.push_str(&escape_text(&article.title));
    body.push_str("</h1>\n<p class=\"meta\">");

    let mut meta: Vec<String> = Vec::new();
    if !article.date.is_empty() {
        meta.push(format!(
            r#"<time datetime="{}">{}</time>"#,
            escape_attr(&article.date),
            escape_text(&article.date)
        ));
    }
    if let Some(category) = article.category.as_deref().filter(|c| !c.is_empty()) {
        meta.push(format!(
            r#"<span class="category">{}</span>"#,
            escape_text(category)
        ));
    }
    for tag in &article.tags {
        meta.push(format!(r#"<span class="tag">#{}</span>"#, escape_text(tag)));
    }
    body.push_str(&meta.join(r#"<span class="meta-sep">·</span>"#));
    body.push_str("</p>\n");

    if let Some(cover) = article.cover.as_deref().filter(|c| !c.is_empty()) {
        body.push_str(&format!(
            r#"<img class="cover" src="{}" alt="">
"#,
            escape_attr(cover)
        ));
    }
    body.push_str("</header>\n");

    body.push_str(&render_toc(&rendered.toc));
    body.push_str("<section class=\"content\">\n");
    body.push_str(&rendered.html);
    body.push_str("</section>\n");
    body.push_str(&format!(
        r#"<p class="meta"><a href="{}index.html">Index</a></p>
"#,
        escape_attr(href_prefix)
    ));

    page_shell(&article.title, &body, href_prefix, rendered.has_math)
}
