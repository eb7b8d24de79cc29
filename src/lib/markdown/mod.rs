//! Markdown to HTML for the blog reader view.
//!
//! The event stream from pulldown-cmark is run through the transformers in
//! [`crate::transformer`]: headings get anchor ids (and feed the table of
//! contents), code blocks are highlighted, math goes through KaTeX and task
//! list items get their checkbox markup.

use pulldown_cmark::{Event, Options, Parser};
use serde::Serialize;

use crate::transformer::{
    WithTransformer,
    code_block::CodeHighlightTransformer,
    math::MathTransformer,
    task_list::TaskListTransformer,
    toc::{Anchored, TocItem, anchor_headings},
};

/// Result of rendering one Markdown document.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MarkdownRender {
    pub html: String,
    pub toc: Vec<TocItem>,
    /// Whether the document contains math, i.e. needs the KaTeX stylesheet.
    #[serde(skip)]
    pub has_math: bool,
}

pub fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_GFM);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_MATH);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    options
}

/// Render Markdown to HTML and extract its table of contents.
pub fn render_markdown(markdown: &str) -> MarkdownRender {
    let events: Vec<Event<'_>> = Parser::new_ext(markdown, parser_options()).collect();

    let has_math = events
        .iter()
        .any(|e| matches!(e, Event::InlineMath(_) | Event::DisplayMath(_)));

    let Anchored { events, toc } = anchor_headings(events);

    let transformed = events
        .into_iter()
        .with_transformer::<CodeHighlightTransformer<'_, _>>()
        .with_transformer::<MathTransformer<'_, _>>()
        .with_transformer::<TaskListTransformer<'_, _>>();

    let mut html = String::with_capacity(markdown.len() * 2);
    pulldown_cmark::html::push_html(&mut html, transformed);

    MarkdownRender {
        html,
        toc,
        has_math,
    }
}

#[cfg(test)]
mod tests;
