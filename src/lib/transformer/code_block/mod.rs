use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use syntect::{
    highlighting::{Theme, ThemeSet},
    html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};
use tracing::warn;

use crate::{
    transformer::Transformer,
    utils::{escape_attr, escape_text},
};

/// Light theme bundled with syntect, closest to the reader's palette.
const THEME_NAME: &str = "InspiredGitHub";

/// An enum to keep track of the state of the highlighter in the code block.
pub enum CodeBlockState<'a> {
    /// Not in code block, pass through the event as-is.
    Passthrough,
    /// Currently inside a code block of language `lang`, so we accumulate all
    /// events until an `Event::End(TagEnd::CodeBlock)` is reached.
    Accumulating { lang: CodeBlockKind<'a> },
}

/// Highlights fenced and indented code blocks.
///
/// Every block is emitted as `<pre data-code="...">`, where the attribute
/// carries the untouched source so the reader can offer a copy button no
/// matter whether highlighting succeeded.
pub struct CodeHighlightTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    /// The inner iterator which CodeHighlightTransformer transforms
    inner: I,
    /// Buffer to accumulate any code.
    buffer: String,
    /// Current state of the transformer; are we inside a code block?
    state: CodeBlockState<'a>,
}

impl<'a, I> Iterator for CodeHighlightTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        // Everything between the start and end of a code block collapses into
        // one HTML event, so we loop until the block closes.
        loop {
            let event = self.inner.next()?;
            match &self.state {
                CodeBlockState::Passthrough => match event {
                    Event::Start(Tag::CodeBlock(lang)) => {
                        self.state = CodeBlockState::Accumulating { lang };
                        self.buffer.clear();
                        continue;
                    }
                    other => return Some(other),
                },
                CodeBlockState::Accumulating { lang: _ } => match event {
                    Event::End(TagEnd::CodeBlock) => {
                        let CodeBlockState::Accumulating { lang } =
                            std::mem::replace(&mut self.state, CodeBlockState::Passthrough)
                        else {
                            unreachable!()
                        };

                        let language = match lang {
                            CodeBlockKind::Fenced(ref l) => fence_language(l),
                            CodeBlockKind::Indented => None,
                        };

                        return Some(Event::Html(CowStr::from(highlight_block(
                            &self.buffer,
                            language,
                        ))));
                    }
                    Event::Text(text) | Event::Code(text) => {
                        self.buffer.push_str(text.as_ref());
                        continue;
                    }
                    Event::SoftBreak | Event::HardBreak => {
                        self.buffer.push('\n');
                        continue;
                    }
                    Event::Html(html) | Event::InlineHtml(html) => {
                        self.buffer.push_str(html.as_ref());
                        continue;
                    }
                    _ => continue,
                },
            }
        }
    }
}

/// The info string may carry extra words (```` ```rust title="x" ````); only
/// the first one names the language.
fn fence_language(info: &str) -> Option<&str> {
    info.split_whitespace().next()
}

/// Render one code block, falling back to escaped plain text when the
/// language is unknown or highlighting fails.
pub fn highlight_block(source: &str, language: Option<&str>) -> String {
    let syntax_set = syntax_set();
    let syntax = language.and_then(|lang| syntax_set.find_syntax_by_token(lang));

    match syntax {
        Some(syntax) => render_classed_html(source, syntax_set, syntax, language)
            .unwrap_or_else(|| {
                warn!(?language, "syntax highlighting failed, emitting plain code");
                fallback_plain(source, language)
            }),
        None => fallback_plain(source, language),
    }
}

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

static THEME: OnceLock<Theme> = OnceLock::new();
fn theme() -> &'static Theme {
    THEME.get_or_init(|| {
        let mut themes = ThemeSet::load_defaults().themes;
        themes.remove(THEME_NAME).unwrap_or_default()
    })
}

static HIGHLIGHT_CSS: OnceLock<String> = OnceLock::new();
/// Return the CSS needed for class-based syntax highlighting.
pub fn highlight_css() -> &'static str {
    HIGHLIGHT_CSS.get_or_init(|| {
        css_for_theme_with_class_style(theme(), ClassStyle::Spaced).unwrap_or_default()
    })
}

fn open_pre(out: &mut String, source: &str, language: Option<&str>) {
    out.push_str("<pre data-code=\"");
    out.push_str(&escape_attr(source));
    out.push_str("\" class=\"code");
    if let Some(lang) = language {
        out.push_str(" language-");
        out.push_str(&escape_attr(lang));
    }
    out.push_str("\"><code>");
}

fn render_classed_html(
    source: &str,
    syntax_set: &SyntaxSet,
    syntax: &SyntaxReference,
    language: Option<&str>,
) -> Option<String> {
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, ClassStyle::Spaced);

    for line in LinesWithEndings::from(source) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .ok()?;
    }

    let mut out = String::with_capacity(source.len() * 3 + 64);
    open_pre(&mut out, source, language);
    out.push_str(&generator.finalize());
    out.push_str("</code></pre>\n");
    Some(out)
}

/// Backup renderer for unknown languages or when syntect fails.
pub fn fallback_plain(source: &str, language: Option<&str>) -> String {
    let mut out = String::with_capacity(source.len() * 2 + 64);
    open_pre(&mut out, source, language);
    out.push_str(&escape_text(source));
    out.push_str("</code></pre>\n");
    out
}

impl<'a, I> Transformer<'a, I> for CodeHighlightTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    fn transform(inner: I) -> Self {
        Self {
            inner,
            buffer: String::new(),
            state: CodeBlockState::Passthrough,
        }
    }
}
