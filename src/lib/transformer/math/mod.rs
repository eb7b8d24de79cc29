use katex::{Opts, OutputType};
use pulldown_cmark::{CowStr, Event};
use tracing::warn;

use crate::{transformer::Transformer, utils::escape_text};

/// Render `$inline$` and `$$display$$` math server-side with KaTeX.
///
/// When KaTeX rejects an expression the source is kept with its original
/// delimiters so the text still reads as math.
pub struct MathTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    inner: I,
}

impl<'a, I> Iterator for MathTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next()? {
            Event::InlineMath(source) if source.trim().is_empty() => {
                Some(Event::Text(CowStr::from(format!("${source}$"))))
            }
            Event::InlineMath(source) => {
                let html = render_math(source.trim(), false);
                Some(Event::InlineHtml(CowStr::from(html)))
            }
            Event::DisplayMath(source) => {
                let mut html = render_math(source.trim(), true);
                html.push('\n');
                Some(Event::Html(CowStr::from(html)))
            }
            other => Some(other),
        }
    }
}

/// Render a single expression, or its delimited source if KaTeX fails.
pub fn render_math(source: &str, display_mode: bool) -> String {
    let mut builder = Opts::builder();
    builder
        .display_mode(display_mode)
        .throw_on_error(false)
        .output_type(OutputType::Html);

    let opts = builder.build().unwrap_or_default();

    match katex::render_with_opts(source, &opts) {
        Ok(res) => res,
        Err(e) => {
            warn!(error = %e, "katex failed, keeping math source");
            delimited(source, display_mode)
        }
    }
}

fn delimited(source: &str, display_mode: bool) -> String {
    let escaped = escape_text(source);
    if display_mode {
        format!("$${escaped}$$")
    } else {
        format!("${escaped}$")
    }
}

impl<'a, I> Transformer<'a, I> for MathTransformer<'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    fn transform(inner: I) -> Self {
        Self { inner }
    }
}
