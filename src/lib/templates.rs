use crate::{
    config::{HIGHLIGHT_CSS, KATEX_CSS},
    utils::{escape_attr, escape_text},
};

/// Basic HTML shell shared by pages.
pub fn page_shell(title: &str, body: &str, href_prefix: &str, has_math: bool) -> String {
    let katex = if has_math {
        format!(
            r#"<link rel="stylesheet" href="{}">
"#,
            escape_attr(KATEX_CSS)
        )
    } else {
        String::new()
    };

    format!(
        r#"<!doctype html>
<html lang="zh-CN">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{}</title>
<link rel="stylesheet" href="{}{HIGHLIGHT_CSS}">
{katex}</head>
<body>
<article>
{body}
</article>
</body>
</html>
"#,
        escape_text(title),
        escape_attr(href_prefix),
    )
}

/// Listing page: a heading followed by `body`.
pub fn listing_page(page_title: &str, heading: &str, body: &str, href_prefix: &str) -> String {
    let inner = format!(
        r#"<section>
<h1>{}</h1>
{body}</section>"#,
        escape_text(heading)
    );
    page_shell(page_title, &inner, href_prefix, false)
}
