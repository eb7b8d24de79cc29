use time::{OffsetDateTime, macros::format_description};

/// HTML-escape text content.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// HTML-escape attribute values. Newlines survive, which `data-code` relies on.
pub fn escape_attr(s: &str) -> String {
    escape_text(s)
}

/// Compute the anchor id of a heading.
///
/// Keeps ASCII letters and digits, CJK unified ideographs, whitespace and
/// dashes; everything else is dropped. Whitespace runs collapse into a single
/// dash. The result can be empty for headings made only of symbols.
pub fn slugify(input: &str) -> String {
    let kept: String = input
        .to_lowercase()
        .chars()
        .filter(|ch| {
            ch.is_ascii_lowercase()
                || ch.is_ascii_digit()
                || ('\u{4e00}'..='\u{9fa5}').contains(ch)
                || ch.is_whitespace()
                || *ch == '-'
        })
        .collect();

    let mut out = String::with_capacity(kept.len());
    let mut in_space = false;
    for ch in kept.trim().chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Extension (with the dot) an uploaded image is stored under.
pub fn file_ext(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    [".jpg", ".jpeg", ".webp", ".png", ".svg"]
        .into_iter()
        .find(|ext| lower.ends_with(ext))
        .unwrap_or(".png")
}

/// Format a timestamp as `YYYY-MM-DDTHH:MM`, the date format posts carry.
pub fn format_date_time_local(dt: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    dt.format(&fmt).unwrap_or_default()
}

/// The current local time, or UTC when the local offset cannot be determined.
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Prefix needed to navigate from a relative output path back to the root.
pub fn prefix_to_root(rel_out: &std::path::Path) -> String {
    let depth = rel_out
        .parent()
        .map(|p| p.components().count())
        .unwrap_or(0);
    "../".repeat(depth)
}
