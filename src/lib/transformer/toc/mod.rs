use std::collections::{HashMap, HashSet};

use pulldown_cmark::{CowStr, Event, HeadingLevel, Tag, TagEnd};
use serde::Serialize;

use crate::utils::slugify;

/// Deepest heading level that makes it into the table of contents.
pub const TOC_MAX_LEVEL: u8 = 3;

/// Used when a heading slugifies to nothing.
const FALLBACK_ID: &str = "section";

/// One entry of a post's table of contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TocItem {
    pub id: String,
    pub text: String,
    pub level: u8,
}

pub struct Anchored<'a> {
    pub events: Vec<Event<'a>>,
    pub toc: Vec<TocItem>,
}

/// Give every heading an id and collect the h1-h3 outline.
///
/// Ids come from the heading's plain text, so emphasis, links and inline code
/// contribute their text only. An explicit `{#id}` wins over the generated
/// one. Repeated ids get `-2`, `-3`, ... appended in document order.
pub fn anchor_headings(events: Vec<Event<'_>>) -> Anchored<'_> {
    let mut out: Vec<Event<'_>> = Vec::with_capacity(events.len());
    let mut toc = Vec::new();
    let mut ids = IssuedIds::default();

    // (level, index of the start event in `out`, plain text, explicit id)
    let mut in_heading: Option<(HeadingLevel, usize, String, Option<String>)> = None;

    for ev in events {
        match (&mut in_heading, ev) {
            (
                None,
                Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }),
            ) => {
                let existing_id = id.map(|c| c.to_string());
                in_heading = Some((level, out.len(), String::new(), existing_id));
                out.push(Event::Start(Tag::Heading {
                    level,
                    id: None,
                    classes,
                    attrs,
                }));
            }

            (Some((_, _, text, _)), Event::Text(t)) => {
                text.push_str(t.as_ref());
                out.push(Event::Text(t));
            }

            (Some((_, _, text, _)), Event::Code(t)) => {
                text.push_str(t.as_ref());
                out.push(Event::Code(t));
            }

            (Some((_, _, text, _)), Event::InlineMath(t)) => {
                text.push_str(t.as_ref());
                out.push(Event::InlineMath(t));
            }

            (Some((_, _, text, _)), ev @ (Event::SoftBreak | Event::HardBreak)) => {
                text.push(' ');
                out.push(ev);
            }

            (Some((level, start, text, existing_id)), Event::End(TagEnd::Heading(end))) => {
                let text = text.trim().to_string();
                let base = existing_id.take().unwrap_or_else(|| {
                    let slug = slugify(&text);
                    if slug.is_empty() {
                        FALLBACK_ID.to_string()
                    } else {
                        slug
                    }
                });
                let unique = uniquify_slug(base, &mut ids);

                if let Event::Start(Tag::Heading { id, .. }) = &mut out[*start] {
                    *id = Some(CowStr::from(unique.clone()));
                }

                let depth = heading_depth(*level);
                if depth <= TOC_MAX_LEVEL {
                    toc.push(TocItem {
                        id: unique,
                        text,
                        level: depth,
                    });
                }

                out.push(Event::End(TagEnd::Heading(end)));
                in_heading = None;
            }

            (_, other) => out.push(other),
        }
    }

    Anchored { events: out, toc }
}

/// Ids handed out so far and, per base id, the next suffix to try.
#[derive(Default)]
struct IssuedIds {
    issued: HashSet<String>,
    next_suffix: HashMap<String, usize>,
}

/// `base` if it is still free, else `base-N` for the smallest free `N >= 2`.
/// A literal heading such as `A 2` can take `a-2` first, so every candidate
/// is checked against what was already issued.
fn uniquify_slug(base: String, ids: &mut IssuedIds) -> String {
    if ids.issued.insert(base.clone()) {
        return base;
    }
    let n = ids.next_suffix.entry(base.clone()).or_insert(2);
    loop {
        let candidate = format!("{base}-{n}");
        *n += 1;
        if ids.issued.insert(candidate.clone()) {
            return candidate;
        }
    }
}

pub fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests;
