use std::collections::HashSet;

use proptest::{
    prelude::*,
    test_runner::{Config, TestRunner},
};
use pulldown_cmark::{CowStr, Event, HeadingLevel, Tag, TagEnd};

use crate::{
    transformer::toc::{TocItem, anchor_headings},
    utils::slugify,
};

fn heading(level: HeadingLevel, title: &str) -> Vec<Event<'static>> {
    vec![
        Event::Start(Tag::Heading {
            level,
            id: None,
            classes: vec![],
            attrs: vec![],
        }),
        Event::Text(CowStr::from(title.to_string())),
        Event::End(TagEnd::Heading(level)),
    ]
}

fn ids(events: &[Event<'_>]) -> Vec<String> {
    events
        .iter()
        .filter_map(|ev| match ev {
            Event::Start(Tag::Heading { id: Some(id), .. }) => Some(id.to_string()),
            _ => None,
        })
        .collect()
}

#[test]
fn toc_assigns_unique_ids() {
    let mut runner = TestRunner::new(Config {
        cases: 16,
        failure_persistence: None,
        ..Config::default()
    });

    runner
        .run(
            &proptest::collection::vec("[a-z0-9][A-Za-z0-9 ]{0,15}", 1..6),
            |headings| {
                let events: Vec<_> = headings
                    .iter()
                    .flat_map(|title| heading(HeadingLevel::H2, title))
                    .collect();

                let anchored = anchor_headings(events);
                let ids = ids(&anchored.events);

                prop_assert_eq!(ids.len(), headings.len());
                prop_assert_eq!(anchored.toc.len(), headings.len());
                let mut seen_ids = HashSet::new();
                for (title, id) in headings.iter().zip(ids.iter()) {
                    let slug = slugify(title);
                    let taken = seen_ids.contains(&slug);
                    prop_assert!(seen_ids.insert(id.clone()), "duplicate id {}", id);

                    if taken {
                        let prefix = format!("{slug}-");
                        prop_assert!(id.starts_with(&prefix), "{} should extend {}", id, slug);
                    } else {
                        prop_assert_eq!(id, &slug);
                    }
                }
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn toc_keeps_only_three_levels() {
    let mut events = heading(HeadingLevel::H1, "Title");
    events.extend(heading(HeadingLevel::H2, "Part"));
    events.extend(heading(HeadingLevel::H3, "Detail"));
    events.extend(heading(HeadingLevel::H4, "Deep"));

    let anchored = anchor_headings(events);

    assert_eq!(
        anchored.toc,
        vec![
            TocItem { id: "title".into(), text: "Title".into(), level: 1 },
            TocItem { id: "part".into(), text: "Part".into(), level: 2 },
            TocItem { id: "detail".into(), text: "Detail".into(), level: 3 },
        ]
    );
    // h4 still gets an anchor
    assert_eq!(ids(&anchored.events), vec!["title", "part", "detail", "deep"]);
}

#[test]
fn explicit_id_wins() {
    let events = vec![
        Event::Start(Tag::Heading {
            level: HeadingLevel::H2,
            id: Some(CowStr::from("custom")),
            classes: vec![],
            attrs: vec![],
        }),
        Event::Text(CowStr::from("Whatever")),
        Event::End(TagEnd::Heading(HeadingLevel::H2)),
    ];
    let anchored = anchor_headings(events);
    assert_eq!(anchored.toc[0].id, "custom");
    assert_eq!(anchored.toc[0].text, "Whatever");
}

#[test]
fn symbol_only_heading_gets_fallback_id() {
    let mut events = heading(HeadingLevel::H2, "!!!");
    events.extend(heading(HeadingLevel::H2, "???"));
    let anchored = anchor_headings(events);
    assert_eq!(ids(&anchored.events), vec!["section", "section-2"]);
}

#[test]
fn inline_code_counts_toward_text() {
    let events = vec![
        Event::Start(Tag::Heading {
            level: HeadingLevel::H2,
            id: None,
            classes: vec![],
            attrs: vec![],
        }),
        Event::Text(CowStr::from("Using ")),
        Event::Code(CowStr::from("cargo")),
        Event::End(TagEnd::Heading(HeadingLevel::H2)),
    ];
    let anchored = anchor_headings(events);
    assert_eq!(anchored.toc[0].text, "Using cargo");
    assert_eq!(anchored.toc[0].id, "using-cargo");
}

#[test]
fn suffixes_skip_ids_taken_by_literal_headings() {
    let mut events = heading(HeadingLevel::H1, "A");
    events.extend(heading(HeadingLevel::H1, "A"));
    events.extend(heading(HeadingLevel::H1, "A 2"));
    events.extend(heading(HeadingLevel::H1, "A"));
    let anchored = anchor_headings(events);
    assert_eq!(ids(&anchored.events), ["a", "a-2", "a-2-2", "a-3"]);
}
