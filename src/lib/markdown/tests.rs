use proptest::{
    prelude::*,
    test_runner::{Config, TestRunner},
};

use super::render_markdown;
use crate::transformer::toc::TocItem;

#[test]
fn headings_get_ids_and_toc() {
    let md = "# Intro\n\ntext\n\n## Getting Started\n\n### Install `cargo`\n\n#### Too deep\n";
    let out = render_markdown(md);

    assert!(out.html.contains(r#"<h1 id="intro">Intro</h1>"#));
    assert!(out.html.contains(r#"<h2 id="getting-started">Getting Started</h2>"#));
    assert!(out.html.contains(r#"<h4 id="too-deep">"#));
    assert_eq!(
        out.toc,
        vec![
            TocItem { id: "intro".into(), text: "Intro".into(), level: 1 },
            TocItem { id: "getting-started".into(), text: "Getting Started".into(), level: 2 },
            TocItem { id: "install-cargo".into(), text: "Install cargo".into(), level: 3 },
        ]
    );
}

#[test]
fn headings_in_code_blocks_are_not_in_toc() {
    let md = "## Real\n\n```md\n## Fake\n```\n";
    let out = render_markdown(md);
    assert_eq!(out.toc.len(), 1);
    assert_eq!(out.toc[0].id, "real");
}

#[test]
fn nested_headings_are_found() {
    let md = "> ## Quoted\n\n- item\n";
    let out = render_markdown(md);
    assert_eq!(out.toc.len(), 1);
    assert_eq!(out.toc[0].text, "Quoted");
}

#[test]
fn code_blocks_carry_data_code() {
    let md = "```rust\nlet x = 1 < 2;\n```\n\nand `inline`\n";
    let out = render_markdown(md);
    assert!(out.html.contains(r#"<pre data-code="let x = 1 &lt; 2;"#));
    assert!(out.html.contains("<code>inline</code>"));
}

#[test]
fn math_is_rendered() {
    let out = render_markdown("Euler: $e^{i\\pi} + 1 = 0$\n\n$$\n\\int_0^1 x\\,dx\n$$\n");
    assert!(out.has_math);
    assert!(out.html.contains("katex"));
    assert!(!out.html.contains("$$"));
}

#[test]
fn plain_dollars_are_not_math() {
    let out = render_markdown("It costs 5 dollars.\n");
    assert!(!out.has_math);
    assert!(!out.html.contains("katex"));
}

#[test]
fn task_lists_have_class() {
    let out = render_markdown("- [x] done\n- [ ] todo\n- plain\n");
    assert!(out.html.contains(r#"<li class="task-list-item"><input type="checkbox" checked disabled /> done</li>"#));
    assert!(out.html.contains(r#"<li class="task-list-item"><input type="checkbox" disabled /> todo</li>"#));
    assert!(out.html.contains("<li>plain</li>"));
}

#[test]
fn front_matter_is_not_rendered() {
    let out = render_markdown("---\ntitle: Hidden\n---\n\nBody\n");
    assert!(!out.html.contains("Hidden"));
    assert!(out.html.contains("<p>Body</p>"));
}

#[test]
fn render_never_panics() {
    let mut runner = TestRunner::new(Config {
        cases: 32,
        failure_persistence: None,
        ..Config::default()
    });
    runner
        .run(&"[#`$*\\-\\[\\] a-z0-9\n]{0,80}", |md| {
            let out = render_markdown(&md);
            for item in &out.toc {
                prop_assert!(item.level >= 1 && item.level <= 3);
                prop_assert!(!item.id.is_empty());
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn loose_task_lists_are_marked() {
    let out = render_markdown("- [x] one\n\n- [ ] two\n");
    assert_eq!(out.html.matches(r#"<li class="task-list-item">"#).count(), 2);
    assert!(out.html.contains(r#"<input type="checkbox" checked disabled />"#));
}

#[test]
fn repeated_heading_ids_stay_unique() {
    let out = render_markdown("# A\n\n# A\n\n# A 2\n");
    let ids: Vec<_> = out.toc.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["a", "a-2", "a-2-2"]);
}
