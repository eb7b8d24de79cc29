use std::{
    fs,
    path::{Path, PathBuf},
};

use proptest::{
    prelude::*,
    test_runner::{Config, TestRunner},
};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::{
    config::{BLOGS_DIR, INDEX_PATH, POSTS_DIR},
    pipeline::{BuildOptions, build_at, collect_index},
};

fn write(root: &Path, rel: impl AsRef<Path>, body: &str) {
    let full = root.join(rel);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, body).unwrap();
}

fn write_post(root: &Path, slug: &str, markdown: &str) {
    write(root, format!("{BLOGS_DIR}/{slug}/index.md"), markdown);
}

fn options(tmp: &TempDir, include_hidden: bool) -> BuildOptions {
    BuildOptions {
        root: tmp.path().join("content"),
        out: tmp.path().join("out"),
        include_hidden,
    }
}

fn snapshot(root: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    out.sort();
    out
}

const INDEX: &str = r#"[
  {"slug":"first","title":"First","tags":["a"],"date":"2024-02-01T09:00"},
  {"slug":"secret","title":"Secret","date":"2023-06-01T09:00","hidden":true},
  {"slug":"math","title":"Math","date":"2023-01-01T09:00","category":"notes"}
]"#;

fn content(tmp: &TempDir) -> PathBuf {
    let root = tmp.path().join("content");
    write(&root, INDEX_PATH, INDEX);
    write_post(&root, "first", "# First\n\n```rust\nfn main() {}\n```\n");
    write_post(&root, "secret", "# Secret");
    write_post(&root, "math", "# Math\n\n$$e^{i\\pi}+1=0$$\n");
    root
}

#[test]
fn build_emits_posts_index_and_stylesheet() {
    let tmp = TempDir::new().unwrap();
    content(&tmp);
    let opts = options(&tmp, false);

    let count = build_at(&opts).unwrap();
    assert_eq!(count, 2);

    let files = snapshot(&opts.out);
    assert_eq!(
        files,
        [
            PathBuf::from(POSTS_DIR).join("first.html"),
            PathBuf::from(POSTS_DIR).join("math.html"),
            PathBuf::from("highlight.css"),
            PathBuf::from("index.html"),
        ]
    );

    let index = fs::read_to_string(opts.out.join("index.html")).unwrap();
    assert!(index.contains("<h2>2024</h2>"));
    assert!(index.contains("<h2>2023</h2>"));
    assert!(index.find("First").unwrap() < index.find("Math").unwrap());
    assert!(!index.contains("Secret"));

    let first = fs::read_to_string(opts.out.join(POSTS_DIR).join("first.html")).unwrap();
    assert!(first.contains(r#"href="../highlight.css""#));
    assert!(first.contains(r#"<pre data-code="#));
    assert!(!first.contains("katex.min.css"));

    let math = fs::read_to_string(opts.out.join(POSTS_DIR).join("math.html")).unwrap();
    assert!(math.contains("katex.min.css"));
}

#[test]
fn hidden_posts_are_included_on_request() {
    let tmp = TempDir::new().unwrap();
    content(&tmp);
    let opts = options(&tmp, true);
    assert_eq!(build_at(&opts).unwrap(), 3);
    assert!(opts.out.join(POSTS_DIR).join("secret.html").exists());
}

#[test]
fn missing_markdown_names_the_post() {
    let tmp = TempDir::new().unwrap();
    let root = content(&tmp);
    fs::remove_file(root.join(BLOGS_DIR).join("math/index.md")).unwrap();

    let err = build_at(&options(&tmp, false)).unwrap_err();
    assert!(format!("{err}").contains("math"));
}

#[test]
fn missing_index_is_an_error() {
    let tmp = TempDir::new().unwrap();
    assert!(build_at(&options(&tmp, false)).is_err());
}

#[test]
fn orphan_directories_do_not_fail_the_build() {
    let tmp = TempDir::new().unwrap();
    let root = content(&tmp);
    write_post(&root, "orphan", "# Not indexed");
    assert_eq!(build_at(&options(&tmp, false)).unwrap(), 2);
}

#[test]
fn unsafe_slugs_never_escape_the_output_dir() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("content");
    write(
        &root,
        INDEX_PATH,
        r#"[
          {"slug":"../../pwned","title":"Up","date":"2024-03-01T00:00"},
          {"slug":"a/b","title":"Nested","date":"2024-02-01T00:00"},
          {"slug":"","title":"Empty","date":"2024-01-15T00:00"},
          {"slug":"fine","title":"Fine","date":"2024-01-01T00:00"}
        ]"#,
    );
    write(&root, "pwned/index.md", "# gotcha");
    write_post(&root, "fine", "# Fine");
    let opts = options(&tmp, false);

    assert_eq!(build_at(&opts).unwrap(), 1);
    assert!(!tmp.path().join("pwned.html").exists());
    assert!(!tmp.path().join("out/pwned.html").exists());
    let files = snapshot(&opts.out);
    assert!(files.contains(&PathBuf::from(POSTS_DIR).join("fine.html")));
    assert_eq!(files.len(), 3);
    let listing = fs::read_to_string(opts.out.join("index.html")).unwrap();
    assert!(!listing.contains("pwned"));
}

#[test]
fn build_is_deterministic() {
    let mut runner = TestRunner::new(Config {
        cases: 8,
        failure_persistence: None,
        ..Config::default()
    });

    runner
        .run(
            &proptest::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,3}", 1..4),
            |titles| {
                let tmp = TempDir::new().unwrap();
                let root = tmp.path().join("content");
                let items: Vec<_> = titles
                    .iter()
                    .enumerate()
                    .map(|(n, title)| {
                        serde_json::json!({
                            "slug": format!("p{n}"),
                            "title": title,
                            "date": format!("2024-01-{:02}T00:00", n + 1),
                        })
                    })
                    .collect();
                write(&root, INDEX_PATH, &serde_json::to_string(&items).unwrap());
                for (n, title) in titles.iter().enumerate() {
                    write_post(&root, &format!("p{n}"), &format!("# {title}\n\nbody"));
                }

                let opts = options(&tmp, false);
                build_at(&opts).unwrap();
                let first: Vec<_> = snapshot(&opts.out)
                    .into_iter()
                    .map(|p| fs::read(opts.out.join(&p)).unwrap())
                    .collect();
                build_at(&opts).unwrap();
                let second: Vec<_> = snapshot(&opts.out)
                    .into_iter()
                    .map(|p| fs::read(opts.out.join(&p)).unwrap())
                    .collect();
                prop_assert_eq!(first, second);
                Ok(())
            },
        )
        .unwrap();
}

#[test]
fn collect_index_reads_every_config() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(
        root,
        format!("{BLOGS_DIR}/old/config.json"),
        r#"{"title":"Old","date":"2022-01-01T00:00"}"#,
    );
    write(
        root,
        format!("{BLOGS_DIR}/new/config.json"),
        r#"{"title":"New","date":"2024-01-01T00:00","hidden":true}"#,
    );
    write_post(root, "no-config", "# skipped");

    let index = collect_index(root).unwrap();
    let slugs: Vec<_> = index.items().iter().map(|i| i.slug.as_str()).collect();
    assert_eq!(slugs, ["new", "old"]);
    assert!(index.get("new").unwrap().is_hidden());

    write(root, format!("{BLOGS_DIR}/bad/config.json"), "{");
    assert!(collect_index(root).is_err());
}
