use std::{env, fs, io::Write, path::PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::{
    Section,
    eyre::{Result, bail},
};
use libblog::{
    blog_index::{BlogIndex, Categories},
    config::{
        CATEGORIES_PATH, Credentials, ENV_BRANCH, ENV_OWNER, ENV_REPO, GitHubSettings, INDEX_PATH,
        OUTPUT_DIR,
    },
    github::{GitDataApi, GitHubClient, installation_token, to_base64},
    markdown::render_markdown,
    pipeline::{BuildOptions, build_at, collect_index},
    post::load_post,
    publish::{PublishMode, delete_blog, push_blog, save_blog_edits},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blog", version, about = "Write, render and publish blog posts")]
struct Cli {
    /// Repository owner, overrides BLOG_GITHUB_OWNER
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Repository name, overrides BLOG_GITHUB_REPO
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Branch to publish to, overrides BLOG_GITHUB_BRANCH
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a Markdown file to HTML on stdout
    Render {
        file: PathBuf,
        /// Print the table of contents as JSON instead
        #[arg(long)]
        toc: bool,
    },
    /// Render a local checkout of the content repository into a static site
    Build {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, default_value = OUTPUT_DIR)]
        out: PathBuf,
        #[arg(long)]
        include_hidden: bool,
    },
    /// Publish a post, uploading its local images
    Publish {
        file: PathBuf,
        #[arg(long)]
        slug: Option<String>,
        /// Update an existing post instead of creating one
        #[arg(long)]
        edit: bool,
    },
    /// Delete a post and its files
    Delete { slug: String },
    /// List published posts
    List {
        /// Include hidden posts
        #[arg(long)]
        all: bool,
    },
    /// Replace the category list
    Categories { names: Vec<String> },
    /// Remove several posts from the index and delete their files in one commit
    Unlist {
        #[arg(required = true)]
        slugs: Vec<String>,
    },
    /// Rebuild index.json from every post's config.json in a local checkout
    Reindex {
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

/// `RUST_LOG` wins when it holds usable directives; otherwise `-v` picks the
/// level.
fn log_filter(verbose: u8, rust_log: Option<String>) -> EnvFilter {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.to_string()))
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(verbose, env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();
}

impl Cli {
    /// Settings from the environment, with flags taking precedence.
    fn settings(&self) -> Result<GitHubSettings> {
        GitHubSettings::from_lookup(|key| {
            let flag = match key {
                ENV_OWNER => self.owner.clone(),
                ENV_REPO => self.repo.clone(),
                ENV_BRANCH => self.branch.clone(),
                _ => None,
            };
            flag.or_else(|| env::var(key).ok())
        })
        .suggestion("Pass --owner and --repo or set BLOG_GITHUB_OWNER and BLOG_GITHUB_REPO")
    }
}

async fn connect(settings: &GitHubSettings) -> Result<GitHubClient> {
    let token = match settings.credentials()? {
        Credentials::Token(token) => token.to_string(),
        Credentials::App(app) => installation_token(settings, app)
            .await
            .with_note(|| format!("While signing in as GitHub App {}", app.app_id))?,
    };
    Ok(GitHubClient::new(settings, &token)?)
}

async fn current_index(api: &GitHubClient, settings: &GitHubSettings) -> Result<BlogIndex> {
    let text = api
        .read_text_file(INDEX_PATH, &settings.branch)
        .await
        .with_note(|| format!("While reading {INDEX_PATH}"))?;
    Ok(text
        .map(|t| BlogIndex::parse_lenient(&t))
        .unwrap_or_default())
}

async fn current_categories(api: &GitHubClient, settings: &GitHubSettings) -> Result<Categories> {
    let text = api
        .read_text_file(CATEGORIES_PATH, &settings.branch)
        .await
        .with_note(|| format!("While reading {CATEGORIES_PATH}"))?;
    Ok(text
        .map(|t| Categories::parse_lenient(&t))
        .unwrap_or_default())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Render { file, toc } => {
            let markdown = fs::read_to_string(file)
                .with_note(|| format!("While reading {}", file.display()))?;
            let rendered = render_markdown(&markdown);
            let mut stdout = std::io::stdout().lock();
            if *toc {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&rendered.toc)?)?;
            } else {
                stdout.write_all(rendered.html.as_bytes())?;
            }
        }
        Command::Build {
            root,
            out,
            include_hidden,
        } => {
            let pages = build_at(&BuildOptions {
                root: root.clone(),
                out: out.clone(),
                include_hidden: *include_hidden,
            })?;
            info!(pages, "build finished");
        }
        Command::Publish { file, slug, edit } => {
            let settings = cli.settings()?;
            let api = connect(&settings).await?;
            let mode = if *edit {
                PublishMode::Edit
            } else {
                PublishMode::Create
            };
            let request = load_post(file)?.into_request(slug.as_deref(), mode);
            let slug = request.form.slug.clone();
            let outcome = push_blog(&api, &settings, request).await?;
            println!("{slug} {}", outcome.commit);
        }
        Command::Delete { slug } => {
            let settings = cli.settings()?;
            let api = connect(&settings).await?;
            let commit = delete_blog(&api, &settings, slug).await?;
            println!("{commit}");
        }
        Command::List { all } => {
            let settings = cli.settings()?;
            let api = connect(&settings).await?;
            let index = current_index(&api, &settings).await?;
            for item in index.visible(*all) {
                let marker = if item.is_hidden() { " (hidden)" } else { "" };
                println!("{}\t{}\t{}{marker}", item.date, item.slug, item.title);
            }
        }
        Command::Categories { names } => {
            let settings = cli.settings()?;
            let api = connect(&settings).await?;
            let index = current_index(&api, &settings).await?;
            let items = index.into_items();
            let commit = save_blog_edits(&api, &settings, &items, items.clone(), names).await?;
            println!("{commit}");
        }
        Command::Unlist { slugs } => {
            let settings = cli.settings()?;
            let api = connect(&settings).await?;
            let index = current_index(&api, &settings).await?;
            if let Some(unknown) = slugs.iter().find(|s| index.get(s).is_none()) {
                bail!("no post named {unknown}");
            }
            let original = index.items().to_vec();
            let mut next = index;
            next.remove(slugs);
            let categories = current_categories(&api, &settings).await?;
            let commit = save_blog_edits(
                &api,
                &settings,
                &original,
                next.into_items(),
                &categories.categories,
            )
            .await?;
            println!("{commit}");
        }
        Command::Reindex { root } => {
            let settings = cli.settings()?;
            let api = connect(&settings).await?;
            let index = collect_index(root)?;
            info!(posts = index.len(), "rebuilt index");
            api.put_file(
                INDEX_PATH,
                &to_base64(index.to_json_pretty()?.as_bytes()),
                "Rebuild index",
                &settings.branch,
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn publish_parsing() {
        let cli = Cli::parse_from(["blog", "publish", "post.md", "--slug", "hello", "--edit"]);
        let Command::Publish { file, slug, edit } = cli.command else {
            panic!("expected publish");
        };
        assert_eq!(file, PathBuf::from("post.md"));
        assert_eq!(slug.as_deref(), Some("hello"));
        assert!(edit);
    }

    #[test]
    fn global_flags_feed_settings() {
        let cli = Cli::parse_from(["blog", "list", "--owner", "octo", "--repo", "site"]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.owner, "octo");
        assert_eq!(settings.repo, "site");
    }

    #[test]
    fn build_defaults() {
        let cli = Cli::parse_from(["blog", "build"]);
        let Command::Build {
            root,
            out,
            include_hidden,
        } = cli.command
        else {
            panic!("expected build");
        };
        assert_eq!(root, PathBuf::from("."));
        assert_eq!(out, PathBuf::from(OUTPUT_DIR));
        assert!(!include_hidden);
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        use tracing_subscriber::filter::LevelFilter;

        let filter = log_filter(2, Some("warn".to_string()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
        let filter = log_filter(1, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
        let filter = log_filter(0, Some("  ".to_string()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn unlist_requires_a_slug() {
        assert!(Cli::try_parse_from(["blog", "unlist"]).is_err());
    }
}
