use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use mite::config::Config;
use mite::feed::{build_client, find_feeds, parse_feed, Feed, FeedLookupEntry};
use mite::storage::{JsonRepository, Repository, Subscription};
use mite::subscriptions::{self, RefreshOutcome};
use mite::util::{format_date, strip_control_chars};

/// Get the config directory path (~/.config/mite/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("mite"))
}

/// SEC-001: Feed-supplied text is sanitized before it reaches the terminal.
fn clean(s: &str) -> Cow<'_, str> {
    strip_control_chars(s)
}

#[derive(Parser, Debug)]
#[command(name = "mite", about = "RSS and Atom feed reader")]
struct Args {
    /// Config file (default: ~/.config/mite/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the feeds available at a URL (a feed, or a page linking to feeds)
    Discover { url: String },
    /// Subscribe to a feed found at a URL
    Subscribe {
        url: String,
        /// Which discovered feed to subscribe to (1-based, as listed by `discover`)
        #[arg(long, value_name = "N", conflicts_with = "all")]
        pick: Option<usize>,
        /// Subscribe to every discovered feed
        #[arg(long)]
        all: bool,
    },
    /// List subscriptions
    List,
    /// Show the stored items of a subscription
    Show {
        id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Check subscriptions for new content (all of them unless an id is given)
    Poll { id: Option<String> },
    /// Remove a subscription and its stored content
    Remove { id: String },
    /// Parse a local RSS/Atom file and print it as JSON
    Parse { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `parse` output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Parsing a local file needs neither network nor storage
    if let Command::Parse { file } = &args.command {
        return parse_file(file);
    }

    let client = build_client(&config).context("Failed to build HTTP client")?;
    let data_dir = config
        .data_dir()
        .context("Cannot determine data directory: set data_dir in config.toml")?;
    let repo = JsonRepository::open(&data_dir)
        .await
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;

    match args.command {
        Command::Discover { url } => discover(&client, &url).await,
        Command::Subscribe { url, pick, all } => subscribe(&client, &repo, &url, pick, all).await,
        Command::List => list(&repo).await,
        Command::Show { id, limit } => show(&repo, &id, limit).await,
        Command::Poll { id } => poll(&client, &repo, &config, id.as_deref()).await,
        Command::Remove { id } => {
            let removed = subscriptions::unsubscribe(&repo, &id).await?;
            println!("Removed {}", clean(&removed.title));
            Ok(())
        }
        Command::Parse { file } => parse_file(&file),
    }
}

fn parse_file(path: &Path) -> Result<()> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let feed = parse_feed(&xml).with_context(|| format!("Failed to parse {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&feed)?);
    Ok(())
}

fn print_entries(entries: &[FeedLookupEntry]) {
    for (index, entry) in entries.iter().enumerate() {
        let title = if entry.title.is_empty() {
            "(untitled)"
        } else {
            entry.title.as_str()
        };
        println!("{:>3}. {}", index + 1, clean(title));
        println!("     {}", clean(&entry.url));
    }
}

async fn discover(client: &reqwest::Client, url: &str) -> Result<()> {
    let entries = find_feeds(client, url).await?;
    if entries.is_empty() {
        println!("No feeds found at {url}");
    } else {
        print_entries(&entries);
    }
    Ok(())
}

async fn subscribe(
    client: &reqwest::Client,
    repo: &JsonRepository,
    url: &str,
    pick: Option<usize>,
    all: bool,
) -> Result<()> {
    let mut entries = find_feeds(client, url).await?;

    match (entries.len(), pick) {
        (0, _) => bail!("No feeds found at {url}"),
        (_, Some(n)) if n == 0 || n > entries.len() => {
            bail!("--pick must be between 1 and {}", entries.len())
        }
        (_, Some(n)) => entries[n - 1].subscribe = true,
        (1, None) => entries[0].subscribe = true,
        (_, None) if all => entries.iter_mut().for_each(|e| e.subscribe = true),
        (_, None) => {
            print_entries(&entries);
            bail!("Several feeds found; choose one with --pick N or use --all");
        }
    }

    let mut failed = 0;
    for result in subscriptions::subscribe_selected(client, repo, entries).await {
        match result {
            Ok(sub) => println!("Subscribed to {} ({})", clean(&sub.title), sub.id),
            Err(e) => {
                failed += 1;
                eprintln!("Error: {e}");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} subscription(s) failed");
    }
    Ok(())
}

async fn list(repo: &JsonRepository) -> Result<()> {
    let subs = repo.list().await?;
    if subs.is_empty() {
        println!("No subscriptions. Add one with: mite subscribe <url>");
    }
    for sub in subs {
        println!("{}  {}", sub.id, clean(&sub.title));
        println!("    {}", clean(&sub.url));
    }
    Ok(())
}

async fn find_subscription(repo: &JsonRepository, id: &str) -> Result<Subscription> {
    repo.get(id)
        .await?
        .with_context(|| format!("No subscription with id {id}"))
}

async fn show(repo: &JsonRepository, id: &str, limit: usize) -> Result<()> {
    let sub = find_subscription(repo, id).await?;
    let feed = subscriptions::load_feed(repo, &sub).await?;
    print_feed(&feed, limit);
    Ok(())
}

fn print_feed(feed: &Feed, limit: usize) {
    println!("{}", clean(&feed.title));
    if !feed.link.is_empty() {
        println!("{}", clean(&feed.link));
    }
    if let Some(description) = &feed.description {
        println!("{}", clean(description));
    }

    for item in feed.items.iter().take(limit) {
        println!();
        println!("* {}", clean(&item.title));
        let date = item
            .published
            .as_deref()
            .map(|raw| format_date(raw).unwrap_or_else(|| raw.to_owned()));
        match (date, item.authors.first()) {
            (Some(date), Some(author)) => println!("  {} by {}", clean(&date), clean(author)),
            (Some(date), None) => println!("  {}", clean(&date)),
            (None, Some(author)) => println!("  by {}", clean(author)),
            (None, None) => {}
        }
        if !item.categories.is_empty() {
            println!("  [{}]", clean(&item.categories.join(", ")));
        }
        println!("  {}", clean(&item.link));
    }

    if feed.items.len() > limit {
        println!();
        println!("({} more)", feed.items.len() - limit);
    }
}

async fn poll(
    client: &reqwest::Client,
    repo: &JsonRepository,
    config: &Config,
    id: Option<&str>,
) -> Result<()> {
    let subs = match id {
        Some(id) => vec![find_subscription(repo, id).await?],
        None => repo.list().await?,
    };

    let results: Vec<_> = stream::iter(subs)
        .map(|sub| async move {
            let outcome = subscriptions::refresh(client, repo, &sub).await;
            (sub, outcome)
        })
        .buffer_unordered(config.max_concurrent_polls.max(1))
        .collect()
        .await;

    let mut failed = 0;
    for (sub, outcome) in results {
        match outcome {
            Ok(RefreshOutcome::Unchanged) => println!("{}: up to date", clean(&sub.title)),
            Ok(RefreshOutcome::Updated { feed, .. }) => {
                println!("{}: updated, {} items", clean(&sub.title), feed.items.len())
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", clean(&sub.title), e);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} feed(s) failed to refresh");
    }
    Ok(())
}
