//! tally CLI - Main entry point

mod output;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tally_core::{Engine, FetchRequest, Fetcher, HtmlPage, HttpFetcher};
use tally_foundation::{JsonSessionStore, MemorySessionStore, SessionStore, TallyConfig};
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

/// tally - line and entry counts for a repository listing page
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listing page URL (repository root or tree view)
    url: String,

    /// Maximum concurrent fetches
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Cache TTL in seconds
    #[arg(long)]
    ttl: Option<u64>,

    /// Persist the cache under this session id
    #[arg(short, long)]
    session: Option<String>,

    /// Print results as a JSON array
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging (stderr, so --json output stays clean)
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load configuration, flags win
    let mut config = TallyConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config: {}", e);
        let mut config = TallyConfig::default();
        config.apply_env();
        config
    });
    if let Some(max) = args.concurrency {
        config = config.max_concurrent(max);
    }
    if let Some(ttl) = args.ttl {
        config = config.ttl_secs(ttl);
    }

    let session: Arc<dyn SessionStore> = match &args.session {
        Some(id) => Arc::new(
            JsonSessionStore::open(id).with_context(|| format!("cannot open session {}", id))?,
        ),
        None => Arc::new(MemorySessionStore::new()),
    };

    let url = Url::parse(&args.url).with_context(|| format!("invalid URL {}", args.url))?;
    config = with_listing_origin(config, &url);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.http)?);

    let html = fetcher
        .fetch(FetchRequest::get(url.clone()))
        .await
        .and_then(|response| response.text())
        .with_context(|| format!("failed to fetch listing page {}", url))?;

    let page = Arc::new(HtmlPage::parse(url.as_str(), &html, config.selectors.clone()));
    let engine = Engine::builder(config)
        .page(page.clone())
        .fetcher(fetcher)
        .session(Arc::clone(&session))
        .build()?;

    let report = engine.scan().await;
    if report.candidates == 0 {
        warn!("No listing entries found on {}", url);
    }
    debug!(
        "Scan: {:?}, cache: {:?}, limiter: {:?}",
        report,
        engine.cache_stats(),
        engine.limiter_snapshot()
    );

    if let Err(e) = session.flush() {
        warn!("Failed to persist session: {}", e);
    }

    let rows = output::collect(&page, &engine.config().classifier);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&output::to_json(&rows))?);
    } else {
        for line in output::to_lines(&rows) {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Resolve hrefs against the listing's own origin unless one was configured
fn with_listing_origin(config: TallyConfig, url: &Url) -> TallyConfig {
    if config.origin != TallyConfig::default().origin {
        return config;
    }
    let origin = url.origin();
    if !origin.is_tuple() {
        return config;
    }
    config.origin(origin.ascii_serialization())
}
