//! DeiSearch CLI: `crawl` runs the spider, `index` runs the index builder.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deisearch::config::Config;
use deisearch::crawler::{CrawlScheduler, Frontier, SchedulerConfig};
use deisearch::indexer::IndexBuilder;
use deisearch::storage::PageStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "deisearch")]
#[command(about = "Polite web crawler and TF-IDF index builder")]
#[command(version)]
struct Cli {
    /// Configuration file path (optional; CLI flags override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the web from seed URLs into the page store
    Crawl {
        /// Page store database path
        #[arg(long)]
        db: PathBuf,

        /// Seed URL list, one per line ('#' comments allowed)
        #[arg(long)]
        seeds: PathBuf,

        /// Number of parallel workers
        #[arg(long)]
        workers: Option<usize>,

        /// Minimum seconds between fetches of the same host (may be sub-second)
        #[arg(long)]
        rate_limit_seconds: Option<f32>,

        /// Stop after this many pages (0 = unlimited)
        #[arg(long)]
        max_pages: Option<usize>,

        /// User-Agent header
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Build the inverted index from crawled pages
    Index {
        /// Page store database produced by `crawl`
        #[arg(long)]
        spider_db: PathBuf,

        /// Index database path
        #[arg(long)]
        index_db: PathBuf,

        /// Pages committed per transaction
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Crawl {
            db,
            seeds,
            workers,
            rate_limit_seconds,
            max_pages,
            user_agent,
        } => {
            if let Some(workers) = workers {
                config.crawler.workers = workers;
            }
            if let Some(rate) = rate_limit_seconds {
                config.crawler.rate_limit_seconds = rate;
            }
            if let Some(max_pages) = max_pages {
                config.crawler.max_pages = max_pages;
            }
            if let Some(user_agent) = user_agent {
                config.crawler.user_agent = user_agent;
            }
            config.validate()?;
            crawl(config, db, seeds).await
        }
        Commands::Index {
            spider_db,
            index_db,
            batch_size,
        } => {
            if let Some(batch_size) = batch_size {
                config.indexer.batch_size = batch_size;
            }
            config.validate()?;
            index(config, spider_db, index_db).await
        }
    }
}

async fn crawl(config: Config, db: PathBuf, seeds_path: PathBuf) -> Result<()> {
    let seeds = load_seeds(&seeds_path)
        .with_context(|| format!("failed to read seed list {}", seeds_path.display()))?;
    if seeds.is_empty() {
        bail!("seed list {} contains no URLs", seeds_path.display());
    }

    info!("initializing page store at {}", db.display());
    let store = Arc::new(PageStore::open(&db)?);

    let crawled_urls = store.load_all_crawled_urls().unwrap_or_else(|e| {
        warn!("failed to load crawled URLs: {}", e);
        Vec::new()
    });
    info!("rehydrated seen set with {} crawled URLs", crawled_urls.len());

    let frontier = Arc::new(Frontier::new(
        &crawled_urls,
        Duration::from_secs_f32(config.crawler.rate_limit_seconds),
    ));

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_signal_watcher(Arc::clone(&cancel));

    let scheduler = Arc::new(CrawlScheduler::new(
        Arc::clone(&store),
        frontier,
        SchedulerConfig {
            workers: config.crawler.workers,
            max_pages: config.crawler.max_pages,
            user_agent: config.crawler.user_agent.clone(),
        },
        cancel,
    )?);

    for seed in &seeds {
        scheduler.add_seed(seed);
    }
    info!("added {} seed URLs", seeds.len());

    scheduler.run().await?;

    info!(
        "page store saved to {} ({} pages total)",
        db.display(),
        store.page_count().unwrap_or_default()
    );
    Ok(())
}

async fn index(config: Config, spider_db: PathBuf, index_db: PathBuf) -> Result<()> {
    info!("spider db: {}", spider_db.display());
    info!("index db: {}", index_db.display());
    info!("batch size: {}", config.indexer.batch_size);

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_signal_watcher(Arc::clone(&cancel));

    let mut builder = IndexBuilder::open(&spider_db, &index_db, config.indexer.batch_size)?;

    // The builder is synchronous by design; keep it off the async runtime.
    let worker_cancel = Arc::clone(&cancel);
    let summary = tokio::task::spawn_blocking(move || builder.run(&worker_cancel)).await??;

    if summary.completed {
        info!(
            "indexing completed successfully: {} documents in corpus",
            summary.total_documents
        );
    } else {
        info!(
            "indexing interrupted after {} documents; rerun to resume",
            summary.documents_indexed
        );
    }
    Ok(())
}

fn load_seeds(path: &PathBuf) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn spawn_signal_watcher(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down gracefully");
            }
            _ = wait_for_sigterm() => {
                info!("received SIGTERM, shutting down gracefully");
            }
        }
        cancel.store(true, Ordering::Relaxed);
    });
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
