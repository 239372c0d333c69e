//! Crawl worker pool
//!
//! A fixed-size pool of tokio tasks drains the frontier. Each worker loop
//! checks cancellation and the page budget, dequeues the next ready URL
//! (backing off outside the frontier lock when nothing is ready yet), and
//! runs the fetch → parse → store pipeline. No page-level failure kills a
//! worker; everything is logged and dropped.

use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::crawler::browser::BrowserFetcher;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Frontier, Next};
use crate::crawler::parser::PageParser;
use crate::storage::{Page, PageStore};
use crate::urlnorm;

/// Sleep when the frontier looks momentarily empty but another worker may
/// still be holding links to enqueue.
const EMPTY_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of parallel crawl workers.
    pub workers: usize,
    /// Stop once this many pages are persisted; 0 means unlimited.
    pub max_pages: usize,
    pub user_agent: String,
}

/// Supervises the crawl: worker tasks, shared counters, shutdown.
pub struct CrawlScheduler {
    config: SchedulerConfig,
    frontier: Arc<Frontier>,
    fetcher: Fetcher,
    browser: BrowserFetcher,
    parser: Arc<PageParser>,
    store: Arc<PageStore>,
    cancel: Arc<AtomicBool>,
    page_count: AtomicUsize,
    browser_fetched_count: AtomicUsize,
}

impl CrawlScheduler {
    pub fn new(
        store: Arc<PageStore>,
        frontier: Arc<Frontier>,
        config: SchedulerConfig,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(&config.user_agent)?;
        let browser = BrowserFetcher::new(&config.user_agent);

        Ok(Self {
            config,
            frontier,
            fetcher,
            browser,
            parser: Arc::new(PageParser::new()),
            store,
            cancel,
            page_count: AtomicUsize::new(0),
            browser_fetched_count: AtomicUsize::new(0),
        })
    }

    /// Enqueue a seed URL, bypassing politeness pacing.
    pub fn add_seed(&self, url: &str) {
        self.frontier.add_url(url);
    }

    /// Run the worker pool to completion (frontier drained, page budget
    /// reached, or cancellation observed by every worker).
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        info!("starting crawler with {} workers", self.config.workers);

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.workers {
            let scheduler = Arc::clone(self);
            workers.spawn(async move { scheduler.worker(worker_id).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("crawl worker panicked: {}", e);
            }
        }

        info!(
            "crawling completed: {} pages ({} browser-fetched)",
            self.page_count.load(Ordering::Relaxed),
            self.browser_fetched_count.load(Ordering::Relaxed),
        );
        Ok(())
    }

    pub fn pages_crawled(&self) -> usize {
        self.page_count.load(Ordering::Relaxed)
    }

    async fn worker(&self, worker_id: usize) {
        loop {
            if self.cancel.load(Ordering::Relaxed) {
                debug!("worker {} shutting down", worker_id);
                return;
            }
            if self.should_stop() {
                debug!("worker {}: reached max pages limit", worker_id);
                return;
            }

            match self.frontier.next() {
                Next::Ready(url) => {
                    debug!("worker {}: crawling {}", worker_id, url);
                    match self.crawl_url(&url).await {
                        Ok(true) => {
                            self.page_count.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {}
                        Err(e) => debug!("worker {}: error crawling {}: {}", worker_id, url, e),
                    }
                }
                Next::NotReady(wait) => tokio::time::sleep(wait).await,
                Next::Empty => {
                    if self.frontier.is_empty() {
                        debug!("worker {}: frontier empty, exiting", worker_id);
                        return;
                    }
                    tokio::time::sleep(EMPTY_BACKOFF).await;
                }
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.config.max_pages > 0 && self.page_count.load(Ordering::Relaxed) >= self.config.max_pages
    }

    /// Crawl one URL end to end. `Ok(true)` means a page was persisted.
    async fn crawl_url(&self, url: &str) -> Result<bool> {
        // Phase 1: fast HTTP fetch
        let fetched = self.fetcher.fetch(url).await?;

        let parsed = self
            .parse_off_thread(
                fetched.body,
                url,
                fetched.content_language.clone(),
                fetched.status,
            )
            .await?;
        let Some((mut page, mut links)) = parsed else {
            debug!("skipping non-English page: {}", url);
            return Ok(false);
        };

        // Phase 2: headless-browser retry for JS-rendered pages
        if !page.has_sufficient_content() {
            debug!("insufficient content from HTTP fetch, retrying with browser: {}", url);

            let html = match self.browser.fetch_html(url).await {
                Ok(html) => html,
                Err(e) => {
                    debug!("browser fetch failed, skipping {}: {}", url, e);
                    return Ok(false);
                }
            };

            match self.parse_off_thread(html, url, None, 200).await? {
                Some((browser_page, browser_links)) if browser_page.has_sufficient_content() => {
                    page = browser_page;
                    links = browser_links;
                    self.browser_fetched_count.fetch_add(1, Ordering::Relaxed);
                }
                _ => {
                    debug!("insufficient content even after browser fetch: {}", url);
                    return Ok(false);
                }
            }
        }

        let canonical = urlnorm::normalize(&page.url).unwrap_or_else(|| page.url.clone());
        self.store.save_page(&Page {
            url: canonical.clone(),
            title: page.title,
            description: page.description,
            content: page.content,
            status_code: page.status_code,
            crawled_at: Utc::now(),
        })?;

        if !links.is_empty() {
            if let Err(e) = self.store.save_links(&canonical, &links) {
                warn!("failed to save links from {}: {}", canonical, e);
            }
            self.frontier.add_urls(&links);
            debug!("added {} harvested links from {}", links.len(), canonical);
        }

        Ok(true)
    }

    /// HTML parsing is CPU-bound; keep it off the async runtime.
    async fn parse_off_thread(
        &self,
        html: String,
        url: &str,
        content_language: Option<String>,
        status: u16,
    ) -> Result<Option<(crate::crawler::parser::ParsedPage, Vec<String>)>> {
        let parser = Arc::clone(&self.parser);
        let url = url.to_string();
        let parsed = tokio::task::spawn_blocking(move || {
            parser.parse(&html, &url, content_language.as_deref(), status)
        })
        .await?;
        Ok(parsed)
    }
}
