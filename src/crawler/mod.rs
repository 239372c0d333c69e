//! The spider: polite concurrent crawling from seed URLs
//!
//! Components:
//! - `Frontier`: time-ordered URL queue enforcing per-host politeness
//! - `RobotsCache`: robots.txt rules, fetched once per host
//! - `Fetcher`: HTTP retrieval with content-type and size guards
//! - `BrowserFetcher`: headless-browser fallback for JS-heavy pages
//! - `PageParser`: title/description/content/link extraction
//! - `CrawlScheduler`: the worker pool draining the frontier

pub mod browser;
pub mod fetcher;
pub mod frontier;
pub mod parser;
pub mod robots;
pub mod scheduler;

pub use fetcher::{FetchError, Fetcher};
pub use frontier::{Frontier, Next};
pub use parser::PageParser;
pub use scheduler::{CrawlScheduler, SchedulerConfig};
