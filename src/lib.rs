//! DeiSearch: a polite concurrent web crawler and TF-IDF index builder
//!
//! Two cooperating subsystems share a pair of embedded SQLite stores:
//! - The spider crawls the open web from seed URLs, enforcing per-host
//!   politeness through a time-ordered frontier, and persists page content
//!   plus the outbound link graph.
//! - The indexer streams crawled pages through a tokenize/stem pipeline into
//!   an inverted index, resumable by doc id, finishing with a global TF-IDF
//!   recompute over the complete corpus.

pub mod config;
pub mod crawler;
pub mod indexer;
pub mod storage;
pub mod textproc;
pub mod tokenizer;
pub mod urlnorm;

pub use config::Config;
