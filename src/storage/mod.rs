//! Embedded SQLite persistence
//!
//! Two separate databases with disjoint ownership: the page store belongs
//! to the spider (pages + link graph), the index store to the indexer
//! (terms, postings, document stats, metadata). The only coupling is the
//! integer doc id, which is the page row id.

pub mod index_store;
pub mod page_store;

pub use index_store::IndexStore;
pub use page_store::{Page, PageStore, StoredPage};
