//! Resumable streaming index builder
//!
//! Pulls crawled pages in id order after the resume cursor, pushes each
//! batch through the text pipeline into the index store, then runs the
//! global TF-IDF recompute over the complete corpus. A crash or shutdown
//! between batches loses nothing: the cursor is `MAX(indexed_pages.doc_id)`
//! and the marker rows gate reprocessing, so rerunning continues where the
//! last commit left off.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

use crate::storage::index_store::IndexableDocument;
use crate::storage::{IndexStore, PageStore};
use crate::textproc::TextProcessor;

pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Outcome of one builder run.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    /// Documents committed during this run.
    pub documents_indexed: usize,
    /// Corpus size after the run.
    pub total_documents: i64,
    /// False when a shutdown request stopped the run before the recompute.
    pub completed: bool,
}

/// Single-threaded batch indexer over the two stores.
pub struct IndexBuilder {
    pages: PageStore,
    index: IndexStore,
    processor: TextProcessor,
    batch_size: usize,
}

impl IndexBuilder {
    pub fn open(
        spider_db: impl AsRef<std::path::Path>,
        index_db: impl AsRef<std::path::Path>,
        batch_size: usize,
    ) -> Result<Self> {
        let pages = PageStore::open(spider_db).context("failed to open spider database")?;
        let index = IndexStore::open(index_db).context("failed to open index database")?;
        Ok(Self {
            pages,
            index,
            processor: TextProcessor::new(),
            batch_size: if batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
        })
    }

    /// Index everything after the resume cursor, then recompute TF-IDF.
    /// `cancel` is observed between batches; a cancelled run leaves
    /// `indexing_complete = false` and every committed batch intact.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<IndexSummary> {
        self.index.set_metadata("indexing_complete", "false")?;

        let mut cursor = self.index.last_indexed_page_id()?;
        info!("resuming indexing after page id {}", cursor);

        let mut documents_indexed = 0usize;
        loop {
            if cancel.load(Ordering::Relaxed) {
                info!("shutdown requested; stopping after the current batch");
                return Ok(IndexSummary {
                    documents_indexed,
                    total_documents: self.index.indexed_page_count()?,
                    completed: false,
                });
            }

            let batch = self.pages.pages_after(cursor, self.batch_size)?;
            let Some(last) = batch.last() else {
                break;
            };
            cursor = last.id;

            let docs: Vec<IndexableDocument> = batch
                .iter()
                .map(|page| IndexableDocument {
                    doc_id: page.id,
                    url: page.url.clone(),
                    terms: self.processor.process_document(
                        &page.title,
                        &page.description,
                        &page.content,
                    ),
                })
                .collect();

            self.index.index_batch(&docs)?;
            documents_indexed += docs.len();
            info!(
                "committed batch of {} documents (cursor at page id {})",
                docs.len(),
                cursor
            );
        }

        info!("recomputing global TF-IDF");
        self.index.recalculate_tfidf()?;
        self.index.set_metadata("indexing_complete", "true")?;

        let total_documents = self.index.indexed_page_count()?;
        info!(
            "indexing complete: {} documents in corpus ({} new this run)",
            total_documents, documents_indexed
        );

        Ok(IndexSummary {
            documents_indexed,
            total_documents,
            completed: true,
        })
    }
}
