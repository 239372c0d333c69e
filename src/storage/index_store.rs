//! Inverted-index store: terms, postings, document stats, metadata
//!
//! Exclusively owned by the index builder and opened with a single writer
//! connection. Document commits happen in batch-sized transactions; TF and
//! TF-IDF columns stay zero until the global recompute pass fills them in
//! from the complete corpus.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::storage::page_store::apply_pragmas;
use crate::textproc::ProcessedDocument;

const SCHEMA: &str = r#"
-- Terms dictionary: one row per distinct stemmed term
CREATE TABLE IF NOT EXISTS terms (
    term_id INTEGER PRIMARY KEY AUTOINCREMENT,
    term TEXT UNIQUE NOT NULL,
    document_frequency INTEGER DEFAULT 0,
    idf REAL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_terms_term ON terms(term);

-- Postings: the inverted index itself
CREATE TABLE IF NOT EXISTS postings (
    term_id INTEGER NOT NULL,
    doc_id INTEGER NOT NULL,
    term_frequency INTEGER NOT NULL,
    tf REAL DEFAULT 0,
    tfidf REAL DEFAULT 0,
    PRIMARY KEY (term_id, doc_id),
    FOREIGN KEY (term_id) REFERENCES terms(term_id),
    FOREIGN KEY (doc_id) REFERENCES indexed_pages(doc_id)
);
CREATE INDEX IF NOT EXISTS idx_postings_term ON postings(term_id);
CREATE INDEX IF NOT EXISTS idx_postings_doc ON postings(doc_id);
-- Composite index for ranked lookups
CREATE INDEX IF NOT EXISTS idx_postings_term_tfidf ON postings(term_id, tfidf DESC, doc_id);

-- Per-document statistics for TF normalization
CREATE TABLE IF NOT EXISTS doc_stats (
    doc_id INTEGER PRIMARY KEY,
    doc_length INTEGER NOT NULL,
    unique_terms INTEGER NOT NULL,
    indexed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (doc_id) REFERENCES indexed_pages(doc_id)
);

-- Marker rows proving a spider page has been consumed; MAX(doc_id) is the
-- resume cursor
CREATE TABLE IF NOT EXISTS indexed_pages (
    doc_id INTEGER PRIMARY KEY,
    source_url TEXT NOT NULL,
    indexed_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_indexed_pages_url ON indexed_pages(source_url);

-- Global indexing state
CREATE TABLE IF NOT EXISTS index_metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

INSERT OR IGNORE INTO index_metadata (key, value) VALUES
    ('total_documents', '0'),
    ('last_indexed_page_id', '0'),
    ('index_version', '1'),
    ('indexing_complete', 'false');
"#;

/// One page's worth of index input, keyed by its page-store row id.
#[derive(Debug, Clone)]
pub struct IndexableDocument {
    pub doc_id: i64,
    pub url: String,
    pub terms: ProcessedDocument,
}

/// SQLite-backed inverted-index store.
pub struct IndexStore {
    conn: Connection,
}

impl IndexStore {
    /// Open (or create) the store and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("failed to open index store at {:?}", path.as_ref()))?;
        apply_pragmas(&conn)?;
        conn.execute_batch(SCHEMA)
            .context("failed to apply index store schema")?;
        Ok(Self { conn })
    }

    /// The resume cursor: highest doc id ever committed, 0 when empty.
    /// MAX over the marker table is trivially correct across crash and
    /// rollback, unlike a separately maintained counter.
    pub fn last_indexed_page_id(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COALESCE(MAX(doc_id), 0) FROM indexed_pages", [], |row| {
                row.get(0)
            })
            .context("failed to read resume cursor")
    }

    pub fn indexed_page_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM indexed_pages", [], |row| row.get(0))
            .context("failed to count indexed pages")
    }

    /// Commit one batch of documents in a single transaction: marker row,
    /// doc stats, term dictionary updates, and raw postings. A failure rolls
    /// the whole batch back, leaving the resume cursor at the previous
    /// committed batch.
    pub fn index_batch(&mut self, docs: &[IndexableDocument]) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut insert_page = tx.prepare_cached(
                "INSERT OR IGNORE INTO indexed_pages (doc_id, source_url) VALUES (?1, ?2)",
            )?;
            let mut insert_stats = tx.prepare_cached(
                "INSERT OR REPLACE INTO doc_stats (doc_id, doc_length, unique_terms)
                 VALUES (?1, ?2, ?3)",
            )?;
            let mut get_term = tx.prepare_cached("SELECT term_id FROM terms WHERE term = ?1")?;
            let mut insert_term = tx
                .prepare_cached("INSERT INTO terms (term, document_frequency) VALUES (?1, 1)")?;
            let mut update_df = tx.prepare_cached(
                "UPDATE terms SET document_frequency = document_frequency + 1 WHERE term_id = ?1",
            )?;
            let mut insert_posting = tx.prepare_cached(
                "INSERT INTO postings (term_id, doc_id, term_frequency) VALUES (?1, ?2, ?3)",
            )?;

            for doc in docs {
                insert_page
                    .execute(params![doc.doc_id, doc.url])
                    .with_context(|| format!("failed to mark doc {} as indexed", doc.doc_id))?;
                insert_stats.execute(params![
                    doc.doc_id,
                    doc.terms.total_terms,
                    doc.terms.unique_terms
                ])?;

                for (term, freq) in &doc.terms.term_frequencies {
                    let existing: Option<i64> = get_term
                        .query_row(params![term], |row| row.get(0))
                        .optional()?;
                    let term_id = match existing {
                        Some(id) => {
                            update_df.execute(params![id])?;
                            id
                        }
                        None => {
                            insert_term.execute(params![term])?;
                            tx.last_insert_rowid()
                        }
                    };
                    insert_posting
                        .execute(params![term_id, doc.doc_id, freq])
                        .with_context(|| {
                            format!("failed to insert posting ({}, {})", term, doc.doc_id)
                        })?;
                }
            }

            // Bookkeeping only; resume correctness rests on MAX(doc_id).
            let last_id = docs.last().map(|d| d.doc_id).unwrap_or_default();
            tx.execute(
                "INSERT OR REPLACE INTO index_metadata (key, value, updated_at)
                 VALUES ('last_indexed_page_id', ?1, CURRENT_TIMESTAMP)",
                params![last_id.to_string()],
            )?;
        }
        tx.commit().context("failed to commit index batch")
    }

    /// Global recompute over the complete corpus, in one transaction:
    /// `IDF(t) = ln(N / df(t))`, then `TF = term_frequency / doc_length`
    /// and `TF-IDF = TF * IDF` for every posting. Idempotent.
    pub fn recalculate_tfidf(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;

        let total_docs: i64 =
            tx.query_row("SELECT COUNT(*) FROM indexed_pages", [], |row| row.get(0))?;

        let term_dfs: Vec<(i64, i64)> = {
            let mut stmt = tx
                .prepare("SELECT term_id, document_frequency FROM terms WHERE document_frequency > 0")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        {
            let mut update_idf = tx.prepare("UPDATE terms SET idf = ?1 WHERE term_id = ?2")?;
            for (term_id, df) in term_dfs {
                let idf = (total_docs as f64 / df as f64).ln();
                update_idf.execute(params![idf, term_id])?;
            }
        }

        tx.execute(
            "UPDATE postings
             SET tf = CAST(term_frequency AS REAL) / CAST(doc_stats.doc_length AS REAL),
                 tfidf = (CAST(term_frequency AS REAL) / CAST(doc_stats.doc_length AS REAL))
                         * terms.idf
             FROM doc_stats, terms
             WHERE postings.doc_id = doc_stats.doc_id
               AND postings.term_id = terms.term_id",
            [],
        )
        .context("failed to update TF-IDF columns")?;

        tx.execute(
            "UPDATE index_metadata SET value = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE key = 'total_documents'",
            params![total_docs.to_string()],
        )?;

        tx.commit().context("failed to commit TF-IDF recompute")
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO index_metadata (key, value, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)",
                params![key, value],
            )
            .with_context(|| format!("failed to set metadata {}", key))?;
        Ok(())
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM index_metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read metadata {}", key))
    }

    /// Read access for tests and ad-hoc inspection.
    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
