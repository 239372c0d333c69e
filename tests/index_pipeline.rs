//! End-to-end indexer tests over real SQLite stores: build, invariants,
//! resume, and recompute idempotence.

use chrono::Utc;
use deisearch::indexer::IndexBuilder;
use deisearch::storage::{Page, PageStore};
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

fn save_page(store: &PageStore, slug: &str, title: &str, content: &str) {
    store
        .save_page(&Page {
            url: format!("https://example.com/{}", slug),
            title: title.to_string(),
            description: String::new(),
            content: content.to_string(),
            status_code: 200,
            crawled_at: Utc::now(),
        })
        .unwrap();
}

fn build(spider_db: &Path, index_db: &Path, batch_size: usize) -> deisearch::indexer::IndexSummary {
    let mut builder = IndexBuilder::open(spider_db, index_db, batch_size).unwrap();
    builder.run(&AtomicBool::new(false)).unwrap()
}

fn read_metadata(conn: &Connection, key: &str) -> String {
    conn.query_row(
        "SELECT value FROM index_metadata WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn test_full_build_satisfies_invariants() {
    let dir = TempDir::new().unwrap();
    let spider_db = dir.path().join("spider.db");
    let index_db = dir.path().join("index.db");

    let store = PageStore::open(&spider_db).unwrap();
    save_page(&store, "rust", "Rust language", "rust makes systems programming safe");
    save_page(&store, "web", "Web crawling", "crawling the web politely with rust workers");
    save_page(&store, "index", "Indexing", "inverted index construction over crawled pages");
    drop(store);

    let summary = build(&spider_db, &index_db, 2);
    assert!(summary.completed);
    assert_eq!(summary.documents_indexed, 3);
    assert_eq!(summary.total_documents, 3);

    let conn = Connection::open(&index_db).unwrap();

    // Exactly one marker row per page
    let indexed: i64 = conn
        .query_row("SELECT COUNT(*) FROM indexed_pages", [], |r| r.get(0))
        .unwrap();
    assert_eq!(indexed, 3);

    // document_frequency matches the actual posting count for every term
    let df_mismatches: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM terms t
             WHERE t.document_frequency !=
                   (SELECT COUNT(*) FROM postings p WHERE p.term_id = t.term_id)",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(df_mismatches, 0);

    // TF and TF-IDF match their definitions for every posting
    let bad_postings: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM postings p
             JOIN doc_stats d ON d.doc_id = p.doc_id
             JOIN terms t ON t.term_id = p.term_id
             WHERE ABS(p.tf - CAST(p.term_frequency AS REAL) / d.doc_length) > 1e-9
                OR ABS(p.tfidf - p.tf * t.idf) > 1e-9",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(bad_postings, 0);

    // Spot-check one IDF: "rust" appears in 2 of 3 documents
    let rust_idf: f64 = conn
        .query_row("SELECT idf FROM terms WHERE term = 'rust'", [], |r| r.get(0))
        .unwrap();
    assert!((rust_idf - (3.0f64 / 2.0).ln()).abs() < 1e-9);

    assert_eq!(read_metadata(&conn, "total_documents"), "3");
    assert_eq!(read_metadata(&conn, "indexing_complete"), "true");
    assert_eq!(read_metadata(&conn, "index_version"), "1");
}

#[test]
fn test_resume_after_new_pages() {
    let dir = TempDir::new().unwrap();
    let spider_db = dir.path().join("spider.db");
    let index_db = dir.path().join("index.db");

    let store = PageStore::open(&spider_db).unwrap();
    for i in 0..10 {
        save_page(
            &store,
            &format!("first/{}", i),
            "shared title",
            &format!("shared corpus text with unique token alpha{}", i),
        );
    }

    let first = build(&spider_db, &index_db, 4);
    assert_eq!(first.documents_indexed, 10);

    // More pages arrive after the first build
    for i in 0..5 {
        save_page(
            &store,
            &format!("second/{}", i),
            "shared title",
            &format!("shared corpus text with unique token beta{}", i),
        );
    }
    drop(store);

    let second = build(&spider_db, &index_db, 4);
    assert_eq!(second.documents_indexed, 5, "only new pages are reprocessed");
    assert_eq!(second.total_documents, 15);

    let conn = Connection::open(&index_db).unwrap();

    // No (term, doc) pair is ever indexed twice
    let duplicate_postings: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM (
                 SELECT term_id, doc_id FROM postings
                 GROUP BY term_id, doc_id HAVING COUNT(*) > 1
             )",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(duplicate_postings, 0);

    // A term present in every document has df = 15
    let shared_df: i64 = conn
        .query_row(
            "SELECT document_frequency FROM terms WHERE term = 'share'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(shared_df, 15);

    assert_eq!(read_metadata(&conn, "total_documents"), "15");
}

#[test]
fn test_reindexing_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let spider_db = dir.path().join("spider.db");
    let index_db = dir.path().join("index.db");

    let store = PageStore::open(&spider_db).unwrap();
    save_page(&store, "a", "alpha", "the quick brown fox jumps over the lazy dog");
    save_page(&store, "b", "beta", "machine learning and deep learning are cool");
    drop(store);

    build(&spider_db, &index_db, 100);
    let first_dump = dump_index(&index_db);

    // A second run finds nothing new but reruns the recompute
    let rerun = build(&spider_db, &index_db, 100);
    assert_eq!(rerun.documents_indexed, 0);
    assert_eq!(dump_index(&index_db), first_dump);
}

#[test]
fn test_cancelled_run_commits_nothing_and_resumes() {
    let dir = TempDir::new().unwrap();
    let spider_db = dir.path().join("spider.db");
    let index_db = dir.path().join("index.db");

    let store = PageStore::open(&spider_db).unwrap();
    save_page(&store, "a", "alpha", "some indexable page content");
    drop(store);

    let mut builder = IndexBuilder::open(&spider_db, &index_db, 100).unwrap();
    let summary = builder.run(&AtomicBool::new(true)).unwrap();
    assert!(!summary.completed);
    assert_eq!(summary.documents_indexed, 0);
    drop(builder);

    {
        let conn = Connection::open(&index_db).unwrap();
        assert_eq!(read_metadata(&conn, "indexing_complete"), "false");
    }

    let resumed = build(&spider_db, &index_db, 100);
    assert!(resumed.completed);
    assert_eq!(resumed.documents_indexed, 1);
}

fn dump_index(index_db: &Path) -> Vec<(String, i64, f64, i64, i64, f64, f64)> {
    let conn = Connection::open(index_db).unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT t.term, t.document_frequency, t.idf,
                    p.doc_id, p.term_frequency, p.tf, p.tfidf
             FROM postings p JOIN terms t ON t.term_id = p.term_id
             ORDER BY t.term, p.doc_id",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get(0)?,
                r.get(1)?,
                r.get(2)?,
                r.get(3)?,
                r.get(4)?,
                r.get(5)?,
                r.get(6)?,
            ))
        })
        .unwrap();
    rows.collect::<Result<Vec<_>, _>>().unwrap()
}
