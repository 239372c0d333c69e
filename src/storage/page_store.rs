//! Crawled-page store: page content and the outbound link graph
//!
//! Keyed by canonical URL. A page row is created on first successful crawl
//! and overwritten on recrawl; rows are never deleted, so the
//! auto-increment id is a stable document identity for the indexer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = r#"
-- Pages: crawled content (the URL column doubles as the global seen marker)
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT UNIQUE NOT NULL,
    title TEXT,
    description TEXT,
    content TEXT,
    status_code INTEGER,
    crawled_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);

-- Links: directed edge table (from_url -> to_url), kept for offline use
CREATE TABLE IF NOT EXISTS links (
    from_url TEXT,
    to_url TEXT,
    PRIMARY KEY (from_url, to_url)
);
"#;

/// A crawl result ready for persistence.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub status_code: u16,
    pub crawled_at: DateTime<Utc>,
}

/// A persisted page as read back by the indexer, carrying its row id.
#[derive(Debug, Clone)]
pub struct StoredPage {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub status_code: u16,
}

/// SQLite-backed page store. Writes from concurrent crawl workers are
/// serialized behind an internal mutex.
pub struct PageStore {
    conn: Mutex<Connection>,
}

impl PageStore {
    /// Open (or create) the store and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("failed to open page store at {:?}", path.as_ref()))?;
        apply_pragmas(&conn)?;
        conn.execute_batch(SCHEMA)
            .context("failed to apply page store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Upsert keyed on URL: a recrawl refreshes every content column.
    pub fn save_page(&self, page: &Page) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO pages (url, title, description, content, status_code, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(url) DO UPDATE SET
                     title = excluded.title,
                     description = excluded.description,
                     content = excluded.content,
                     status_code = excluded.status_code,
                     crawled_at = excluded.crawled_at",
                params![
                    page.url,
                    page.title,
                    page.description,
                    page.content,
                    page.status_code,
                    page.crawled_at,
                ],
            )
            .with_context(|| format!("failed to save page {}", page.url))?;
        Ok(())
    }

    pub fn get_page(&self, url: &str) -> Result<Option<StoredPage>> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, url, title, description, content, status_code
                 FROM pages WHERE url = ?1",
                params![url],
                row_to_page,
            )
            .optional()
            .with_context(|| format!("failed to read page {}", url))
    }

    /// Every URL ever persisted; used to rehydrate the frontier's seen set.
    pub fn load_all_crawled_urls(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT url FROM pages")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    /// Persist the outbound edges of one page in a single transaction.
    /// Duplicate edges are ignored, so re-saving after a recrawl is
    /// harmless.
    pub fn save_links(&self, from_url: &str, to_urls: &[String]) -> Result<()> {
        if to_urls.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("INSERT OR IGNORE INTO links (from_url, to_url) VALUES (?1, ?2)")?;
            for to_url in to_urls {
                stmt.execute(params![from_url, to_url])?;
            }
        }
        tx.commit()
            .with_context(|| format!("failed to save links from {}", from_url))
    }

    pub fn page_count(&self) -> Result<i64> {
        self.conn
            .lock()
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))
            .context("failed to count pages")
    }

    /// Pages with `id > after_id` in id order, at most `limit` rows. This is
    /// the indexer's resume scan.
    pub fn pages_after(&self, after_id: i64, limit: usize) -> Result<Vec<StoredPage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, url, title, description, content, status_code
             FROM pages WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let pages = stmt
            .query_map(params![after_id, limit as i64], row_to_page)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pages)
    }
}

fn row_to_page(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredPage> {
    Ok(StoredPage {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        content: row.get(4)?,
        status_code: row.get::<_, i64>(5)? as u16,
    })
}

pub(crate) fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("failed to enable WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", 10_000)?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "mmap_size", 30_000_000)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_page(url: &str, title: &str) -> Page {
        Page {
            url: url.to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            content: "content".to_string(),
            status_code: 200,
            crawled_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_get_page() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::open(dir.path().join("spider.db")).unwrap();

        store
            .save_page(&test_page("https://example.com/a", "A"))
            .unwrap();

        let page = store.get_page("https://example.com/a").unwrap().unwrap();
        assert_eq!(page.title, "A");
        assert_eq!(page.status_code, 200);
        assert!(page.id > 0);

        assert!(store.get_page("https://example.com/missing").unwrap().is_none());
    }

    #[test]
    fn test_recrawl_overwrites_but_keeps_id() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::open(dir.path().join("spider.db")).unwrap();

        store
            .save_page(&test_page("https://example.com/a", "old"))
            .unwrap();
        let first = store.get_page("https://example.com/a").unwrap().unwrap();

        store
            .save_page(&test_page("https://example.com/a", "new"))
            .unwrap();
        let second = store.get_page("https://example.com/a").unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.title, "new");
        assert_eq!(store.page_count().unwrap(), 1);
    }

    #[test]
    fn test_save_links_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::open(dir.path().join("spider.db")).unwrap();

        let targets = vec![
            "https://example.com/b".to_string(),
            "https://example.com/c".to_string(),
        ];
        store.save_links("https://example.com/a", &targets).unwrap();
        store.save_links("https://example.com/a", &targets).unwrap();

        let conn = store.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_pages_after_scans_in_id_order() {
        let dir = TempDir::new().unwrap();
        let store = PageStore::open(dir.path().join("spider.db")).unwrap();

        for i in 1..=5 {
            store
                .save_page(&test_page(&format!("https://example.com/{}", i), "t"))
                .unwrap();
        }

        let batch = store.pages_after(2, 2).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, 3);
        assert_eq!(batch[1].id, 4);

        let urls = store.load_all_crawled_urls().unwrap();
        assert_eq!(urls.len(), 5);
    }
}
