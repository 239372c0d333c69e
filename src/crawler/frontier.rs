//! Time-ordered URL frontier with per-host politeness
//!
//! Three structures cooperate behind one mutex: a min-heap of URLs keyed by
//! the instant they become fetchable, the global seen set, and a map from
//! host to the earliest instant that host may next be scheduled. Batch
//! insertion spreads same-host URLs `rate_limit` apart while leaving
//! different hosts free to be ready concurrently.
//!
//! The rate limit is a schedule guarantee, not a serve guarantee: no two
//! same-host URLs are ever scheduled closer than `rate_limit`, but worker
//! contention may delay actual fetches past their slot (never before it).

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::urlnorm;

#[derive(Debug)]
struct QueuedUrl {
    url: String,
    available_at: Instant,
}

// Reversed ordering turns std's max-heap into a min-heap on available_at.
// Ties break arbitrarily; strict FIFO within a timestamp is not required.
impl Ord for QueuedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        other.available_at.cmp(&self.available_at)
    }
}

impl PartialOrd for QueuedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.available_at == other.available_at
    }
}

impl Eq for QueuedUrl {}

/// Outcome of a dequeue attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// A URL whose scheduled slot has arrived.
    Ready(String),
    /// The earliest queued URL is not ready yet; back off this long. The
    /// URL is left in place so its slot is not consumed early.
    NotReady(Duration),
    /// The heap is empty.
    Empty,
}

struct Inner {
    queue: BinaryHeap<QueuedUrl>,
    seen: HashSet<String>,
    next_available: HashMap<String, Instant>,
}

/// Concurrent URL work queue shared by all crawl workers.
pub struct Frontier {
    inner: Mutex<Inner>,
    rate_limit: Duration,
}

impl Frontier {
    /// Create a frontier whose seen set is rehydrated from previously
    /// crawled URLs, so restarts never re-enqueue persisted pages.
    pub fn new(crawled_urls: &[String], rate_limit: Duration) -> Self {
        let seen = crawled_urls
            .iter()
            .map(|url| urlnorm::normalize(url).unwrap_or_else(|| url.clone()))
            .collect();

        Self {
            inner: Mutex::new(Inner {
                queue: BinaryHeap::new(),
                seen,
                next_available: HashMap::new(),
            }),
            rate_limit,
        }
    }

    /// Enqueue a seed URL, ready immediately. Politeness pacing does not
    /// apply to seed bootstrap. Unparseable or rejected URLs are dropped.
    pub fn add_url(&self, url: &str) {
        let Some(normalized) = urlnorm::normalize(url) else {
            return;
        };

        let mut inner = self.inner.lock();
        if !inner.seen.insert(normalized.clone()) {
            return;
        }
        inner.queue.push(QueuedUrl {
            url: normalized,
            available_at: Instant::now(),
        });
    }

    /// Enqueue a batch of harvested links (already canonical), spacing
    /// same-host URLs `rate_limit` apart starting from each host's next
    /// free slot.
    pub fn add_urls(&self, links: &[String]) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        for link in links {
            if !inner.seen.insert(link.clone()) {
                continue;
            }

            let host = urlnorm::host(link);
            let available_at = match inner.next_available.get(&host) {
                Some(&slot) if slot > now => slot,
                _ => now,
            };
            inner
                .next_available
                .insert(host, available_at + self.rate_limit);
            inner.queue.push(QueuedUrl {
                url: link.clone(),
                available_at,
            });
        }
    }

    /// Dequeue the earliest-scheduled URL if its slot has arrived. Because
    /// the heap is ordered by time, a not-ready minimum means nothing else
    /// is ready either; callers sleep the returned duration outside the
    /// lock.
    pub fn next(&self) -> Next {
        let mut inner = self.inner.lock();

        let Some(head) = inner.queue.peek() else {
            return Next::Empty;
        };

        let now = Instant::now();
        if head.available_at > now {
            return Next::NotReady(head.available_at - now);
        }

        let item = inner.queue.pop().expect("peeked item present");
        // Safety net for hosts with no future reservation; the batch
        // scheduler normally supersedes this.
        inner.next_available.insert(urlnorm::host(&item.url), now);
        Next::Ready(item.url)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn has_seen(&self, url: &str) -> bool {
        self.inner.lock().seen.contains(url)
    }
}
