//! Canonical URL normalization
//!
//! Every producer of URLs (seed loading, link harvesting, frontier
//! rehydration) funnels through [`normalize`], so a page is identified by
//! exactly one string everywhere: in the frontier's seen set, in the page
//! store, and in the link graph. Normalization is idempotent:
//! `normalize(normalize(x)) == normalize(x)`.

use url::Url;

/// Query parameters that identify campaigns/sessions rather than content.
/// Stripping them prevents the same page from being crawled once per ad
/// campaign.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "source",
    "ref",
    "ssrc",
];

/// File extensions that never yield indexable HTML.
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".css", ".js", ".zip", ".tar", ".gz",
    ".exe", ".dmg", ".iso", ".mp4", ".avi", ".mov", ".mp3", ".wav",
];

/// Normalize an absolute URL string. Returns `None` if the URL is rejected
/// (unparseable, non-http(s), or a skipped file extension).
pub fn normalize(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    canonicalize(url)
}

/// Resolve `href` against `base`, then normalize. Used for link harvesting
/// where hrefs may be relative.
pub fn normalize_with_base(href: &str, base: &Url) -> Option<String> {
    let url = base.join(href).ok()?;
    canonicalize(url)
}

/// The host component (with port, if any) of a canonical URL string.
/// Returns an empty string for unparseable input; per-host scheduling then
/// lumps such URLs into one bucket instead of panicking.
pub fn host(url: &str) -> String {
    match Url::parse(url) {
        Ok(u) => {
            let host = u.host_str().unwrap_or_default();
            match u.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            }
        }
        Err(_) => String::new(),
    }
}

fn canonicalize(url: Url) -> Option<String> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    // The url crate already lowercases scheme and host and drops default
    // ports during parsing; fragments are simply never emitted below.
    let host = url.host_str()?;

    let mut path = url.path().to_string();
    if path == "/" {
        path.clear();
    } else if path.ends_with('/') {
        path.truncate(path.len() - 1);
    }

    let lower_path = path.to_lowercase();
    if SKIP_EXTENSIONS.iter().any(|ext| lower_path.ends_with(ext)) {
        return None;
    }

    let query = url.query().map(strip_tracking_params).unwrap_or_default();

    let mut out = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(&path);
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }
    Some(out)
}

/// Drop tracking parameters, preserving the order of the rest.
fn strip_tracking_params(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default().to_lowercase();
            !TRACKING_PARAMS.contains(&key.as_str())
        })
        .collect::<Vec<_>>()
        .join("&")
}
