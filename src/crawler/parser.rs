//! HTML parsing: title, description, main content, and outbound links
//!
//! Content extraction is a cascade of strategies, stopping at the first
//! that yields at least 100 characters of trimmed text: semantic elements
//! (`<article>`, `<main>`), then common content-container selectors, then
//! aggregated paragraphs, then the whole `<body>`. Boilerplate elements
//! (scripts, navigation, chrome) are skipped during text collection rather
//! than mutated out of the DOM.

use ego_tree::NodeRef;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::urlnorm;

/// A page is worth keeping once description + content reach this length.
const MIN_CONTENT_LENGTH: usize = 100;

/// Paragraphs shorter than this are noise (button labels, bylines).
const MIN_PARAGRAPH_LENGTH: usize = 20;

/// Hard cap on stored content.
const MAX_CONTENT_CHARS: usize = 1_000_000;

/// Elements whose subtrees never contain indexable prose.
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "iframe", "noscript", "form", "button",
];

/// Content-container selectors commonly used by CMSes, tried after the
/// semantic elements.
const CONTENT_SELECTORS: &[&str] = &[
    "#content",
    ".content",
    "#main-content",
    ".main-content",
    "#article",
    ".article",
    "#post",
    ".post",
    ".entry-content",
    ".post-content",
    ".article-content",
    "[role='main']",
    ".page-content",
    "#page-content",
];

/// Meta description sources, in priority order; first non-empty wins.
const DESCRIPTION_SELECTORS: &[&str] = &[
    "meta[name='description']",
    "meta[property='og:description']",
    "meta[name='twitter:description']",
    "meta[property='description']",
];

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static HTML_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("html").expect("valid selector"));
static BODY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));
static ARTICLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article").expect("valid selector"));
static MAIN_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("main").expect("valid selector"));
static P_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid selector"));
static ANCHOR_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// A parsed page ready for persistence.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub url: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub status_code: u16,
}

impl ParsedPage {
    /// Whether the page carries enough text to be worth storing; pages
    /// below the threshold go through the browser fallback first.
    pub fn has_sufficient_content(&self) -> bool {
        let all_text = format!("{} {}", self.description, self.content);
        all_text.trim().len() >= MIN_CONTENT_LENGTH
    }
}

/// HTML parser with pre-compiled selectors, shared by all workers.
pub struct PageParser {
    content_selectors: Vec<Selector>,
    description_selectors: Vec<Selector>,
}

impl PageParser {
    pub fn new() -> Self {
        Self {
            content_selectors: CONTENT_SELECTORS
                .iter()
                .filter_map(|s| Selector::parse(s).ok())
                .collect(),
            description_selectors: DESCRIPTION_SELECTORS
                .iter()
                .filter_map(|s| Selector::parse(s).ok())
                .collect(),
        }
    }

    /// Parse a fetched document. Returns `None` for pages the language
    /// filter rejects; otherwise the parsed page plus its harvested
    /// outbound links (canonical, deduplicated, in document order).
    pub fn parse(
        &self,
        html: &str,
        base_url: &str,
        content_language: Option<&str>,
        status_code: u16,
    ) -> Option<(ParsedPage, Vec<String>)> {
        let document = Html::parse_document(html);

        if !is_english(&document, content_language) {
            return None;
        }

        let title = document
            .select(&TITLE_SEL)
            .next()
            .map(|el| collect_text(&el).trim().to_string())
            .unwrap_or_default();

        let description = self.extract_description(&document);
        let content = self.extract_content(&document);
        let links = extract_links(&document, base_url);

        let page = ParsedPage {
            url: base_url.to_string(),
            title,
            description,
            content,
            status_code,
        };
        Some((page, links))
    }

    fn extract_description(&self, document: &Html) -> String {
        for selector in &self.description_selectors {
            if let Some(content) = document
                .select(selector)
                .next()
                .and_then(|el| el.value().attr("content"))
            {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        String::new()
    }

    fn extract_content(&self, document: &Html) -> String {
        // Strategy 1: semantic HTML5 elements
        let mut content = document
            .select(&ARTICLE_SEL)
            .next()
            .map(|el| collect_text(&el))
            .unwrap_or_default();

        if content.trim().len() < MIN_CONTENT_LENGTH {
            if let Some(main) = document.select(&MAIN_SEL).next() {
                content = collect_text(&main);
            }
        }

        // Strategy 2: common content containers; largest text wins
        if content.trim().len() < MIN_CONTENT_LENGTH {
            for selector in &self.content_selectors {
                if let Some(el) = document.select(selector).next() {
                    let text = collect_text(&el);
                    if text.trim().len() > content.trim().len() {
                        content = text;
                    }
                }
            }
        }

        // Strategy 3: aggregate substantial paragraphs
        if content.trim().len() < MIN_CONTENT_LENGTH {
            let paragraphs: Vec<String> = document
                .select(&P_SEL)
                .map(|el| collect_text(&el).trim().to_string())
                .filter(|text| text.len() > MIN_PARAGRAPH_LENGTH)
                .collect();
            if !paragraphs.is_empty() {
                content = paragraphs.join(" ");
            }
        }

        // Strategy 4: the whole body
        if content.trim().len() < MIN_CONTENT_LENGTH {
            if let Some(body) = document.select(&BODY_SEL).next() {
                content = collect_text(&body);
            }
        }

        // Collapse whitespace and cap the size
        let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
        truncate_chars(collapsed, MAX_CONTENT_CHARS)
    }
}

impl Default for PageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Text of an element's subtree, skipping boilerplate subtrees entirely.
fn collect_text(element: &ElementRef) -> String {
    let mut out = String::new();
    walk_text(element, &mut out);
    out
}

fn walk_text(node: &NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if !EXCLUDED_TAGS.contains(&el.name()) => {
                walk_text(&child, out);
            }
            _ => {}
        }
    }
}

/// Resolve and normalize every `<a href>`; rejects fall out, duplicates are
/// collapsed, document order is kept.
fn extract_links(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&ANCHOR_SEL) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if let Some(normalized) = urlnorm::normalize_with_base(href, &base) {
            if seen.insert(normalized.clone()) {
                links.push(normalized);
            }
        }
    }
    links
}

/// English or unknown passes; an explicit non-English primary subtag in
/// either the `Content-Language` header or `<html lang>` rejects.
fn is_english(document: &Html, content_language: Option<&str>) -> bool {
    if let Some(header) = content_language {
        let primary = header
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .split('-')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if !primary.is_empty() && primary != "en" {
            return false;
        }
    }

    if let Some(lang) = document
        .select(&HTML_SEL)
        .next()
        .and_then(|el| el.value().attr("lang"))
    {
        let primary = lang.split('-').next().unwrap_or_default().to_lowercase();
        if !primary.is_empty() && primary != "en" {
            return false;
        }
    }

    true
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILLER: &str = "This sentence pads the article body far enough past the minimum \
                          content threshold that extraction settles on the first strategy.";

    fn parse(html: &str) -> (ParsedPage, Vec<String>) {
        PageParser::new()
            .parse(html, "https://example.com/page", None, 200)
            .expect("page should pass the language filter")
    }

    #[test]
    fn test_title_and_description() {
        let html = format!(
            r#"<html><head>
                <title> The Title </title>
                <meta name="description" content=" A description ">
                <meta property="og:description" content="OG description">
               </head><body><article>{}</article></body></html>"#,
            FILLER
        );
        let (page, _) = parse(&html);
        assert_eq!(page.title, "The Title");
        assert_eq!(page.description, "A description");
    }

    #[test]
    fn test_description_fallback_order() {
        let html = format!(
            r#"<html><head>
                <meta name="description" content="  ">
                <meta name="twitter:description" content="From twitter">
                <meta property="og:description" content="From og">
               </head><body><article>{}</article></body></html>"#,
            FILLER
        );
        let (page, _) = parse(&html);
        assert_eq!(page.description, "From og");
    }

    #[test]
    fn test_article_preferred_over_body() {
        let html = format!(
            r#"<html><body>
                <div>unrelated chrome text</div>
                <article>{}</article>
               </body></html>"#,
            FILLER
        );
        let (page, _) = parse(&html);
        assert!(page.content.contains("pads the article body"));
        assert!(!page.content.contains("unrelated chrome"));
    }

    #[test]
    fn test_content_selector_fallback() {
        let html = format!(
            r#"<html><body>
                <article>too short</article>
                <div class="entry-content">{}</div>
               </body></html>"#,
            FILLER
        );
        let (page, _) = parse(&html);
        assert!(page.content.contains("pads the article body"));
    }

    #[test]
    fn test_paragraph_aggregation() {
        let html = r#"<html><body>
            <p>short</p>
            <p>The first real paragraph of the page, long enough to count.</p>
            <p>The second real paragraph of the page, also long enough to count.</p>
           </body></html>"#;
        let (page, _) = parse(html);
        assert!(page.content.contains("first real paragraph"));
        assert!(page.content.contains("second real paragraph"));
        assert!(!page.content.contains("short"));
    }

    #[test]
    fn test_boilerplate_elements_skipped() {
        let html = format!(
            r#"<html><body>
                <nav>site navigation</nav>
                <article><script>var x = "scripted";</script>{}</article>
                <footer>footer text</footer>
               </body></html>"#,
            FILLER
        );
        let (page, _) = parse(&html);
        assert!(!page.content.contains("scripted"));
        assert!(!page.content.contains("site navigation"));
        assert!(!page.content.contains("footer text"));
    }

    #[test]
    fn test_whitespace_collapsed() {
        let html = format!(
            "<html><body><article>  spaced \n\n   out   {}</article></body></html>",
            FILLER
        );
        let (page, _) = parse(&html);
        assert!(page.content.starts_with("spaced out"));
    }

    #[test]
    fn test_language_filter() {
        let parser = PageParser::new();
        let french = "<html lang='fr'><body><p>Bonjour tout le monde encore une fois.</p></body></html>";
        assert!(parser.parse(french, "https://example.com", None, 200).is_none());

        let english = "<html lang='en-US'><body><p>Hello again.</p></body></html>";
        assert!(parser.parse(english, "https://example.com", None, 200).is_some());

        let no_lang = "<html><body><p>Hello.</p></body></html>";
        assert!(parser.parse(no_lang, "https://example.com", None, 200).is_some());

        // Header rejects even when markup is silent
        assert!(parser
            .parse(no_lang, "https://example.com", Some("de-DE, de;q=0.9"), 200)
            .is_none());
        assert!(parser
            .parse(no_lang, "https://example.com", Some("en-GB"), 200)
            .is_some());
    }

    #[test]
    fn test_link_harvest() {
        let html = r#"<html><body>
            <a href="/about">About</a>
            <a href="/about#team">Team anchor</a>
            <a href="https://other.com/page/">Other</a>
            <a href="/styles.css">Styles</a>
            <a href="mailto:hi@example.com">Mail</a>
           </body></html>"#;
        let (_, links) = parse(html);
        assert_eq!(
            links,
            vec![
                "https://example.com/about".to_string(),
                "https://other.com/page".to_string(),
            ]
        );
    }

    #[test]
    fn test_sufficient_content_threshold() {
        let mut page = ParsedPage {
            url: "https://example.com".to_string(),
            title: String::new(),
            description: String::new(),
            content: "x".repeat(99),
            status_code: 200,
        };
        assert!(!page.has_sufficient_content());
        page.content = "x".repeat(100);
        assert!(page.has_sufficient_content());
    }
}
