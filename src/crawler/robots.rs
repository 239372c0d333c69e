//! robots.txt rules and the process-lifetime robots cache
//!
//! One cache entry per `scheme://host/robots.txt`. A failed or non-200
//! fetch caches `None`, which is treated as allow-all; entries are never
//! invalidated during a run. Reads vastly outnumber writes, so the cache
//! sits behind a read-write lock.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Allow/disallow rules for one user-agent group.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    disallow_patterns: Vec<String>,
    allow_patterns: Vec<String>,
}

impl RobotsRules {
    /// Parse robots.txt content, selecting the group for `user_agent`.
    /// A group naming the agent specifically overrides wildcard rules.
    pub fn parse(content: &str, user_agent: &str) -> Self {
        let mut disallow = Vec::new();
        let mut allow = Vec::new();

        let ua_lower = user_agent.to_lowercase();
        let mut current_group_applies = false;
        let mut found_specific_group = false;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    let agent = value.to_lowercase();
                    if agent == "*" {
                        current_group_applies = !found_specific_group;
                    } else if ua_lower.contains(&agent) || agent.contains(&ua_lower) {
                        current_group_applies = true;
                        found_specific_group = true;
                        // Specific group supersedes wildcard rules
                        disallow.clear();
                        allow.clear();
                    } else {
                        current_group_applies = false;
                    }
                }
                "disallow" if current_group_applies && !value.is_empty() => {
                    disallow.push(value.to_string());
                }
                "allow" if current_group_applies && !value.is_empty() => {
                    allow.push(value.to_string());
                }
                _ => {}
            }
        }

        Self {
            disallow_patterns: disallow,
            allow_patterns: allow,
        }
    }

    /// Standard longest-match-wins semantics; on an exact tie, allow wins.
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest_allow = self
            .allow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        let longest_disallow = self
            .disallow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        longest_allow >= longest_disallow
    }

    /// Prefix matching with `*` wildcards and the `$` end anchor.
    fn path_matches(path: &str, pattern: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }

        let (pattern, must_match_end) = match pattern.strip_suffix('$') {
            Some(stripped) => (stripped, true),
            None => (pattern, false),
        };

        if pattern.contains('*') {
            let mut pos = 0;
            for (i, part) in pattern.split('*').enumerate() {
                if part.is_empty() {
                    continue;
                }
                match path[pos..].find(part) {
                    Some(found) => {
                        if i == 0 && found != 0 {
                            return false;
                        }
                        pos += found + part.len();
                    }
                    None => return false,
                }
            }
            return !must_match_end || pos == path.len();
        }

        if must_match_end {
            return path == pattern;
        }

        path.starts_with(pattern)
    }
}

/// Process-lifetime robots.txt cache shared by all crawl workers.
pub struct RobotsCache {
    cache: RwLock<HashMap<String, Option<RobotsRules>>>,
    client: reqwest::Client,
    user_agent: String,
}

impl RobotsCache {
    pub fn new(client: reqwest::Client, user_agent: String) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            client,
            user_agent,
        }
    }

    /// Whether `url` may be fetched under the cached (or freshly fetched)
    /// rules for its host. Unknown hosts trigger a robots.txt fetch; any
    /// failure caches as allow-all.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), authority);

        if let Some(entry) = self.cache.read().get(&robots_url) {
            return match entry {
                Some(rules) => rules.is_allowed(url.path()),
                None => true,
            };
        }

        let rules = self.fetch_rules(&robots_url).await;
        let allowed = match &rules {
            Some(rules) => rules.is_allowed(url.path()),
            None => true,
        };
        self.cache.write().insert(robots_url, rules);
        allowed
    }

    async fn fetch_rules(&self, robots_url: &str) -> Option<RobotsRules> {
        let response = self
            .client
            .get(robots_url)
            .header("User-Agent", &self.user_agent)
            .timeout(ROBOTS_FETCH_TIMEOUT)
            .send()
            .await
            .ok()?;

        if response.status().as_u16() != 200 {
            debug!("robots.txt at {} returned {}", robots_url, response.status());
            return None;
        }

        let body = response.text().await.ok()?;
        Some(RobotsRules::parse(&body, &self.user_agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_group_overrides_wildcard() {
        let content = r#"
User-agent: *
Disallow: /private/
Allow: /private/public/

User-agent: DeiSearchBot
Disallow: /admin/
"#;

        let rules = RobotsRules::parse(content, "DeiSearchBot/1.0");

        assert!(rules.is_allowed("/public/page.html"));
        assert!(!rules.is_allowed("/admin/settings"));
        // The specific group carries no /private/ rule
        assert!(rules.is_allowed("/private/test"));
    }

    #[test]
    fn test_wildcard_and_anchor_patterns() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /*.cgi$
Allow: /private/readme.txt
"#;

        let rules = RobotsRules::parse(content, "TestBot");

        assert!(rules.is_allowed("/public/page.html"));
        assert!(!rules.is_allowed("/private/secret"));
        assert!(rules.is_allowed("/private/readme.txt"));
        assert!(!rules.is_allowed("/scripts/run.cgi"));
        assert!(rules.is_allowed("/scripts/run.cgi?q=1"));
    }

    #[test]
    fn test_path_matching() {
        assert!(RobotsRules::path_matches("/admin/test", "/admin/"));
        assert!(!RobotsRules::path_matches("/public/test", "/admin/"));
        assert!(RobotsRules::path_matches("/images/cat.jpg", "/images/*.jpg"));
        assert!(RobotsRules::path_matches("/page.html", "/page.html$"));
        assert!(!RobotsRules::path_matches("/page.html?query", "/page.html$"));
    }

    #[test]
    fn test_empty_rules_allow_everything() {
        let rules = RobotsRules::default();
        assert!(rules.is_allowed("/anything"));
        assert!(rules.is_allowed("/"));
    }
}
