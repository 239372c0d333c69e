//! Headless-browser fallback for JS-rendered pages
//!
//! A fresh browser instance per call: navigate, give scripts two seconds to
//! settle, dump the document HTML. Downloads, plugins, extensions, and
//! background networking are disabled; the sandbox and web security stay
//! enabled.

use anyhow::{anyhow, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

const OVERALL_TIMEOUT: Duration = Duration::from_secs(30);
const RENDER_SETTLE: Duration = Duration::from_secs(2);

/// Launches a short-lived headless browser per fetch.
pub struct BrowserFetcher {
    user_agent: String,
}

impl BrowserFetcher {
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
        }
    }

    /// Render `url` in a headless browser and return the document HTML.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        match tokio::time::timeout(OVERALL_TIMEOUT, self.render(url)).await {
            Ok(result) => result,
            // Dropping the render future tears the browser process down
            Err(_) => Err(anyhow!(
                "browser fetch of {} timed out after {:?}",
                url,
                OVERALL_TIMEOUT
            )),
        }
    }

    async fn render(&self, url: &str) -> Result<String> {
        let config = BrowserConfig::builder()
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-downloads")
            .arg("--disable-plugins")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {}", e))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch headless browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = async {
            let page = browser
                .new_page(url)
                .await
                .with_context(|| format!("failed to open {}", url))?;
            tokio::time::sleep(RENDER_SETTLE).await;
            page.content()
                .await
                .with_context(|| format!("failed to read rendered HTML for {}", url))
        }
        .await;

        if let Err(e) = browser.close().await {
            debug!("browser close failed: {}", e);
        }
        handler_task.abort();

        result
    }
}
