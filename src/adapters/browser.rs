//! HTTP page fetcher.
//!
//! Fetches a page with a plain GET and reduces it to a title, readable text
//! (via html2text) and the list of absolute links it contains.

use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::{Client, Url};
use tracing::{debug, info};

use super::{BackendError, Page, PageFetcher, PageLink};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const TEXT_WIDTH: usize = 120;

/// Browser backed by reqwest
pub struct HttpBrowser {
    client: Client,
    title_re: Regex,
    link_re: Regex,
    tag_re: Regex,
}

impl HttpBrowser {
    pub fn new(timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            title_re: Regex::new(r"(?is)<title[^>]*>(.*?)</title>")?,
            link_re: Regex::new(r#"(?is)<a\s[^>]*href=["']([^"'#]+)["'][^>]*>(.*?)</a>"#)?,
            tag_re: Regex::new(r"<[^>]+>")?,
        })
    }

    fn strip_tags(&self, html: &str) -> String {
        self.tag_re
            .replace_all(html, "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Reduce raw HTML to a page description
    pub fn parse_page(&self, base: &Url, status: u16, html: &str) -> Page {
        let title = self
            .title_re
            .captures(html)
            .map(|c| self.strip_tags(&c[1]))
            .unwrap_or_default();

        let links = self
            .link_re
            .captures_iter(html)
            .filter_map(|c| {
                let url = base.join(c[1].trim()).ok()?;
                if !matches!(url.scheme(), "http" | "https") {
                    return None;
                }
                Some(PageLink {
                    text: self.strip_tags(&c[2]),
                    url: url.to_string(),
                })
            })
            .collect();

        let content = match from_read(html.as_bytes(), TEXT_WIDTH) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => self.strip_tags(html),
        };

        Page {
            status,
            url: base.to_string(),
            title,
            content,
            links,
        }
    }
}

#[async_trait]
impl PageFetcher for HttpBrowser {
    fn name(&self) -> &str {
        "http"
    }

    async fn browse(&self, url: &str) -> Result<Page, BackendError> {
        let parsed = Url::parse(url).map_err(|e| BackendError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        info!(url = %parsed, "Fetching page");
        let resp = self.client.get(parsed).send().await?;
        let status = resp.status();
        let final_url = resp.url().clone();

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                url: final_url.to_string(),
            });
        }

        let body = resp.text().await?;
        let page = self.parse_page(&final_url, status.as_u16(), &body);
        debug!(url = %page.url, title = %page.title, links = page.links.len(), "Page fetched");
        Ok(page)
    }
}
