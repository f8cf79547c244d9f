//! Web search backends.
//!
//! `DuckDuckGoSearch` scrapes the lite HTML endpoint (no API key) and
//! degrades to `SimulatedSearch` when the request fails or yields nothing.

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use tracing::{debug, warn};

use super::{BackendError, SearchBackend, SearchResult};

const DDG_LITE_URL: &str = "https://lite.duckduckgo.com/lite/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Placeholder results used when no real search is available
#[derive(Debug, Clone, Default)]
pub struct SimulatedSearch;

impl SimulatedSearch {
    /// At most three canned results for `query`
    pub fn results(query: &str, max_results: usize) -> Vec<SearchResult> {
        (1..=max_results.min(3))
            .map(|i| SearchResult {
                title: format!("Simulated result {} for '{}'", i, query),
                url: format!("https://example.com/simulated-result-{}", i),
                content: format!(
                    "This is a simulated search result for '{}'. No actual web search was performed because no search backend is available.",
                    query
                ),
            })
            .collect()
    }
}

#[async_trait]
impl SearchBackend for SimulatedSearch {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, BackendError> {
        Ok(Self::results(query, max_results))
    }
}

/// DuckDuckGo lite scraper
pub struct DuckDuckGoSearch {
    client: Client,
    link_re: Regex,
    snippet_re: Regex,
    tag_re: Regex,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self, BackendError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            link_re: Regex::new(
                r#"(?s)<a[^>]*href=["']([^"']+)["'][^>]*class=["']result-link["'][^>]*>(.*?)</a>"#,
            )?,
            snippet_re: Regex::new(r#"(?s)<td[^>]*class=["']result-snippet["'][^>]*>(.*?)</td>"#)?,
            tag_re: Regex::new(r"<[^>]+>")?,
        })
    }

    fn strip_tags(&self, html: &str) -> String {
        let text = self.tag_re.replace_all(html, "");
        html_decode(text.trim())
    }

    /// Extract results from a lite results page
    pub fn parse_results(&self, html: &str, max_results: usize) -> Vec<SearchResult> {
        let snippets: Vec<String> = self
            .snippet_re
            .captures_iter(html)
            .map(|c| self.strip_tags(&c[1]))
            .collect();

        self.link_re
            .captures_iter(html)
            .enumerate()
            .filter_map(|(i, c)| {
                let url = resolve_redirect(&html_decode(&c[1]));
                let title = self.strip_tags(&c[2]);
                if url.is_empty() || title.is_empty() {
                    return None;
                }
                Some(SearchResult {
                    title,
                    url,
                    content: snippets.get(i).cloned().unwrap_or_default(),
                })
            })
            .take(max_results)
            .collect()
    }

    async fn fetch(&self, query: &str) -> Result<String, BackendError> {
        let url = Url::parse_with_params(DDG_LITE_URL, &[("q", query)]).map_err(|e| {
            BackendError::InvalidUrl {
                url: DDG_LITE_URL.to_string(),
                message: e.to_string(),
            }
        })?;

        let resp = self.client.get(url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(BackendError::Status {
                status: resp.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, BackendError> {
        let html = match self.fetch(query).await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "DuckDuckGo search failed, using simulated results");
                return Ok(SimulatedSearch::results(query, max_results));
            }
        };

        let results = self.parse_results(&html, max_results);
        if results.is_empty() {
            warn!(query, "No results from DuckDuckGo, using simulated results");
            return Ok(SimulatedSearch::results(query, max_results));
        }

        debug!(query, count = results.len(), "DuckDuckGo search finished");
        Ok(results)
    }
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect links
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    if let Ok(parsed) = Url::parse(&absolute) {
        if parsed.path().starts_with("/l/") {
            if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
                return target.into_owned();
            }
        }
    }
    absolute
}

/// Decode common HTML entities
fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITE_PAGE: &str = r#"
<table>
  <tr><td>1.&nbsp;</td><td>
    <a rel="nofollow" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc" class='result-link'>Rust <b>Programming</b> Language</a>
  </td></tr>
  <tr><td></td><td class='result-snippet'>A language empowering <b>everyone</b>.</td></tr>
  <tr><td>2.&nbsp;</td><td>
    <a rel="nofollow" href="https://doc.rust-lang.org/book/" class='result-link'>The Book</a>
  </td></tr>
  <tr><td></td><td class='result-snippet'>Learn Rust.</td></tr>
</table>
"#;

    #[test]
    fn test_simulated_results_are_capped_at_three() {
        let results = SimulatedSearch::results("rust", 5);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Simulated result 1 for 'rust'");
        assert_eq!(results[2].url, "https://example.com/simulated-result-3");

        assert_eq!(SimulatedSearch::results("rust", 2).len(), 2);
    }

    #[test]
    fn test_parse_lite_results() {
        let search = DuckDuckGoSearch::new().unwrap();
        let results = search.parse_results(LITE_PAGE, 5);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].content, "A language empowering everyone.");
        assert_eq!(results[1].url, "https://doc.rust-lang.org/book/");

        assert_eq!(search.parse_results(LITE_PAGE, 1).len(), 1);
    }

    #[test]
    fn test_resolve_redirect_passthrough() {
        assert_eq!(resolve_redirect("https://example.com/a"), "https://example.com/a");
    }
}
