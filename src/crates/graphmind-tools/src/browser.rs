//! Headless text browser used by the search sub-agent.
//!
//! Keeps one page of state: current address, title, text content split
//! into viewport-sized pages, visit history and the current find
//! position. Search goes through the configured web-search API; archive
//! lookup goes through the Wayback availability endpoint.

use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::info;

use graphmind_core::epoch_seconds;

use crate::ToolError;

const SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";
const WAYBACK_ENDPOINT: &str = "https://archive.org/wayback/available";

/// Characters per viewport page.
const VIEWPORT_SIZE: usize = 5120;

/// Minimal text browser with viewport paging.
pub struct SimpleTextBrowser {
    client: reqwest::Client,
    search_api_key: Option<String>,
    pub address: String,
    pub page_title: Option<String>,
    page_content: String,
    viewport_pages: Vec<(usize, usize)>,
    viewport_current_page: usize,
    history: Vec<(String, f64)>,
    find_query: Option<Regex>,
    find_from: usize,
}

impl SimpleTextBrowser {
    pub fn new(search_api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(300))
                .user_agent("Mozilla/5.0 (compatible; graphmind-browser)")
                .build()
                .expect("HTTP client construction cannot fail with static options"),
            search_api_key,
            address: String::from("about:blank"),
            page_title: None,
            page_content: String::new(),
            viewport_pages: vec![(0, 0)],
            viewport_current_page: 0,
            history: Vec::new(),
            find_query: None,
            find_from: 0,
        }
    }

    /// Header + current viewport, the observation returned to the agent.
    pub fn state(&self) -> (String, String) {
        let mut header = format!("Address: {}\n", self.address);
        if let Some(title) = &self.page_title {
            header.push_str(&format!("Title: {title}\n"));
        }

        // Report a prior visit to this address, newest first.
        for (address, at) in self.history.iter().rev().skip(1) {
            if *address == self.address {
                header.push_str(&format!(
                    "You previously visited this page {} seconds ago.\n",
                    (epoch_seconds() - at).round()
                ));
                break;
            }
        }

        header.push_str(&format!(
            "Viewport position: Showing page {} of {}.\n",
            self.viewport_current_page + 1,
            self.viewport_pages.len()
        ));
        (header, self.viewport().to_string())
    }

    /// Current viewport slice of the page content.
    pub fn viewport(&self) -> &str {
        let (start, end) = self.viewport_pages[self.viewport_current_page];
        &self.page_content[start..end]
    }

    pub fn page_content(&self) -> &str {
        &self.page_content
    }

    pub fn page_up(&mut self) {
        self.viewport_current_page = self.viewport_current_page.saturating_sub(1);
    }

    pub fn page_down(&mut self) {
        if self.viewport_current_page + 1 < self.viewport_pages.len() {
            self.viewport_current_page += 1;
        }
    }

    fn set_content(&mut self, address: String, title: Option<String>, content: String) {
        self.address = address.clone();
        self.page_title = title;
        self.page_content = content;
        self.split_pages();
        self.viewport_current_page = 0;
        self.find_query = None;
        self.find_from = 0;
        self.history.push((address, epoch_seconds()));
    }

    fn split_pages(&mut self) {
        self.viewport_pages.clear();
        if self.page_content.is_empty() {
            self.viewport_pages.push((0, 0));
            return;
        }
        let mut start = 0;
        while start < self.page_content.len() {
            let mut end = (start + VIEWPORT_SIZE).min(self.page_content.len());
            while !self.page_content.is_char_boundary(end) {
                end += 1;
            }
            self.viewport_pages.push((start, end));
            start = end;
        }
    }

    /// Navigate to a URL, or run a search when the address is of the
    /// form `search: <query>`.
    pub async fn visit_page(&mut self, url: &str) -> Result<(), ToolError> {
        if let Some(query) = url.strip_prefix("search:") {
            return self.search(query.trim(), None).await;
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ToolError::Transient(format!(
                "page fetch returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        let (title, text) = if content_type.contains("text/html") {
            extract_html(&body)
        } else {
            (None, body)
        };

        info!(url, chars = text.len(), "Visited page");
        self.set_content(url.to_string(), title, text);
        Ok(())
    }

    /// Web search; results are rendered as a Markdown link list.
    pub async fn search(
        &mut self,
        query: &str,
        filter_year: Option<i32>,
    ) -> Result<(), ToolError> {
        let api_key = self.search_api_key.clone().ok_or_else(|| {
            ToolError::Failed("web search requires SEARCH_API_KEY to be configured".to_string())
        })?;

        let mut request = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", query), ("api_key", &api_key)]);
        if let Some(year) = filter_year {
            let range = format!("cdr:1,cd_min:01/01/{year},cd_max:12/31/{year}");
            request = request.query(&[("tbs", range.as_str())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ToolError::Transient(format!(
                "search returned {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;

        let mut content = format!("# Search results for: {query}\n\n");
        if let Some(results) = body["organic_results"].as_array() {
            for result in results {
                let title = result["title"].as_str().unwrap_or("(untitled)");
                let link = result["link"].as_str().unwrap_or_default();
                let snippet = result["snippet"].as_str().unwrap_or_default();
                content.push_str(&format!("[{title}]({link})\n{snippet}\n\n"));
            }
        }

        self.set_content(format!("search: {query}"), Some(format!("Search: {query}")), content);
        Ok(())
    }

    /// Wayback Machine lookup: navigate to the archived snapshot of
    /// `url` closest to `date` (`YYYYMMDD`).
    pub async fn find_archived_url(&mut self, url: &str, date: &str) -> Result<String, ToolError> {
        let response = self
            .client
            .get(WAYBACK_ENDPOINT)
            .query(&[("url", url), ("timestamp", date)])
            .send()
            .await?;
        let body: Value = response.json().await?;

        let closest = &body["archived_snapshots"]["closest"];
        let target = closest["url"].as_str().ok_or_else(|| {
            ToolError::Failed(
                "Your url was not archived on Wayback Machine, try a different url.".to_string(),
            )
        })?;
        let snapshot_date = closest["timestamp"]
            .as_str()
            .map(|t| t.chars().take(8).collect::<String>())
            .unwrap_or_default();

        let target = target.to_string();
        self.visit_page(&target).await?;
        Ok(snapshot_date)
    }

    /// Scroll the viewport to the first occurrence of `pattern`
    /// (supports `*` wildcards). Returns false when not found.
    pub fn find_on_page(&mut self, pattern: &str) -> bool {
        let escaped = regex::escape(pattern).replace(r"\*", ".*");
        let Ok(regex) = Regex::new(&format!("(?i){escaped}")) else {
            return false;
        };
        self.find_query = Some(regex);
        self.find_from = 0;
        self.find_next()
    }

    /// Scroll to the next match of the active find pattern.
    pub fn find_next(&mut self) -> bool {
        let Some(regex) = &self.find_query else {
            return false;
        };
        let Some(found) = regex.find_at(&self.page_content, self.find_from) else {
            return false;
        };

        self.find_from = found.end();
        let offset = found.start();
        if let Some(page) = self
            .viewport_pages
            .iter()
            .position(|&(start, end)| offset >= start && offset < end)
        {
            self.viewport_current_page = page;
        }
        true
    }
}

fn extract_html(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("static selector");
    let title = document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string());

    let body_selector = Selector::parse("body").expect("static selector");
    let text = match document.select(&body_selector).next() {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => html.to_string(),
    };
    let squeezed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (title, squeezed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn browser_with_content(content: &str) -> SimpleTextBrowser {
        let mut browser = SimpleTextBrowser::new(None);
        browser.set_content(
            "https://example.com".to_string(),
            Some("Example".to_string()),
            content.to_string(),
        );
        browser
    }

    #[test]
    fn long_content_splits_into_viewport_pages() {
        let browser = browser_with_content(&"x".repeat(VIEWPORT_SIZE * 2 + 10));
        assert_eq!(browser.viewport_pages.len(), 3);
        assert_eq!(browser.viewport().len(), VIEWPORT_SIZE);
    }

    #[test]
    fn paging_moves_within_bounds() {
        let mut browser = browser_with_content(&"x".repeat(VIEWPORT_SIZE + 1));
        assert_eq!(browser.viewport_current_page, 0);
        browser.page_up();
        assert_eq!(browser.viewport_current_page, 0);
        browser.page_down();
        assert_eq!(browser.viewport_current_page, 1);
        browser.page_down();
        assert_eq!(browser.viewport_current_page, 1);
    }

    #[test]
    fn find_supports_wildcards_and_next() {
        let content = format!(
            "{}needle one{}needle two",
            "a".repeat(VIEWPORT_SIZE),
            "b".repeat(VIEWPORT_SIZE)
        );
        let mut browser = browser_with_content(&content);

        assert!(browser.find_on_page("needle*one"));
        assert_eq!(browser.viewport_current_page, 1);

        assert!(browser.find_next());
        assert_eq!(browser.viewport_current_page, 2);

        assert!(!browser.find_next());
    }

    #[test]
    fn state_header_reports_viewport_position() {
        let browser = browser_with_content("short page");
        let (header, viewport) = browser.state();
        assert!(header.contains("Address: https://example.com"));
        assert!(header.contains("Title: Example"));
        assert!(header.contains("Showing page 1 of 1."));
        assert_eq!(viewport, "short page");
    }

    #[test]
    fn html_extraction_squeezes_whitespace() {
        let (title, text) =
            extract_html("<html><head><title>T</title></head><body><p>a\n\n  b</p></body></html>");
        assert_eq!(title.as_deref(), Some("T"));
        assert_eq!(text, "a b");
    }

    #[tokio::test]
    async fn search_without_key_is_refused() {
        let mut browser = SimpleTextBrowser::new(None);
        let result = browser.search("anything", None).await;
        assert!(matches!(result, Err(ToolError::Failed(_))));
    }
}
