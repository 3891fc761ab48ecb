//! Wikipedia retrieval tool.
//!
//! Searches for candidate articles, asks the oracle which (up to three,
//! the top search hit always included) are worth reading, fetches each
//! article either at its current state or at the newest revision
//! strictly older than the requested date, parses the top-level tables
//! to Markdown, and returns an oracle-extracted relevant-information
//! string keyed by article title.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use graphmind_prompts::PromptTemplate;
use llm::{object_schema, string_array_field, string_field, Oracle, StructuredOutput};

use crate::{parse_args, Tool, ToolError};

const DESCRIPTION: &str = "\
The WikipediaTool interfaces with Wikipedia's extensive database, allowing users to retrieve detailed \
articles and summaries on a wide range of topics. This tool is useful for gathering information from \
one of the largest and most frequently updated encyclopedic sources available.

Features:
 - Access to millions of articles across diverse subjects.
 - Possibility to retrieve articles at a specific date.";

const API_BASE: &str = "https://en.wikipedia.org/w/api.php";
const PAGE_BASE: &str = "https://en.wikipedia.org/w/index.php";

/// Search hits considered per query.
const SEARCH_TOP_K: usize = 10;

/// Articles read in depth per call.
const MAX_ARTICLES: usize = 3;

/// Article text handed to the oracle is capped at this many characters.
const MAX_PAGE_CHARS: usize = 40_000;

#[derive(Debug, Deserialize)]
struct WikipediaArgs {
    article_name: String,
    information_to_retrieve: String,
    date: String,
    initial_problem: String,
}

#[derive(Debug, Deserialize)]
struct ChosenArticles {
    chosen_articles: Vec<String>,
}

impl StructuredOutput for ChosenArticles {
    const NAME: &'static str = "chosen_articles";

    fn schema() -> Value {
        object_schema(&[(
            "chosen_articles",
            string_array_field("List of chosen articles titles"),
        )])
    }
}

#[derive(Debug, Deserialize)]
struct RelevantInformation {
    relevant_information: String,
}

impl StructuredOutput for RelevantInformation {
    const NAME: &'static str = "relevant_information";

    fn schema() -> Value {
        object_schema(&[(
            "relevant_information",
            string_field(
                "The most relevant information inside the Wikipedia article relative to the query",
            ),
        )])
    }
}

/// `wikipedia_search`.
pub struct WikipediaTool {
    oracle: Arc<Oracle>,
    client: reqwest::Client,
}

impl WikipediaTool {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self {
            oracle,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent("graphmind/0.1 (knowledge-graph agent)")
                .build()
                .expect("HTTP client construction cannot fail with static options"),
        }
    }

    async fn api_get(&self, params: &[(&str, &str)]) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(API_BASE)
            .query(params)
            .query(&[("format", "json")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ToolError::Transient(format!(
                "wiki API returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Search for articles and collect a short summary per hit.
    async fn search(&self, query: &str) -> Result<Vec<(String, String)>, ToolError> {
        let limit = SEARCH_TOP_K.to_string();
        let search = self
            .api_get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
            ])
            .await?;

        let titles: Vec<String> = search["query"]["search"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| hit["title"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut summaries = Vec::new();
        for title in titles {
            match self.summary(&title).await {
                Ok(summary) => summaries.push((title, summary)),
                Err(e) => {
                    info!(%title, error = %e, "Skipping unsummarizable search hit");
                }
            }
        }
        Ok(summaries)
    }

    /// Intro extract of an article; disambiguation pages come back as
    /// an explicit disambiguation summary.
    async fn summary(&self, title: &str) -> Result<String, ToolError> {
        let body = self
            .api_get(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        let pages = body["query"]["pages"]
            .as_object()
            .ok_or_else(|| ToolError::Failed("malformed extract reply".to_string()))?;
        let extract = pages
            .values()
            .next()
            .and_then(|page| page["extract"].as_str())
            .unwrap_or_default()
            .to_string();

        if extract.contains("may refer to") {
            return Ok(format!(
                "This page is a disambiguation of the term {title}.\n{extract}"
            ));
        }
        Ok(extract)
    }

    async fn choose_articles(
        &self,
        search_results: &[(String, String)],
        query: &str,
    ) -> Result<Vec<String>, ToolError> {
        let listing = search_results
            .iter()
            .map(|(title, summary)| format!("{title}: {summary}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = PromptTemplate::new(graphmind_prompts::tools::CHOOSE_WIKIPEDIA_ARTICLES)
            .render(&[
                ("articles_and_summary", &listing),
                ("search_query", query),
            ])
            .map_err(|e| ToolError::Failed(e.to_string()))?;

        let chosen: ChosenArticles = self
            .oracle
            .invoke_structured_prompt("WikipediaTool.choose_articles", &prompt)
            .await?;
        Ok(chosen.chosen_articles)
    }

    /// Revision id of the newest revision strictly older than `date`
    /// (`mm-dd-yyyy`); `None` when no such revision exists.
    async fn revision_before(
        &self,
        title: &str,
        date: &str,
    ) -> Result<Option<u64>, ToolError> {
        let cutoff = NaiveDate::parse_from_str(date, "%m-%d-%Y")
            .map_err(|e| ToolError::Failed(format!("bad date '{date}': {e}")))?;
        // rvstart takes a timestamp; the API then lists revisions from
        // that point backwards (newest first).
        let start = format!("{}T00:00:00Z", cutoff.format("%Y-%m-%d"));

        let body = self
            .api_get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("titles", title),
                ("rvprop", "ids|timestamp"),
                ("rvlimit", "1"),
                ("rvstart", &start),
                ("rvdir", "older"),
                ("redirects", "1"),
            ])
            .await?;

        let pages = body["query"]["pages"]
            .as_object()
            .ok_or_else(|| ToolError::Failed("malformed revisions reply".to_string()))?;
        let revision = pages
            .values()
            .next()
            .and_then(|page| page["revisions"].as_array())
            .and_then(|revisions| revisions.first())
            .and_then(|revision| revision["revid"].as_u64());
        Ok(revision)
    }

    /// Full plain-text extract of the current article.
    async fn full_text(&self, title: &str) -> Result<String, ToolError> {
        let body = self
            .api_get(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;
        let pages = body["query"]["pages"]
            .as_object()
            .ok_or_else(|| ToolError::Failed("malformed extract reply".to_string()))?;
        Ok(pages
            .values()
            .next()
            .and_then(|page| page["extract"].as_str())
            .unwrap_or_default()
            .to_string())
    }

    /// Rendered article HTML, current or at a specific revision.
    async fn page_html(&self, title: &str, oldid: Option<u64>) -> Result<String, ToolError> {
        let mut request = self.client.get(PAGE_BASE).query(&[("title", title)]);
        if let Some(oldid) = oldid {
            request = request.query(&[("oldid", oldid.to_string())]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ToolError::Transient(format!(
                "page fetch returned {}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }

    async fn page_content(
        &self,
        title: &str,
        information_to_retrieve: &str,
        initial_problem: &str,
        date: &str,
    ) -> Result<String, ToolError> {
        let (mut text, html) = if date == "cur" {
            (self.full_text(title).await?, self.page_html(title, None).await?)
        } else {
            let oldid = self.revision_before(title, date).await?;
            if oldid.is_none() {
                info!(title, date, "No revision older than date; using current page");
            }
            let html = self.page_html(title, oldid).await?;
            (html_to_text(&html), html)
        };
        graphmind_core::truncate_utf8(&mut text, MAX_PAGE_CHARS);

        let tables = parse_tables(&html);

        let prompt = PromptTemplate::new(graphmind_prompts::tools::WIKIPEDIA_INFO_EXTRACTION)
            .render(&[
                ("full_page_text", &text),
                ("tables", &tables),
                ("query_specific", information_to_retrieve),
                ("query_general", initial_problem),
            ])
            .map_err(|e| ToolError::Failed(e.to_string()))?;

        let extracted: RelevantInformation = self
            .oracle
            .invoke_structured_prompt("WikipediaTool.page_content", &prompt)
            .await?;
        Ok(extracted.relevant_information)
    }
}

/// Visible text of an article body.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = Selector::parse("#mw-content-text p, #mw-content-text h2, #mw-content-text li")
        .expect("static selector");
    document
        .select(&selector)
        .map(|element| element.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Top-level tables of an article rendered as Markdown.
fn parse_tables(html: &str) -> String {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("#mw-content-text table").expect("static selector");
    let row_selector = Selector::parse("tr").expect("static selector");
    let cell_selector = Selector::parse("th, td").expect("static selector");

    let is_nested = |table: &ElementRef| {
        table
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| ancestor.value().name() == "table")
    };

    let mut output = String::new();
    for table in document.select(&table_selector) {
        if is_nested(&table) {
            continue;
        }
        output.push_str("<table>\n");
        for row in table.select(&row_selector) {
            let cells: Vec<String> = row
                .select(&cell_selector)
                .map(|cell| {
                    cell.text()
                        .collect::<String>()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            if !cells.is_empty() {
                output.push_str(&format!("| {} |\n", cells.join(" | ")));
            }
        }
        output.push_str("</table>\n\n");
    }
    output
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia_search"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "article_name": {
                    "type": "string",
                    "description": "Keyword or title of the article you are looking for. Article name + keywords work best.",
                },
                "information_to_retrieve": {
                    "type": "string",
                    "description": "Detailed description of the information you are looking for in the articles. Can be long.",
                },
                "date": {
                    "type": "string",
                    "description": "The date of the article to retrieve mm-dd-yyyy. If you want current data insert 'cur'. It is a mandatory field. It is more efficient than indicating date inside information_to_retrieve.",
                },
                "initial_problem": {
                    "type": "string",
                    "description": "The initial problem to solve. It is a mandatory field.",
                },
            },
            "required": ["article_name", "information_to_retrieve", "date", "initial_problem"],
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let args: WikipediaArgs = parse_args(&args)?;

        let search_results = self.search(&args.article_name).await?;
        if search_results.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        let first_title = search_results[0].0.clone();

        let mut chosen = self
            .choose_articles(&search_results, &args.information_to_retrieve)
            .await?;
        if !chosen.contains(&first_title) {
            chosen.insert(0, first_title);
        }
        chosen.truncate(MAX_ARTICLES);
        info!(?chosen, "Articles selected for deep read");

        let mut result = BTreeMap::new();
        for title in chosen {
            match self
                .page_content(
                    &title,
                    &args.information_to_retrieve,
                    &args.initial_problem,
                    &args.date,
                )
                .await
            {
                Ok(information) => {
                    result.insert(title, Value::String(information));
                }
                Err(e) => {
                    warn!(%title, error = %e, "Skipping unreadable article");
                }
            }
        }

        Ok(serde_json::to_value(result).expect("string map serializes"))
    }
}
