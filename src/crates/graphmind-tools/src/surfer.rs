//! Web-search sub-agent tool.
//!
//! A bounded ReAct loop over the headless text browser: each step the
//! oracle (bound to the browser's navigation primitives) picks one
//! action, the browser executes it, and the observation is appended to
//! the transcript. The loop ends when the agent calls `final_answer` or
//! the step budget runs out.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use graphmind_core::{ToolCall, ToolSpec};
use graphmind_prompts::PromptTemplate;
use llm::Oracle;

use crate::browser::SimpleTextBrowser;
use crate::{Tool, ToolError};

const DESCRIPTION: &str = "\
This will send a message to a team member that will browse the internet to answer your question. Ask \
him for all your web-search related questions, but he's unable to do problem-solving. Provide him as \
much context as possible, in particular if you need to search on a specific timeframe! And don't \
hesitate to provide them with a complex search task, like finding a difference between two webpages.";

/// Maximum agent actions per request.
const MAX_STEPS: u32 = 12;

/// Observations are clipped to keep the transcript bounded.
const MAX_OBSERVATION_CHARS: usize = 6000;

/// `ask_search_agent`.
pub struct SearchAgentTool {
    oracle: Arc<Oracle>,
    browser: Mutex<SimpleTextBrowser>,
}

impl SearchAgentTool {
    pub fn new(oracle: Arc<Oracle>, search_api_key: Option<String>) -> Self {
        Self {
            oracle,
            browser: Mutex::new(SimpleTextBrowser::new(search_api_key)),
        }
    }

    fn action_specs() -> Vec<ToolSpec> {
        let no_args = serde_json::json!({"type": "object", "properties": {}});
        vec![
            ToolSpec::new(
                "informational_web_search",
                "Perform an INFORMATIONAL web search query then return the search results.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "The informational web search query to perform."},
                        "filter_year": {"type": "integer", "description": "[Optional]: filter the search results to only include pages from a specific year."},
                    },
                    "required": ["query"],
                }),
            ),
            ToolSpec::new(
                "navigational_web_search",
                "Perform a NAVIGATIONAL web search query then immediately navigate to the top result.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "The navigational web search query to perform."},
                    },
                    "required": ["query"],
                }),
            ),
            ToolSpec::new(
                "visit_page",
                "Visit a webpage at a given URL and return its text.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "The relative or absolute url of the webpage to visit."},
                    },
                    "required": ["url"],
                }),
            ),
            ToolSpec::new(
                "page_up",
                "Scroll the viewport UP one page-length in the current webpage.",
                no_args.clone(),
            ),
            ToolSpec::new(
                "page_down",
                "Scroll the viewport DOWN one page-length in the current webpage.",
                no_args.clone(),
            ),
            ToolSpec::new(
                "find_on_page_ctrl_f",
                "Scroll the viewport to the first occurrence of the search string. This is equivalent to Ctrl+F. Supports '*' wildcards.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "search_string": {"type": "string", "description": "The string to search for on the page."},
                    },
                    "required": ["search_string"],
                }),
            ),
            ToolSpec::new(
                "find_next",
                "Scroll the viewport to the next occurrence of the search string.",
                no_args,
            ),
            ToolSpec::new(
                "find_archived_url",
                "Given a url, searches the Wayback Machine and returns the archived version of the url that's closest in time to the desired date.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "The url you need the archive for."},
                        "date": {"type": "string", "description": "The date in format 'YYYYMMDD'."},
                    },
                    "required": ["url", "date"],
                }),
            ),
            ToolSpec::new(
                "get_full_page_summary",
                "Returns a summary of the information from the full current webpage which pertains to the prompt.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "prompt": {"type": "string", "description": "A natural-language description of the information you would like to retrieve from the webpage."},
                    },
                    "required": ["prompt"],
                }),
            ),
            ToolSpec::new(
                "wikipedia_search",
                "Perform a WIKIPEDIA search query then return the extracted article information.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "article_name": {"type": "string", "description": "Keyword or title of the article you are looking for."},
                        "information_to_retrieve": {"type": "string", "description": "Detailed description of the information you are looking for in the articles."},
                        "date": {"type": "string", "description": "The date of the article to retrieve, MM-DD-YYYY, or 'cur' for current data."},
                        "initial_problem": {"type": "string", "description": "The initial problem to solve."},
                    },
                    "required": ["article_name", "information_to_retrieve", "date", "initial_problem"],
                }),
            ),
            ToolSpec::new(
                "final_answer",
                "Return the final answer to the request and stop browsing.",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "answer": {"type": "string", "description": "The complete final answer."},
                    },
                    "required": ["answer"],
                }),
            ),
        ]
    }

    fn task_prompt(query: &str) -> String {
        format!(
            "You've been submitted this request by your manager: '{query}'\n\n\
             You're helping your manager solve a wider task: so make sure to not provide a one-line \
             answer, but give as much information as possible so that they have a clear understanding \
             of the answer.\n\n\
             Browse the web one action at a time. After each of your actions you will see the \
             resulting browser state. When you know enough, call final_answer.\n\n\
             Your final_answer WILL HAVE to contain these parts:\n\
             ### 1. Search outcome (short version):\n\
             ### 2. Search outcome (extremely detailed version):\n\
             ### 3. Additional context:\n\n\
             Put all of these in your final_answer; everything that you do not pass as an argument to \
             final_answer will be lost. And even if your search is unsuccessful, please return as much \
             context as possible, so your manager can act upon this feedback."
        )
    }

    async fn execute_action(&self, call: &ToolCall) -> Result<String, ToolError> {
        let mut browser = self.browser.lock().await;
        let args = &call.args;
        let arg = |key: &str| args.get(key).and_then(Value::as_str).unwrap_or_default();

        match call.name.as_str() {
            "informational_web_search" => {
                let filter_year = args
                    .get("filter_year")
                    .and_then(Value::as_i64)
                    .map(|y| y as i32);
                browser.search(arg("query"), filter_year).await?;
            }
            "navigational_web_search" => {
                browser.search(arg("query"), None).await?;
                let link = Regex::new(r"\[.*?\]\((http.*?)\)")
                    .expect("static regex")
                    .captures(browser.page_content())
                    .map(|c| c[1].to_string());
                if let Some(link) = link {
                    browser.visit_page(&link).await?;
                }
            }
            "visit_page" => browser.visit_page(arg("url")).await?,
            "page_up" => browser.page_up(),
            "page_down" => browser.page_down(),
            "find_on_page_ctrl_f" => {
                if !browser.find_on_page(arg("search_string")) {
                    let (header, _) = browser.state();
                    return Ok(format!(
                        "{header}=======================\nThe search string '{}' was not found on this page.",
                        arg("search_string")
                    ));
                }
            }
            "find_next" => {
                if !browser.find_next() {
                    let (header, _) = browser.state();
                    return Ok(format!(
                        "{header}=======================\nThe search string was not found on this page."
                    ));
                }
            }
            "find_archived_url" => {
                let snapshot_date = browser.find_archived_url(arg("url"), arg("date")).await?;
                let (header, content) = browser.state();
                return Ok(format!(
                    "Web archive for url {}, snapshot taken at date {snapshot_date}:\n{header}=======================\n{content}",
                    arg("url")
                ));
            }
            "wikipedia_search" => {
                drop(browser);
                let wikipedia = crate::wikipedia::WikipediaTool::new(self.oracle.clone());
                let output = wikipedia.invoke(call.args.clone()).await?;
                return Ok(output.to_string());
            }
            "get_full_page_summary" => {
                let page_text = browser.page_content().to_string();
                drop(browser);
                let prompt = PromptTemplate::new(graphmind_prompts::tools::PAGE_SUMMARY)
                    .render(&[("prompt", arg("prompt")), ("page_text", &page_text)])
                    .map_err(|e| ToolError::Failed(e.to_string()))?;
                return self
                    .oracle
                    .invoke_prompt("SearchAgent.page_summary", &prompt)
                    .await
                    .map_err(ToolError::from);
            }
            other => {
                return Ok(format!("Unknown action '{other}'."));
            }
        }

        let (header, content) = browser.state();
        Ok(format!("{header}=======================\n{content}"))
    }
}

#[async_trait]
impl Tool for SearchAgentTool {
    fn name(&self) -> &str {
        "ask_search_agent"
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Your question, as a natural language sentence with a verb! You are talking to an human, so provide them with as much context as possible!",
                },
            },
            "required": ["query"],
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value, ToolError> {
        let query = match &args {
            Value::String(query) => query.clone(),
            _ => args
                .get("query")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArguments("expected a query".to_string()))?,
        };

        let specs = Self::action_specs();
        let mut transcript = Self::task_prompt(&query);
        let mut last_observation = String::new();

        for step in 0..MAX_STEPS {
            let calls = self
                .oracle
                .invoke_tool_calls("SearchAgent.step", &transcript, &specs)
                .await?;
            let call = &calls[0];
            info!(step, action = %call.name, "Search agent action");

            if call.name == "final_answer" {
                let answer = call
                    .args
                    .get("answer")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Ok(Value::String(answer));
            }

            let mut observation = match self.execute_action(call).await {
                Ok(observation) => observation,
                Err(e) => format!("Action failed: {e}"),
            };
            graphmind_core::truncate_utf8(&mut observation, MAX_OBSERVATION_CHARS);
            last_observation.clone_from(&observation);

            transcript.push_str(&format!("\n\nAction: {call}\nObservation:\n{observation}"));
        }

        warn!("Search agent exhausted its step budget");
        Ok(Value::String(format!(
            "The search agent reached its step limit without producing a final answer. \
             Last observation:\n{last_observation}"
        )))
    }
}
