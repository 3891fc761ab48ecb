//! Typed oracle decisions.
//!
//! Each controller decision is one structured oracle call: a prompt
//! rendered from the dialect-resolved library plus an output schema.
//! The statistics log records each call under its `Controller.*` name.

use serde::Deserialize;
use serde_json::Value;

use graphmind_core::{ToolCall, ToolSpec};
use graphmind_prompts::PromptLibrary;
use llm::{
    bool_field, object_schema, string_array_field, string_field, Oracle, StructuredOutput,
};

use crate::error::ControllerError;

/// Render a list of prior tool calls for prompt inclusion.
pub fn render_tool_calls(calls: &[ToolCall]) -> String {
    if calls.is_empty() {
        return String::new();
    }
    calls
        .iter()
        .map(|call| format!("<tool_call>\n{call}\n</tool_call>"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a raw payload for prompt inclusion.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
pub struct NextStep {
    pub query: String,
    pub query_type: String,
}

impl StructuredOutput for NextStep {
    const NAME: &'static str = "next_step";

    fn schema() -> Value {
        object_schema(&[
            (
                "query",
                string_field(
                    "The query to retrieve data (RETRIEVE) or the reason more data is needed (INSERT)",
                ),
            ),
            (
                "query_type",
                string_field("INSERT or RETRIEVE, depending on the given query"),
            ),
        ])
    }
}

#[derive(Debug, Deserialize)]
struct MergedReason {
    reason_to_insert: String,
}

impl StructuredOutput for MergedReason {
    const NAME: &'static str = "reason_to_insert";

    fn schema() -> Value {
        object_schema(&[(
            "reason_to_insert",
            string_field("The reason to insert more data"),
        )])
    }
}

#[derive(Debug, Deserialize)]
struct WriteQueries {
    queries: Vec<String>,
}

impl StructuredOutput for WriteQueries {
    const NAME: &'static str = "write_queries";

    fn schema() -> Value {
        object_schema(&[("queries", string_array_field("The list of write queries"))])
    }
}

#[derive(Debug, Deserialize)]
struct SingleQuery {
    query: String,
}

impl StructuredOutput for SingleQuery {
    const NAME: &'static str = "query";

    fn schema() -> Value {
        object_schema(&[("query", string_field("The query to execute"))])
    }
}

#[derive(Debug, Deserialize)]
struct NeedForMath {
    need_for_math: bool,
}

impl StructuredOutput for NeedForMath {
    const NAME: &'static str = "need_for_math";

    fn schema() -> Value {
        object_schema(&[(
            "need_for_math",
            bool_field("Boolean indicating whether we need further math or probability calculations"),
        )])
    }
}

#[derive(Debug, Deserialize)]
struct Solution {
    final_solution: String,
}

impl StructuredOutput for Solution {
    const NAME: &'static str = "solution";

    fn schema() -> Value {
        object_schema(&[(
            "final_solution",
            string_field("The correctly formatted final solution"),
        )])
    }
}

#[derive(Debug, Deserialize)]
struct ForcedSolution {
    solution: String,
}

impl StructuredOutput for ForcedSolution {
    const NAME: &'static str = "forced_solution";

    fn schema() -> Value {
        object_schema(&[("solution", string_field("The solution to the initial problem"))])
    }
}

/// Decide INSERT vs RETRIEVE; returns `(content, query_type)`.
pub async fn define_next_step(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    graph_view: &str,
    tool_calls_made: &[ToolCall],
) -> Result<(String, String), ControllerError> {
    let prompt = prompts.next_step().render(&[
        ("initial_query", problem),
        ("existing_entities_and_relationships", graph_view),
        ("tool_calls_made", &render_tool_calls(tool_calls_made)),
    ])?;

    let step: NextStep = oracle
        .invoke_structured_prompt("Controller.define_next_step", &prompt)
        .await?;
    Ok((step.query, step.query_type))
}

/// Fold multiple INSERT rationales into one paragraph.
pub async fn merge_reasons_to_insert(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    reasons: &[String],
) -> Result<String, ControllerError> {
    let listing = reasons
        .iter()
        .map(|reason| format!("<reason>\n{reason}\n</reason>"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = prompts
        .merge_reasons_to_insert()
        .render(&[("list_of_reasons", &listing)])?;

    let merged: MergedReason = oracle
        .invoke_structured_prompt("Controller.merge_reasons_to_insert", &prompt)
        .await?;
    Ok(merged.reason_to_insert)
}

/// Select the next tool calls (oracle bound to the tool set).
pub async fn define_tool_calls(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    graph_view: &str,
    missing_information: &str,
    tool_calls_made: &[ToolCall],
    tools: &[ToolSpec],
) -> Result<Vec<ToolCall>, ControllerError> {
    let prompt = prompts.tool_calls().render(&[
        ("initial_query", problem),
        ("existing_entities_and_relationships", graph_view),
        ("missing_information", missing_information),
        ("tool_calls_made", &render_tool_calls(tool_calls_made)),
    ])?;

    Ok(oracle
        .invoke_tool_calls("Controller.define_tool_calls", &prompt, tools)
        .await?)
}

/// Produce write queries integrating freshly gathered information.
pub async fn define_write_queries(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    graph_view: &str,
    new_information: &str,
    missing_information: &str,
) -> Result<Vec<String>, ControllerError> {
    let prompt = prompts.write_queries_from_new_info().render(&[
        ("initial_query", problem),
        ("existing_entities_and_relationships", graph_view),
        ("new_information", new_information),
        ("missing_information", missing_information),
    ])?;

    let queries: WriteQueries = oracle
        .invoke_structured_prompt("Controller.define_write_query_given_new_information", &prompt)
        .await?;
    Ok(queries.queries)
}

/// Produce a fresh read query after one came back empty.
pub async fn define_retrieve_query(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    graph_view: &str,
    wrong_query: &str,
) -> Result<String, ControllerError> {
    let prompt = prompts.retrieve_query().render(&[
        ("initial_query", problem),
        ("existing_entities_and_relationships", graph_view),
        ("wrong_query", wrong_query),
    ])?;

    let query: SingleQuery = oracle
        .invoke_structured_prompt("Controller.define_retrieve_query", &prompt)
        .await?;
    Ok(query.query)
}

/// Produce a read query once the iteration budget is exhausted.
pub async fn define_forced_retrieve_query(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    graph_view: &str,
) -> Result<String, ControllerError> {
    let prompt = prompts.forced_retrieve().render(&[
        ("initial_query", problem),
        ("existing_entities_and_relationships", graph_view),
    ])?;

    let query: SingleQuery = oracle
        .invoke_structured_prompt("Controller.define_forced_retrieve_queries", &prompt)
        .await?;
    Ok(query.query)
}

/// Repair a failed query given the backend error text. The graph view
/// is interpolated only by dialects whose template mentions it.
pub async fn fix_query(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    failed_query: &str,
    error_log: &str,
    graph_view: &str,
) -> Result<String, ControllerError> {
    let prompt = prompts.fix_query().render(&[
        ("query_to_fix", failed_query),
        ("error_log", error_log),
        ("existing_entities_and_relationships", graph_view),
    ])?;

    let fixed: SingleQuery = oracle
        .invoke_structured_prompt("Controller.fix_query", &prompt)
        .await?;
    Ok(fixed.query)
}

/// Does the partial solution still require computation?
pub async fn define_need_for_math(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    partial_solution: &str,
) -> Result<bool, ControllerError> {
    let prompt = prompts.need_for_math().render(&[
        ("initial_query", problem),
        ("partial_solution", partial_solution),
    ])?;

    let decision: NeedForMath = oracle
        .invoke_structured_prompt("Controller.define_need_for_math_before_parsing", &prompt)
        .await?;
    Ok(decision.need_for_math)
}

/// Bind the oracle to the code executor and get the computation call.
pub async fn define_math_tool_call(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    current_solution: &str,
    executor_spec: ToolSpec,
) -> Result<Vec<ToolCall>, ControllerError> {
    let prompt = prompts.math_tool_call().render(&[
        ("initial_query", problem),
        ("current_solution", current_solution),
    ])?;

    Ok(oracle
        .invoke_tool_calls("Controller.define_math_tool_call", &prompt, &[executor_spec])
        .await?)
}

/// Format a partial solution per the problem style.
pub async fn parse_solution(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    partial_solution: &str,
    strict: bool,
) -> Result<String, ControllerError> {
    let prompt = prompts.parse_solution(strict).render(&[
        ("initial_query", problem),
        ("partial_solution", partial_solution),
    ])?;

    let solution: Solution = oracle
        .invoke_structured_prompt("Controller.parse_solution_with_llm", &prompt)
        .await?;
    Ok(solution.final_solution)
}

/// Pick the best of several formatted candidates.
pub async fn define_final_solution(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    raw_material: &str,
    candidates: &[String],
) -> Result<String, ControllerError> {
    let listing = candidates
        .iter()
        .map(|candidate| format!("<solution>\n{candidate}\n</solution>"))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = prompts.final_solution_vote().render(&[
        ("initial_query", problem),
        ("partial_solution", raw_material),
        ("list_final_solutions", &listing),
    ])?;

    let solution: Solution = oracle
        .invoke_structured_prompt("Controller.define_final_solution", &prompt)
        .await?;
    Ok(solution.final_solution)
}

/// Produce a guess when retrieves are empty.
pub async fn generate_forced_solution(
    oracle: &Oracle,
    prompts: &PromptLibrary,
    problem: &str,
    graph_view: &str,
) -> Result<String, ControllerError> {
    let prompt = prompts.forced_solution().render(&[
        ("initial_query", problem),
        ("existing_entities_and_relationships", graph_view),
    ])?;

    let forced: ForcedSolution = oracle
        .invoke_structured_prompt("Controller.generate_forced_solution", &prompt)
        .await?;
    Ok(forced.solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_rendering_wraps_each_call() {
        let calls = vec![
            ToolCall::new("llm_query", json!({"query": "a"})),
            ToolCall::new("wikipedia_search", json!({"article_name": "b"})),
        ];
        let rendered = render_tool_calls(&calls);
        assert_eq!(rendered.matches("<tool_call>").count(), 2);
        assert!(rendered.contains("llm_query"));

        assert_eq!(render_tool_calls(&[]), "");
    }

    #[test]
    fn value_to_text_unquotes_strings() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn next_step_schema_has_both_fields() {
        let schema = NextStep::schema();
        assert_eq!(schema["required"], json!(["query", "query_type"]));
    }
}
