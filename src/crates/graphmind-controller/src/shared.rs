//! Machinery shared by the controller variants: run setup, the
//! next-step vote, the insert branch and finalization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use graphmind_core::{all_solutions_empty, Problem, ToolCall};
use graphmind_prompts::PromptLibrary;
use graphmind_store::GraphStore;
use graphmind_tools::ToolManager;
use llm::Oracle;

use crate::config::ControllerConfig;
use crate::decisions::{self, value_to_text};
use crate::error::ControllerError;

/// Everything both controller variants share.
pub(crate) struct ControllerCore {
    pub store: Box<dyn GraphStore>,
    pub planning: Arc<Oracle>,
    pub execution: Arc<Oracle>,
    pub tools: ToolManager,
    pub prompts: PromptLibrary,
    pub config: ControllerConfig,
}

/// Tally of the next-step vote.
#[derive(Debug, Default)]
pub(crate) struct VoteTally {
    pub insert: u32,
    pub retrieve: u32,
    pub insert_content: Vec<String>,
    pub retrieve_content: Vec<String>,
}

impl VoteTally {
    /// Strict majority for RETRIEVE; ties fall through to INSERT,
    /// keeping the bias toward enriching the graph.
    pub fn takes_retrieve_branch(&self) -> bool {
        self.retrieve > self.insert
    }
}

impl ControllerCore {
    pub fn new(
        store: Box<dyn GraphStore>,
        planning: Arc<Oracle>,
        execution: Arc<Oracle>,
        tools: ToolManager,
        config: ControllerConfig,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let prompts = PromptLibrary::new(store.dialect());
        Ok(Self {
            store,
            planning,
            execution,
            tools,
            prompts,
            config,
        })
    }

    /// Clear the graph and rotate snapshots into a timestamped subdir;
    /// returns the problem text as rendered for the oracle.
    pub async fn begin_run(
        &mut self,
        problem: &Problem,
        run_index: usize,
        snapshot_subdir: &Path,
    ) -> Result<String, ControllerError> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let parent: PathBuf = snapshot_subdir.join(timestamp);
        self.store.init(run_index, &parent).await?;

        let problem_text = problem.prompt_text();
        info!(problem = %problem_text, "Starting controller run");
        Ok(problem_text)
    }

    /// Run the next-step vote `num_next_steps_decision` times.
    ///
    /// Unknown query types are logged and excluded from the tally.
    pub async fn collect_votes(
        &self,
        problem: &str,
        graph_view: &str,
        tool_calls_made: &[ToolCall],
    ) -> Result<VoteTally, ControllerError> {
        let mut tally = VoteTally::default();

        for vote in 0..self.config.num_next_steps_decision {
            let (content, query_type) = decisions::define_next_step(
                &self.planning,
                &self.prompts,
                problem,
                graph_view,
                tool_calls_made,
            )
            .await?;
            info!(vote, %query_type, "Next-step vote");

            match query_type.trim().to_uppercase().as_str() {
                "INSERT" => {
                    tally.insert += 1;
                    tally.insert_content.push(content);
                }
                "RETRIEVE" => {
                    tally.retrieve += 1;
                    tally.retrieve_content.push(content);
                }
                other => {
                    warn!(query_type = other, vote, "Unknown query type for next step");
                }
            }
        }

        Ok(tally)
    }

    /// One forced retrieve query per vote slot, generated once the
    /// iteration budget is exhausted without a solution.
    pub async fn forced_retrieve_queries(
        &self,
        problem: &str,
        graph_view: &str,
    ) -> Result<Vec<String>, ControllerError> {
        let mut queries = Vec::new();
        for _ in 0..self.config.num_next_steps_decision {
            queries.push(
                decisions::define_forced_retrieve_query(
                    &self.planning,
                    &self.prompts,
                    problem,
                    graph_view,
                )
                .await?,
            );
        }
        Ok(queries)
    }

    /// Collapse the INSERT rationales of one vote round.
    pub async fn reason_to_insert(&self, tally: &VoteTally) -> Result<String, ControllerError> {
        match tally.insert_content.len() {
            0 => Ok(String::new()),
            1 => Ok(tally.insert_content[0].clone()),
            _ => {
                decisions::merge_reasons_to_insert(
                    &self.planning,
                    &self.prompts,
                    &tally.insert_content,
                )
                .await
            }
        }
    }

    /// The insert branch: pick tools, invoke them (cache-aware), turn
    /// each output into write queries, execute with bounded repair, and
    /// re-render the graph view once per tool-output batch.
    pub async fn insert_branch(
        &mut self,
        problem: &str,
        reason_to_insert: &str,
        tool_calls_made: &mut Vec<ToolCall>,
        mut graph_view: String,
    ) -> Result<String, ControllerError> {
        let tool_calls = decisions::define_tool_calls(
            &self.execution,
            &self.prompts,
            problem,
            &graph_view,
            reason_to_insert,
            tool_calls_made,
            &self.tools.specs(),
        )
        .await?;
        info!(count = tool_calls.len(), "Tool calls selected");

        let outputs = self.tools.invoke_all(&tool_calls).await;
        tool_calls_made.extend(tool_calls.iter().cloned());

        for (call, output) in tool_calls.iter().zip(outputs) {
            // A missing tool produces no output; the corresponding
            // write-query step is skipped.
            let Some(output) = output else {
                continue;
            };

            let new_information =
                format!("function '{call}' returned: '{}'", value_to_text(&output));

            let queries = decisions::define_write_queries(
                &self.planning,
                &self.prompts,
                problem,
                &graph_view,
                &new_information,
                reason_to_insert,
            )
            .await?;

            for mut query in queries {
                let mut outcome = self.store.write(&query).await?;
                info!(success = outcome.success, "Write query executed");

                let mut retry = 0;
                while !outcome.success && retry < self.config.max_query_fixing_retry {
                    retry += 1;
                    let error_log = outcome.error.clone().unwrap_or_default();
                    warn!(
                        retry,
                        max = self.config.max_query_fixing_retry,
                        error = %error_log,
                        "Write query failed, attempting repair"
                    );

                    query = decisions::fix_query(
                        &self.planning,
                        &self.prompts,
                        &query,
                        &error_log,
                        &graph_view,
                    )
                    .await?;
                    outcome = self.store.write(&query).await?;
                    info!(success = outcome.success, "Write query result after fixing");
                }
            }

            graph_view = self.store.render().await?;
        }

        Ok(graph_view)
    }

    /// Post-process a partial solution through the code executor when
    /// computation is still needed.
    pub async fn math_response(
        &self,
        problem: &str,
        solution: String,
    ) -> Result<String, ControllerError> {
        let Some(executor) = self.tools.get("run_python_code") else {
            return Ok(solution);
        };

        let calls = decisions::define_math_tool_call(
            &self.execution,
            &self.prompts,
            problem,
            &solution,
            executor.spec(),
        )
        .await?;

        let outputs = self.tools.invoke_all(&calls).await;
        let Some(Some(math_output)) = outputs.into_iter().next() else {
            return Ok(solution);
        };
        info!("Computed follow-up math for partial solution");

        Ok(format!(
            "{solution}\n In addition, this is the response given by the code executor after \
             calculations. Use the numbers and the logic as you see fit. \
             <math_solution>{}</math_solution>.",
            value_to_text(&math_output)
        ))
    }

    /// Finalization after any forced retrieves: math post-processing,
    /// repeated parsing, candidate voting and the forced-solution
    /// fallbacks. Always produces a non-empty answer path.
    pub async fn choose_final_solution(
        &mut self,
        problem: &str,
        graph_view: &str,
        solutions: Vec<Value>,
    ) -> Result<String, ControllerError> {
        if !all_solutions_empty(&solutions) {
            let mut parsed = Vec::new();
            for solution in &solutions {
                let mut text = value_to_text(solution);

                let needs_math = decisions::define_need_for_math(
                    &self.planning,
                    &self.prompts,
                    problem,
                    &text,
                )
                .await?;
                if needs_math {
                    text = self.math_response(problem, text).await?;
                }

                for _ in 0..self.config.max_final_solution_parsing {
                    parsed.push(
                        decisions::parse_solution(
                            &self.planning,
                            &self.prompts,
                            problem,
                            &text,
                            self.config.gaia_formatter,
                        )
                        .await?,
                    );
                }
            }

            if parsed.iter().all(|candidate| candidate.trim().is_empty()) {
                info!("All parsed solutions are empty; forcing generation of a solution");
                let forced = decisions::generate_forced_solution(
                    &self.planning,
                    &self.prompts,
                    problem,
                    graph_view,
                )
                .await?;
                return decisions::parse_solution(
                    &self.planning,
                    &self.prompts,
                    problem,
                    &forced,
                    self.config.gaia_formatter,
                )
                .await;
            }

            let raw_material = solutions
                .iter()
                .map(value_to_text)
                .collect::<Vec<_>>()
                .join("\n");
            return decisions::define_final_solution(
                &self.planning,
                &self.prompts,
                problem,
                &raw_material,
                &parsed,
            )
            .await;
        }

        info!("No usable solutions; forcing generation of a solution");
        let forced = decisions::generate_forced_solution(
            &self.planning,
            &self.prompts,
            problem,
            graph_view,
        )
        .await?;
        decisions::parse_solution(
            &self.planning,
            &self.prompts,
            problem,
            &forced,
            self.config.gaia_formatter,
        )
        .await
    }
}
